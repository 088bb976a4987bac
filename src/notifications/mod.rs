pub mod email;
pub mod templates;
pub mod whatsapp;

pub use email::{EmailMessage, EmailSender, HttpEmailSender};
pub use whatsapp::WhatsAppLink;
