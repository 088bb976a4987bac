pub mod business;
pub mod client;
pub mod invoice;
pub mod job;
pub mod roster;
pub mod subscription;
pub mod user;

pub use business::{Business, InvoiceTemplate};
pub use client::{Client, ClientNotes};
pub use invoice::{format_invoice_number, Invoice};
pub use job::{ChecklistItem, Job, JobFilter, JobPhoto};
pub use roster::{BusinessCleaner, CleanerInvitation, RosterEntry};
pub use subscription::{JobUsage, PlanCount, Subscription};
pub use user::User;

/// Generates a new opaque row id.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
