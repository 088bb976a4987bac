pub mod auth;
pub mod extract;
pub mod response;

pub use auth::{admin_middleware, auth_middleware};
pub use extract::{ApiJson, ApiQuery};
pub use response::{ApiResponse, ApiResult, Attachment, DownloadResult, Message};
