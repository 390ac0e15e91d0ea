pub mod auth;
pub mod response;

pub use auth::{require_bearer, AuthUser};
pub use response::{ApiResponse, ApiResult};
