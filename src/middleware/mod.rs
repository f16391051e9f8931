pub mod extract;
pub mod gateway;
pub mod response;

pub use extract::{admin_decision, AdminUser, CurrentUser};
pub use gateway::{identity_gateway, AccessToken};
pub use response::{ApiResponse, ApiResult};
