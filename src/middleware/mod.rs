pub mod auth;
pub mod extract;
pub mod response;

pub use auth::{long_token_middleware, optional_long_token_middleware, AuthUser};
pub use extract::ApiJson;
pub use response::{ApiResponse, ApiResult};
