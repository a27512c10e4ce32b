pub mod auth;
pub mod json_error;
pub mod panic;
pub mod rate_limit;

pub use auth::{CurrentUser, jwt_auth};
pub use json_error::json_error_middleware;
pub use panic::catch_panic_layer;
pub use rate_limit::{RateLimitLayer, RateLimiterRegistry, TokenBucket, operations};
