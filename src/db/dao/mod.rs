pub mod auth_log_dao;
pub mod base;
pub mod base_traits;
mod context;
pub mod email_verification_dao;
pub mod error;
pub mod refresh_token_dao;
pub mod user_dao;

pub use auth_log_dao::AuthLogDao;
pub use base::{DaoBase, PaginatedResponse};
pub use base_traits::{
    AuditColumns, HasIdActiveModel, TimestampedActiveModel, VersionedActiveModel, VersionedModel,
};
pub use context::DaoContext;
pub use email_verification_dao::EmailVerificationDao;
pub use error::{DaoLayerError, DaoResult};
pub use refresh_token_dao::RefreshTokenDao;
pub use user_dao::UserDao;
