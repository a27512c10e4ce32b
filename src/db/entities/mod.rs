#[allow(unused_imports)]
pub mod prelude {
    pub use super::auth_log::Entity as AuthLog;
    pub use super::email_verification::Entity as EmailVerification;
    pub use super::refresh_token::Entity as RefreshToken;
    pub use super::user::Entity as User;
}

pub mod auth_log;
pub mod email_verification;
pub mod refresh_token;
pub mod user;
