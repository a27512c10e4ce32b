use axum::http::StatusCode;
use thiserror::Error;

use crate::db::dao::DaoLayerError;

/// Domain failures of the auth core. Each variant is one distinct outcome;
/// the boundary maps them to a status and a stable `errorCode` via
/// [`AppError::from`] instead of matching on messages.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("A user with this email is already registered")]
    DuplicateEmail,
    #[error("This username is already taken")]
    DuplicateUsername,
    #[error("User not found")]
    UserNotFound,
    #[error("Account is deactivated")]
    AccountDisabled,
    #[error("Account is temporarily locked. Try again later")]
    AccountLocked,
    #[error("Incorrect password")]
    IncorrectPassword,
    #[error("Wrong token type")]
    WrongTokenKind,
    #[error("Refresh token has expired")]
    TokenExpired,
    #[error("Refresh token not found")]
    TokenNotFound,
    #[error("Refresh token has been revoked or expired")]
    TokenRevoked,
    #[error("Invalid or malformed token")]
    MalformedToken,
    #[error("Email is already verified")]
    AlreadyVerified,
    #[error("Invalid or expired verification code")]
    InvalidCode,
    #[error("{0}")]
    Validation(&'static str),
    #[error("The record was modified concurrently, retry the request")]
    Conflict,
    #[error("Password hashing failed")]
    Hashing,
    #[error("database operation failed")]
    Storage(#[source] DaoLayerError),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::DuplicateEmail | AuthError::DuplicateUsername | AuthError::Conflict => {
                StatusCode::CONFLICT
            }
            AuthError::UserNotFound | AuthError::TokenNotFound => StatusCode::NOT_FOUND,
            AuthError::AccountDisabled | AuthError::AccountLocked => StatusCode::FORBIDDEN,
            AuthError::IncorrectPassword
            | AuthError::TokenExpired
            | AuthError::TokenRevoked
            | AuthError::MalformedToken => StatusCode::UNAUTHORIZED,
            AuthError::WrongTokenKind
            | AuthError::AlreadyVerified
            | AuthError::InvalidCode
            | AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::Hashing | AuthError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::DuplicateEmail => "EMAIL_EXISTS",
            AuthError::DuplicateUsername => "USERNAME_EXISTS",
            AuthError::UserNotFound => "USER_NOT_FOUND",
            AuthError::AccountDisabled => "ACCOUNT_DISABLED",
            AuthError::AccountLocked => "ACCOUNT_LOCKED",
            AuthError::IncorrectPassword => "INCORRECT_PASSWORD",
            AuthError::WrongTokenKind => "TOKEN_TYPE_ERROR",
            AuthError::TokenExpired => "TOKEN_EXPIRED",
            AuthError::TokenNotFound => "TOKEN_NOT_FOUND",
            AuthError::TokenRevoked => "TOKEN_NOT_VALID",
            AuthError::MalformedToken => "JWT_ERROR",
            AuthError::AlreadyVerified => "ALREADY_VERIFIED",
            AuthError::InvalidCode => "VERIFICATION_CODE_ERROR",
            AuthError::Validation(_) => "VALIDATION_ERROR",
            AuthError::Conflict => "CONFLICT",
            AuthError::Hashing | AuthError::Storage(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<DaoLayerError> for AuthError {
    fn from(err: DaoLayerError) -> Self {
        match err {
            DaoLayerError::NotFound { .. } => AuthError::UserNotFound,
            DaoLayerError::Conflict { .. } => AuthError::Conflict,
            other => AuthError::Storage(other),
        }
    }
}

/// Boundary error: status + stable code + client-safe message. Everything
/// that leaves a handler as a failure goes through this type.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl AppError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "AUTHENTICATION_ERROR", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "ACCESS_DENIED", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "CONFLICT", message)
    }

    pub fn too_many_requests(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::TOO_MANY_REQUESTS,
            "RATE_LIMIT_EXCEEDED",
            message,
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        let status = err.status();
        let code = err.error_code();
        // Internal details stay in the server log; the client sees a
        // redacted message.
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %err, source = ?std::error::Error::source(&err), "auth operation failed");
            return Self::new(status, code, "Internal server error");
        }
        Self::new(status, code, err.to_string())
    }
}
