use uuid::Uuid;

use crate::auth::types::ClientInfo;
use crate::db::dao::AuthLogDao;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthAction {
    Login,
    LoginFailed,
    Logout,
    Registration,
    EmailVerification,
    AccountLocked,
    PasswordChanged,
}

impl AuthAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthAction::Login => "LOGIN",
            AuthAction::LoginFailed => "LOGIN_FAILED",
            AuthAction::Logout => "LOGOUT",
            AuthAction::Registration => "REGISTRATION",
            AuthAction::EmailVerification => "EMAIL_VERIFICATION",
            AuthAction::AccountLocked => "ACCOUNT_LOCKED",
            AuthAction::PasswordChanged => "PASSWORD_CHANGED",
        }
    }
}

/// Persists security-relevant history to `auth_logs`. Best effort: an audit
/// write must never fail the request it describes, so storage errors are
/// logged and swallowed here.
#[derive(Clone)]
pub struct AuthAudit {
    logs: AuthLogDao,
}

impl AuthAudit {
    pub fn new(logs: AuthLogDao) -> Self {
        Self { logs }
    }

    pub async fn record(
        &self,
        user_id: Option<Uuid>,
        action: AuthAction,
        client: &ClientInfo,
        success: bool,
        failure_reason: Option<&str>,
    ) {
        let result = self
            .logs
            .record(
                user_id,
                action.as_str(),
                Some(client.ip_address.clone()),
                Some(client.user_agent.clone()),
                success,
                failure_reason.map(str::to_string),
            )
            .await;

        if let Err(err) = result {
            tracing::error!(action = action.as_str(), "failed to write auth audit row: {err}");
        }
    }
}
