use sea_orm::DatabaseConnection;

use crate::{
    auth::audit::AuthAudit,
    auth::email::{EmailDispatcher, EmailService},
    auth::jwt::TokenCodec,
    auth::service::AuthService,
    db::dao::DaoContext,
    state::AppState,
};

/// Service factory over one database handle. Services are cheap to build
/// per request; the long-lived pieces (codec, mail workers) are shared
/// through `AppState`.
#[derive(Clone)]
pub struct ServiceContext {
    daos: DaoContext,
    db: DatabaseConnection,
    tokens: TokenCodec,
    mailer: EmailDispatcher,
}

impl ServiceContext {
    pub fn new(db: &DatabaseConnection, tokens: TokenCodec, mailer: EmailDispatcher) -> Self {
        Self {
            daos: DaoContext::new(db),
            db: db.clone(),
            tokens,
            mailer,
        }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(&state.db, state.tokens.clone(), state.mailer.clone())
    }

    pub fn audit(&self) -> AuthAudit {
        AuthAudit::new(self.daos.auth_log())
    }

    pub fn email(&self) -> EmailService {
        EmailService::new(
            self.db.clone(),
            self.daos.user(),
            self.daos.email_verification(),
            self.audit(),
            self.mailer.clone(),
        )
    }

    pub fn auth(&self) -> AuthService {
        AuthService::new(
            self.db.clone(),
            self.daos.user(),
            self.daos.refresh_token(),
            self.audit(),
            self.tokens.clone(),
            self.email(),
        )
    }
}
