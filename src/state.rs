use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::{
    auth::email::EmailDispatcher, auth::jwt::TokenCodec, config::AppConfig,
    middleware::RateLimiterRegistry,
};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: DatabaseConnection,
    pub tokens: TokenCodec,
    pub limiters: RateLimiterRegistry,
    pub mailer: EmailDispatcher,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        db: DatabaseConnection,
        tokens: TokenCodec,
        limiters: RateLimiterRegistry,
        mailer: EmailDispatcher,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            db,
            tokens,
            limiters,
            mailer,
        })
    }
}
