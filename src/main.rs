use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{Router, middleware};
use tower_http::trace::TraceLayer;

use katering::{
    auth::email::{EmailDispatcher, EmailSender, HttpEmailSender, LogEmailSender},
    auth::jwt::TokenCodec,
    config::AppConfig,
    db::connection,
    logging::init_tracing,
    middleware::{RateLimiterRegistry, catch_panic_layer, json_error_middleware},
    routes::router,
    services::ServiceContext,
    state::AppState,
    tasks::spawn_cleanup,
};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        tracing::error!("server failed: {err:?}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cfg = AppConfig::from_env().context("failed to load config")?;
    init_tracing(&cfg.logging.rust_log);

    let db_cfg = cfg
        .database
        .clone()
        .context("database config is required (APP_DATABASE__URL)")?;
    let auth_cfg = cfg
        .auth
        .clone()
        .context("auth config is required (APP_AUTH__JWT_SECRET)")?;

    let db = connection::connect(&db_cfg).await?;

    let tokens = TokenCodec::new(auth_cfg.jwt_secret.as_bytes());
    let limiters = RateLimiterRegistry::with_defaults();
    let mailer = EmailDispatcher::spawn(
        build_email_sender(&cfg),
        cfg.mail.workers,
        cfg.mail.queue_depth,
    );

    let services = ServiceContext::new(&db, tokens.clone(), mailer.clone());
    services.auth().seed_admin(&auth_cfg).await?;

    spawn_cleanup(db.clone());

    let state = AppState::new(cfg, db, tokens, limiters, mailer);

    let app = Router::new()
        .merge(router(Arc::clone(&state)))
        .layer(middleware::from_fn(json_error_middleware))
        .layer(catch_panic_layer())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!(
        "{}:{}",
        state.config.general.host.as_str(),
        state.config.general.port
    )
    .parse()
    .context("invalid host/port")?;
    tracing::info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_email_sender(cfg: &AppConfig) -> Arc<dyn EmailSender> {
    match (cfg.mail.api_url.clone(), cfg.mail.api_key.clone()) {
        (Some(api_url), Some(api_key)) => Arc::new(HttpEmailSender::new(
            api_url,
            api_key,
            cfg.mail.from_address.clone(),
        )),
        _ => {
            tracing::warn!("no mail provider configured, verification codes are logged only");
            Arc::new(LogEmailSender)
        }
    }
}
