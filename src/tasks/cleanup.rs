use std::time::Duration;

use sea_orm::DatabaseConnection;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::db::dao::{DaoBase, EmailVerificationDao, RefreshTokenDao};

pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Detached garbage collection for the token and verification ledgers.
/// Pure cleanup: a skipped or repeated run has no correctness impact, so
/// errors are logged and the loop keeps going.
pub fn spawn_cleanup(db: DatabaseConnection) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(CLEANUP_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if let Err(err) = run_once(&db).await {
                tracing::error!("ledger cleanup failed: {err}");
            }
        }
    })
}

async fn run_once(db: &DatabaseConnection) -> anyhow::Result<()> {
    let now = chrono::Utc::now().fixed_offset();

    let tokens = RefreshTokenDao::new(db).delete_expired(now).await?;
    let codes = EmailVerificationDao::new(db).delete_stale(now).await?;

    tracing::info!(tokens, codes, "expired auth records pruned");
    Ok(())
}
