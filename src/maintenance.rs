use std::time::Duration;
use tracing::{info, warn};

use crate::app::Limiters;
use crate::auth::repo::{LoginAttempts, RefreshTokens};
use crate::state::AppState;

const SWEEP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
const RETENTION_DAYS: i32 = 30;

/// Background sweep deleting expired/revoked refresh tokens past retention
/// and stale login attempts. Each delete is its own short statement, so the
/// sweep never holds locks that block foreground transactions.
pub fn spawn(state: AppState, limiters: Limiters) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(SWEEP_INTERVAL);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately; consume it so sweeps start
        // one full interval after boot.
        tick.tick().await;
        loop {
            tick.tick().await;
            sweep(&state, &limiters).await;
        }
    })
}

async fn sweep(state: &AppState, limiters: &Limiters) {
    match RefreshTokens::purge(&state.db, RETENTION_DAYS).await {
        Ok(n) => info!(deleted = n, "purged expired refresh tokens"),
        Err(e) => warn!(error = %e, "refresh token purge failed"),
    }
    match LoginAttempts::purge_older_than(&state.db, RETENTION_DAYS).await {
        Ok(n) => info!(deleted = n, "pruned stale login attempts"),
        Err(e) => warn!(error = %e, "login attempt prune failed"),
    }
    limiters.cleanup().await;
}
