//! Periodic housekeeping of the flow session cache.
//!
//! Expired flows are dropped lazily by the cache; this loop forces the
//! pending expiry work on a fixed interval so memory is released even when
//! traffic is idle, and logs how many flows are live.

use std::time::Duration;

use openpipes_core::session::SessionStore;
use tokio_util::sync::CancellationToken;

/// How often maintenance runs by default.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(300);

/// Run the session maintenance loop until `cancel` is triggered.
pub async fn run(sessions: SessionStore, interval: Duration, cancel: CancellationToken) {
    tracing::info!(
        interval_secs = interval.as_secs(),
        "Session maintenance started"
    );

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Session maintenance stopping");
                break;
            }
            _ = ticker.tick() => {
                sessions.run_pending_tasks().await;
                tracing::debug!(live_sessions = sessions.entry_count(), "Session maintenance ran");
            }
        }
    }
}
