//! Removes presence sessions whose client stopped sending heartbeats
//! without closing the socket.
//!
//! Goes through the normal leave path, so a stale user's locks are freed
//! exactly once, when their last session is swept.

use std::sync::Arc;
use std::time::Duration;

use huddle_collab::CollabServices;
use tokio_util::sync::CancellationToken;

pub async fn run(
    services: Arc<CollabServices>,
    interval: Duration,
    timeout_secs: i64,
    cancel: CancellationToken,
) {
    tracing::info!(
        interval_secs = interval.as_secs(),
        timeout_secs,
        "Presence staleness job started"
    );

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Presence staleness job stopping");
                break;
            }
            _ = ticker.tick() => {
                services.sweep_stale_presence(timeout_secs).await;
            }
        }
    }
}
