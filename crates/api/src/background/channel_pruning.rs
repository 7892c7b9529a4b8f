//! Periodic removal of idle in-memory channels.
//!
//! Field-sync channels are created per resource on first subscribe and
//! outlive their subscribers; presence channels can outlive a workspace's
//! last session while a relay is still winding down.

use std::sync::Arc;
use std::time::Duration;

use huddle_collab::CollabServices;
use tokio_util::sync::CancellationToken;

pub async fn run(services: Arc<CollabServices>, interval: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = interval.as_secs(), "Channel pruning job started");

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Channel pruning job stopping");
                break;
            }
            _ = ticker.tick() => {
                services.prune_idle_channels().await;
            }
        }
    }
}
