//! Periodic sweep of expired locks.
//!
//! Acquire already clears expired rows opportunistically; this sweep makes
//! sure an abandoned lock disappears (and connected clients hear about it)
//! even when nobody tries to take it.

use std::sync::Arc;
use std::time::Duration;

use huddle_collab::CollabServices;
use tokio_util::sync::CancellationToken;

/// Run the expired-lock sweep every `interval` until `cancel` fires.
pub async fn run(services: Arc<CollabServices>, interval: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = interval.as_secs(), "Lock cleanup job started");

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Lock cleanup job stopping");
                break;
            }
            _ = ticker.tick() => {
                match services.sweep_expired_locks().await {
                    Ok(0) => tracing::debug!("Lock cleanup: nothing expired"),
                    Ok(swept) => tracing::info!(swept, "Lock cleanup: removed expired locks"),
                    Err(e) => tracing::error!(error = %e, "Lock cleanup: sweep failed"),
                }
            }
        }
    }
}
