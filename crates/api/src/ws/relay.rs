use std::sync::Arc;

use huddle_events::CollabEvent;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::ws::manager::{to_frame, WsManager};

/// Forwards lock lifecycle events from the event bus to every WebSocket
/// connection in the event's workspace, so lock badges on other clients
/// update without polling.
pub struct LockEventRelay {
    ws_manager: Arc<WsManager>,
}

impl LockEventRelay {
    pub fn new(ws_manager: Arc<WsManager>) -> Self {
        Self { ws_manager }
    }

    /// Run until the bus closes or `cancel` fires.
    pub async fn run(self, mut events: broadcast::Receiver<CollabEvent>, cancel: CancellationToken) {
        tracing::info!("Lock event relay started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                next = events.recv() => match next {
                    Ok(event) => self.deliver(&event).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Lock event relay lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
        tracing::info!("Lock event relay stopped");
    }

    async fn deliver(&self, event: &CollabEvent) {
        let Some(frame) = to_frame(&event.to_message()) else {
            return;
        };
        let delivered = self
            .ws_manager
            .send_to_workspace(event.workspace_id, frame)
            .await;
        tracing::debug!(
            workspace_id = %event.workspace_id,
            kind = event.kind.as_str(),
            delivered,
            "Lock event relayed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::ws::Message;
    use huddle_core::protocol::LockEventKind;
    use huddle_events::EventBus;
    use uuid::Uuid;

    #[tokio::test]
    async fn relays_to_the_event_workspace_only() {
        let manager = Arc::new(WsManager::new());
        let bus = EventBus::default();
        let workspace = Uuid::new_v4();
        let (_a, mut rx_a) = manager.add("a".into(), workspace, Uuid::new_v4()).await;
        let (_b, mut rx_b) = manager.add("b".into(), Uuid::new_v4(), Uuid::new_v4()).await;

        let cancel = CancellationToken::new();
        let relay = tokio::spawn(LockEventRelay::new(manager.clone()).run(bus.subscribe(), cancel.clone()));

        bus.publish(
            CollabEvent::new(workspace, LockEventKind::Acquired).with_resource("task", "t-1"),
        );

        let frame = tokio::time::timeout(std::time::Duration::from_secs(1), rx_a.recv())
            .await
            .expect("relay should deliver")
            .expect("channel open");
        match frame {
            Message::Text(text) => {
                let json: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
                assert_eq!(json["type"], "lock.changed");
                assert_eq!(json["kind"], "acquired");
                assert_eq!(json["resource_id"], "t-1");
            }
            other => panic!("unexpected frame: {other:?}"),
        }
        assert!(rx_b.try_recv().is_err());

        cancel.cancel();
        relay.await.unwrap();
    }
}
