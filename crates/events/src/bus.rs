//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] carries [`CollabEvent`]s from the coordinator to whatever
//! relays them (the WebSocket layer). Shared via `Arc<EventBus>`.

use chrono::Utc;
use huddle_core::protocol::{LockEventKind, ServerMessage};
use huddle_core::types::{Timestamp, UserId, WorkspaceId};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// CollabEvent
// ---------------------------------------------------------------------------

/// A lock lifecycle change in one workspace.
///
/// Built with [`CollabEvent::new`] and the `with_*` builder methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollabEvent {
    pub workspace_id: WorkspaceId,
    pub kind: LockEventKind,

    /// `None` for workspace-wide sweeps.
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,

    /// The user whose action caused the change, if any.
    pub actor_user_id: Option<UserId>,

    pub timestamp: Timestamp,
}

impl CollabEvent {
    pub fn new(workspace_id: WorkspaceId, kind: LockEventKind) -> Self {
        Self {
            workspace_id,
            kind,
            resource_type: None,
            resource_id: None,
            actor_user_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_resource(
        mut self,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        self.resource_type = Some(resource_type.into());
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn with_actor(mut self, user_id: UserId) -> Self {
        self.actor_user_id = Some(user_id);
        self
    }

    /// The `lock.changed` message clients receive for this event.
    pub fn to_message(&self) -> ServerMessage {
        ServerMessage::LockChanged {
            kind: self.kind,
            resource_type: self.resource_type.clone(),
            resource_id: self.resource_id.clone(),
            user_id: self.actor_user_id,
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// # Usage
///
/// ```rust
/// use huddle_core::protocol::LockEventKind;
/// use huddle_events::bus::{CollabEvent, EventBus};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(CollabEvent::new(uuid::Uuid::new_v4(), LockEventKind::Acquired));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<CollabEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// Slow receivers observe `RecvError::Lagged` once the buffer wraps.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers. Dropped when nobody
    /// is listening.
    pub fn publish(&self, event: CollabEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CollabEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
