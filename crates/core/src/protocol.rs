//! WebSocket message protocol for presence, field sync and lock changes.
//!
//! Serialized as JSON with an internally-tagged `"type"` discriminator so
//! clients can route messages by type string.

use serde::{Deserialize, Serialize};

use crate::field_sync::FieldUpdate;
use crate::presence::{PresenceUser, ResourceRef};
use crate::types::UserId;

/// Messages a client sends.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// The user navigated or opened/closed a resource.
    #[serde(rename = "presence.update")]
    PresenceUpdate {
        page_path: String,
        #[serde(default)]
        resource: Option<ResourceRef>,
    },

    /// Periodic liveness signal; also renews the user's locks.
    #[serde(rename = "heartbeat")]
    Heartbeat,

    /// Start receiving field updates for a resource.
    #[serde(rename = "field.subscribe")]
    FieldSubscribe {
        resource_type: String,
        resource_id: String,
    },

    /// Stop receiving field updates for a resource.
    #[serde(rename = "field.unsubscribe")]
    FieldUnsubscribe {
        resource_type: String,
        resource_id: String,
    },

    /// Broadcast a local edit to the resource's other participants.
    #[serde(rename = "field.update")]
    FieldUpdate {
        resource_type: String,
        resource_id: String,
        field: String,
        value: serde_json::Value,
    },
}

/// Lock lifecycle changes pushed to every client in a workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockEventKind {
    Acquired,
    Released,
    Collaborated,
    CollaboratorLeft,
    TakenOver,
    Expired,
}

impl LockEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LockEventKind::Acquired => "acquired",
            LockEventKind::Released => "released",
            LockEventKind::Collaborated => "collaborated",
            LockEventKind::CollaboratorLeft => "collaborator_left",
            LockEventKind::TakenOver => "taken_over",
            LockEventKind::Expired => "expired",
        }
    }
}

/// Messages the server sends.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Complete current member set of the workspace.
    #[serde(rename = "presence.sync")]
    PresenceSync { users: Vec<PresenceUser> },

    #[serde(rename = "presence.join")]
    PresenceJoin { user: PresenceUser },

    #[serde(rename = "presence.update")]
    PresenceUpdate { user: PresenceUser },

    #[serde(rename = "presence.leave")]
    PresenceLeave { user_id: UserId },

    #[serde(rename = "field_update")]
    FieldUpdate {
        resource_type: String,
        resource_id: String,
        update: FieldUpdate,
    },

    /// A lock changed hands or mode. `resource_id` is `None` for
    /// workspace-wide sweeps.
    #[serde(rename = "lock.changed")]
    LockChanged {
        kind: LockEventKind,
        resource_type: Option<String>,
        resource_id: Option<String>,
        user_id: Option<UserId>,
    },

    #[serde(rename = "error")]
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heartbeat_parses_from_bare_tag() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"heartbeat"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Heartbeat);
    }

    #[test]
    fn presence_update_resource_is_optional() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"presence.update","page_path":"/tasks"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::PresenceUpdate {
                page_path: "/tasks".into(),
                resource: None
            }
        );
    }

    #[test]
    fn field_update_event_name_on_the_wire() {
        let msg = ServerMessage::FieldUpdate {
            resource_type: "contact".into(),
            resource_id: "c1".into(),
            update: FieldUpdate {
                user_id: uuid::Uuid::nil(),
                user_name: "Ada".into(),
                field: "phone".into(),
                value: serde_json::json!("555"),
                timestamp: chrono::Utc::now(),
            },
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], crate::field_sync::FIELD_UPDATE_EVENT);
        assert_eq!(json["update"]["field"], "phone");
    }

    #[test]
    fn lock_changed_kind_is_snake_case() {
        let msg = ServerMessage::LockChanged {
            kind: LockEventKind::CollaboratorLeft,
            resource_type: Some("task".into()),
            resource_id: Some("t1".into()),
            user_id: None,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "lock.changed");
        assert_eq!(json["kind"], LockEventKind::CollaboratorLeft.as_str());
    }

    #[test]
    fn unknown_client_message_is_rejected() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"nope"}"#).is_err());
    }
}
