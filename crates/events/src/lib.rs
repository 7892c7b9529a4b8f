//! Ephemeral pub/sub for the huddle coordinator.
//!
//! - [`EventBus`]: in-process fan-out of lock lifecycle events.
//! - [`PresenceDirectory`]: per-workspace presence channels.
//! - [`FieldSyncHub`]: per-resource field-update channels.
//! - [`AuditLogger`] / [`AuditWriter`]: fire-and-forget audit queue and
//!   the background task that drains it into an
//!   [`AuditStore`](huddle_db::AuditStore).
//!
//! Nothing here is durable. A process restart forgets all presence and
//! all in-flight field updates.

pub mod audit;
pub mod bus;
pub mod field_sync;
pub mod presence;

pub use audit::{AuditLogger, AuditRecord, AuditSink, AuditWriter};
pub use bus::{CollabEvent, EventBus};
pub use field_sync::{FieldSubscription, FieldSyncHub, Unsubscribe};
pub use presence::{LeaveOutcome, PresenceDirectory, PresenceEvent, PresenceHandle};
