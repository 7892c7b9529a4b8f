//! The shared service graph one process builds at startup.

use std::sync::Arc;

use huddle_core::audit::{actions, SESSION_RESOURCE_TYPE};
use huddle_core::collaboration::LeaseTtl;
use huddle_core::protocol::LockEventKind;
use huddle_core::types::Timestamp;
use huddle_db::models::activity::CreateActivityLog;
use huddle_db::LockStore;
use huddle_events::{
    AuditSink, CollabEvent, EventBus, FieldSyncHub, LeaveOutcome, PresenceDirectory,
    PresenceHandle,
};

use crate::clock::{system_clock, Clock};
use crate::conflict::ConflictResolver;
use crate::error::CollabResult;
use crate::lock_manager::LockManager;
use crate::session::CollaborationSession;

/// Everything a [`Coordinator`](crate::Coordinator) delegates to. Built
/// once and shared behind an `Arc`; per-connection state lives in the
/// coordinator, not here.
pub struct CollabServices {
    pub locks: Arc<LockManager>,
    pub session: Arc<CollaborationSession>,
    pub resolver: ConflictResolver,
    pub presence: Arc<PresenceDirectory>,
    pub fields: Arc<FieldSyncHub>,
    pub bus: Arc<EventBus>,
    audit: Arc<dyn AuditSink>,
    clock: Clock,
}

impl CollabServices {
    pub fn new(store: Arc<dyn LockStore>, audit: Arc<dyn AuditSink>, lock_ttl: LeaseTtl) -> Self {
        Self::with_clock(store, audit, lock_ttl, system_clock())
    }

    pub fn with_clock(
        store: Arc<dyn LockStore>,
        audit: Arc<dyn AuditSink>,
        lock_ttl: LeaseTtl,
        clock: Clock,
    ) -> Self {
        let locks = Arc::new(LockManager::new(store.clone(), lock_ttl).with_clock(clock.clone()));
        let session = Arc::new(CollaborationSession::new(store).with_clock(clock.clone()));
        Self {
            resolver: ConflictResolver::new(locks.clone(), session.clone()),
            locks,
            session,
            presence: Arc::new(PresenceDirectory::new()),
            fields: Arc::new(FieldSyncHub::new()),
            bus: Arc::new(EventBus::default()),
            audit,
            clock,
        }
    }

    pub fn now(&self) -> Timestamp {
        (self.clock)()
    }

    pub fn audit(&self) -> &dyn AuditSink {
        self.audit.as_ref()
    }

    pub fn publish(&self, event: CollabEvent) {
        self.bus.publish(event);
    }

    /// Remove a presence session and, when it was the user's last one in
    /// the workspace, free every lock they hold.
    ///
    /// Safe to call more than once for the same handle: only the first
    /// call does anything.
    pub async fn end_session(
        &self,
        handle: &PresenceHandle,
        session_id: Option<&str>,
    ) -> LeaveOutcome {
        let outcome = self.presence.leave(handle).await;
        let Some(record) = &outcome.record else {
            return outcome;
        };

        self.audit.log_action(CreateActivityLog {
            workspace_id: handle.workspace_id,
            user_id: handle.user_id,
            user_name: record.user_name.clone(),
            session_id: session_id.map(str::to_string),
            action: actions::LOGOUT.to_string(),
            resource_type: SESSION_RESOURCE_TYPE.to_string(),
            resource_id: None,
            resource_name: None,
            details: None,
            page_path: record.page_path.clone(),
            created_at: self.now(),
        });

        if outcome.last_session {
            match self
                .locks
                .cleanup_for_user(handle.workspace_id, handle.user_id)
                .await
            {
                Ok(freed) => {
                    for key in freed {
                        self.publish(
                            CollabEvent::new(key.workspace_id, LockEventKind::Released)
                                .with_resource(key.resource_type, key.resource_id)
                                .with_actor(handle.user_id),
                        );
                    }
                }
                Err(e) => {
                    // The lease TTL still frees these locks eventually.
                    tracing::warn!(
                        error = %e,
                        workspace_id = %handle.workspace_id,
                        user_id = %handle.user_id,
                        "Lock cleanup on leave failed"
                    );
                }
            }
        }
        outcome
    }

    /// Delete expired locks in every workspace and announce each one.
    pub async fn sweep_expired_locks(&self) -> CollabResult<usize> {
        let swept = self.locks.cleanup_expired(None).await?;
        let count = swept.len();
        for key in swept {
            self.publish(
                CollabEvent::new(key.workspace_id, LockEventKind::Expired)
                    .with_resource(key.resource_type, key.resource_id),
            );
        }
        Ok(count)
    }

    /// End every presence session not refreshed within `timeout_secs`.
    /// Returns how many sessions were removed.
    pub async fn sweep_stale_presence(&self, timeout_secs: i64) -> usize {
        let stale = self
            .presence
            .stale_sessions(self.now(), timeout_secs)
            .await;
        let mut removed = 0;
        for handle in stale {
            if self.end_session(&handle, None).await.removed() {
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::info!(removed, "Stale presence sessions removed");
        }
        removed
    }

    /// Drop field-sync channels and workspace presence channels that no
    /// one is using any more. Returns `(field_channels, presence_channels)`
    /// removed.
    pub async fn prune_idle_channels(&self) -> (usize, usize) {
        let fields = self.fields.prune().await;
        let presence = self.presence.prune_idle().await;
        if fields + presence > 0 {
            tracing::debug!(fields, presence, "Idle channels pruned");
        }
        (fields, presence)
    }
}
