//! Per-connection facade over the collaboration services.
//!
//! A [`Coordinator`] is built for one authenticated user in one workspace
//! (a WebSocket connection, or a single REST request) and carries that
//! identity into every call. Business code never passes user ids around;
//! it asks the coordinator to lock, co-edit, broadcast and log.

use std::future::Future;
use std::sync::Arc;

use huddle_core::audit::{actions, stringify_value, validate_action, SESSION_RESOURCE_TYPE};
use huddle_core::collaboration::{LockHolder, ResourceKey};
use huddle_core::field_sync::{validate_field_name, FieldUpdate};
use huddle_core::presence::{PresenceUser, ResourceRef};
use huddle_core::protocol::LockEventKind;
use huddle_core::types::{UserId, WorkspaceId};
use huddle_db::models::activity::CreateActivityLog;
use huddle_db::models::change_history::CreateChangeHistory;
use huddle_db::models::lock::ResourceLock;
use huddle_events::{CollabEvent, FieldSubscription, LeaveOutcome, PresenceHandle, Unsubscribe};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::conflict::{Resolution, ResolutionOutcome};
use crate::error::{CollabError, CollabResult};
use crate::lock_manager::{AcquireOutcome, ReleaseOutcome};
use crate::services::CollabServices;

// ---------------------------------------------------------------------------
// Identity and inputs
// ---------------------------------------------------------------------------

/// Who the coordinator acts for.
#[derive(Debug, Clone)]
pub struct Identity {
    pub workspace_id: WorkspaceId,
    pub user_id: UserId,
    pub user_name: String,
    pub contact: Option<String>,
    pub role: String,
    /// Recorded on audit entries.
    pub session_id: Option<String>,
}

impl Identity {
    pub fn holder(&self) -> LockHolder {
        LockHolder {
            user_id: self.user_id,
            user_name: self.user_name.clone(),
            contact: self.contact.clone(),
        }
    }
}

/// A business-level action to record in the activity log.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActionLog {
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub resource_name: Option<String>,
    pub details: Option<serde_json::Value>,
    /// Defaults to the connection's current page.
    pub page_path: Option<String>,
}

#[derive(Debug)]
struct PresenceState {
    handle: Option<PresenceHandle>,
    page_path: String,
    resource: Option<ResourceRef>,
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

pub struct Coordinator {
    services: Arc<CollabServices>,
    identity: Identity,
    presence: Mutex<PresenceState>,
}

impl Coordinator {
    pub fn new(services: Arc<CollabServices>, identity: Identity) -> Self {
        Self {
            services,
            identity,
            presence: Mutex::new(PresenceState {
                handle: None,
                page_path: "/".to_string(),
                resource: None,
            }),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn services(&self) -> &Arc<CollabServices> {
        &self.services
    }

    fn key(&self, resource_type: &str, resource_id: &str) -> ResourceKey {
        ResourceKey::new(self.identity.workspace_id, resource_type, resource_id)
    }

    fn event(&self, kind: LockEventKind, key: &ResourceKey) -> CollabEvent {
        CollabEvent::new(key.workspace_id, kind)
            .with_resource(key.resource_type.clone(), key.resource_id.clone())
            .with_actor(self.identity.user_id)
    }

    // -- locks --------------------------------------------------------------

    pub async fn acquire_lock(
        &self,
        resource_type: &str,
        resource_id: &str,
    ) -> CollabResult<AcquireOutcome> {
        let key = self.key(resource_type, resource_id);
        let outcome = self
            .services
            .locks
            .acquire(&key, &self.identity.holder())
            .await?;

        if outcome.granted {
            self.services.publish(self.event(LockEventKind::Acquired, &key));
            self.audit_lock(actions::LOCK, &key, None).await;
        }
        Ok(outcome)
    }

    pub async fn release_lock(
        &self,
        resource_type: &str,
        resource_id: &str,
    ) -> CollabResult<ReleaseOutcome> {
        let key = self.key(resource_type, resource_id);
        let outcome = self
            .services
            .locks
            .release(&key, self.identity.user_id)
            .await?;

        let kind = match outcome {
            ReleaseOutcome::Released => LockEventKind::Released,
            ReleaseOutcome::LeftRoster => LockEventKind::CollaboratorLeft,
            ReleaseOutcome::NotHeld => return Ok(outcome),
        };
        self.services.publish(self.event(kind, &key));
        self.audit_lock(actions::UNLOCK, &key, None).await;
        Ok(outcome)
    }

    /// Renew every lock this user holds in the workspace.
    pub async fn extend_locks(&self) -> CollabResult<u64> {
        self.services
            .locks
            .extend(self.identity.workspace_id, self.identity.user_id)
            .await
    }

    pub async fn join_collaboration(
        &self,
        resource_type: &str,
        resource_id: &str,
    ) -> CollabResult<ResourceLock> {
        let outcome = self.resolve(Resolution::Collaborate, resource_type, resource_id).await?;
        outcome
            .lock
            .ok_or_else(|| CollabError::LockNotFound(self.key(resource_type, resource_id)))
    }

    /// Leave a lock's roster. The lock stays collaborative.
    pub async fn leave_collaboration(
        &self,
        resource_type: &str,
        resource_id: &str,
    ) -> CollabResult<Option<ResourceLock>> {
        let key = self.key(resource_type, resource_id);
        let lock = self
            .services
            .session
            .leave(&key, self.identity.user_id)
            .await?;
        if lock.is_some() {
            self.services
                .publish(self.event(LockEventKind::CollaboratorLeft, &key));
        }
        Ok(lock)
    }

    /// Act on a conflict: collaborate, wait or take over.
    pub async fn resolve(
        &self,
        resolution: Resolution,
        resource_type: &str,
        resource_id: &str,
    ) -> CollabResult<ResolutionOutcome> {
        let key = self.key(resource_type, resource_id);
        let outcome = self
            .services
            .resolver
            .resolve(resolution, &key, &self.identity.holder(), &self.identity.role)
            .await?;

        match resolution {
            Resolution::Collaborate => {
                let holder = outcome.lock.as_ref().map(|l| l.locked_by);
                if holder != Some(self.identity.user_id) {
                    self.services
                        .publish(self.event(LockEventKind::Collaborated, &key));
                    let details = serde_json::json!({ "locked_by": holder });
                    self.audit_lock(actions::COLLABORATE, &key, Some(details)).await;
                }
            }
            Resolution::Takeover => {
                if let Some(previous) = outcome.previous_holder {
                    self.services.publish(self.event(LockEventKind::TakenOver, &key));
                    let details = serde_json::json!({ "previous_holder": previous });
                    self.audit_lock(actions::TAKEOVER, &key, Some(details)).await;
                } else if outcome.state.is_editable() {
                    self.services.publish(self.event(LockEventKind::Acquired, &key));
                    self.audit_lock(actions::LOCK, &key, None).await;
                }
            }
            Resolution::Wait => {}
        }
        Ok(outcome)
    }

    pub async fn takeover(
        &self,
        resource_type: &str,
        resource_id: &str,
    ) -> CollabResult<ResolutionOutcome> {
        self.resolve(Resolution::Takeover, resource_type, resource_id).await
    }

    pub async fn get_lock(
        &self,
        resource_type: &str,
        resource_id: &str,
    ) -> CollabResult<Option<ResourceLock>> {
        let key = self.key(resource_type, resource_id);
        key.validate().map_err(CollabError::Validation)?;
        self.services.locks.get_lock(&key).await
    }

    pub async fn list_locks(&self) -> CollabResult<Vec<ResourceLock>> {
        self.services
            .locks
            .list_locks(self.identity.workspace_id)
            .await
    }

    // -- field sync ---------------------------------------------------------

    /// Tell the resource's other participants about a local edit. Returns
    /// how many subscribers it reached.
    pub async fn broadcast_field_update(
        &self,
        resource_type: &str,
        resource_id: &str,
        field: &str,
        value: serde_json::Value,
    ) -> CollabResult<usize> {
        let key = self.key(resource_type, resource_id);
        key.validate().map_err(CollabError::Validation)?;
        validate_field_name(field).map_err(CollabError::Validation)?;

        let update = FieldUpdate {
            user_id: self.identity.user_id,
            user_name: self.identity.user_name.clone(),
            field: field.to_string(),
            value,
            timestamp: self.services.now(),
        };
        Ok(self.services.fields.broadcast(&key, update).await)
    }

    /// Run `callback` for each edit another user makes on the resource.
    pub async fn on_field_update<F, Fut>(
        &self,
        resource_type: &str,
        resource_id: &str,
        callback: F,
    ) -> CollabResult<Unsubscribe>
    where
        F: FnMut(FieldUpdate) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let key = self.key(resource_type, resource_id);
        key.validate().map_err(CollabError::Validation)?;
        Ok(self
            .services
            .fields
            .on_field_update(&key, self.identity.user_id, callback)
            .await)
    }

    pub async fn subscribe_fields(
        &self,
        resource_type: &str,
        resource_id: &str,
    ) -> CollabResult<FieldSubscription> {
        let key = self.key(resource_type, resource_id);
        key.validate().map_err(CollabError::Validation)?;
        Ok(self
            .services
            .fields
            .subscribe(&key, self.identity.user_id)
            .await)
    }

    // -- audit --------------------------------------------------------------

    /// Record an action. Never fails; invalid entries are dropped.
    pub async fn log_action(&self, entry: ActionLog) {
        if let Err(e) = validate_action(&entry.action) {
            tracing::warn!(error = %e, "Dropping invalid activity entry");
            return;
        }
        let page_path = match entry.page_path {
            Some(page) => page,
            None => self.current_page().await,
        };
        self.services.audit().log_action(CreateActivityLog {
            workspace_id: self.identity.workspace_id,
            user_id: self.identity.user_id,
            user_name: self.identity.user_name.clone(),
            session_id: self.identity.session_id.clone(),
            action: entry.action,
            resource_type: entry.resource_type,
            resource_id: entry.resource_id,
            resource_name: entry.resource_name,
            details: entry.details,
            page_path,
            created_at: self.services.now(),
        });
    }

    /// Record a committed field change. Values are stored stringified.
    pub fn log_field_change(
        &self,
        resource_type: &str,
        resource_id: &str,
        field: &str,
        old_value: &serde_json::Value,
        new_value: &serde_json::Value,
    ) {
        self.services.audit().log_field_change(CreateChangeHistory {
            workspace_id: self.identity.workspace_id,
            user_id: self.identity.user_id,
            user_name: self.identity.user_name.clone(),
            resource_type: resource_type.to_string(),
            resource_id: resource_id.to_string(),
            field_name: field.to_string(),
            old_value: stringify_value(old_value),
            new_value: stringify_value(new_value),
            created_at: self.services.now(),
        });
    }

    async fn audit_lock(
        &self,
        action: &str,
        key: &ResourceKey,
        details: Option<serde_json::Value>,
    ) {
        self.log_action(ActionLog {
            action: action.to_string(),
            resource_type: key.resource_type.clone(),
            resource_id: Some(key.resource_id.clone()),
            details,
            ..Default::default()
        })
        .await;
    }

    async fn audit_session(&self, action: &str, page_path: String) {
        self.log_action(ActionLog {
            action: action.to_string(),
            resource_type: SESSION_RESOURCE_TYPE.to_string(),
            page_path: Some(page_path),
            ..Default::default()
        })
        .await;
    }

    // -- presence -----------------------------------------------------------

    /// Join the workspace presence channel. Idempotent per coordinator.
    pub async fn connect(&self) -> PresenceHandle {
        let mut state = self.presence.lock().await;
        if let Some(handle) = state.handle {
            return handle;
        }
        let handle = self
            .services
            .presence
            .join(
                self.identity.workspace_id,
                self.identity.user_id,
                &self.identity.user_name,
                self.services.now(),
            )
            .await;
        state.handle = Some(handle);
        let page_path = state.page_path.clone();
        drop(state);

        self.audit_session(actions::LOGIN, page_path).await;
        handle
    }

    /// Leave the presence channel. When this was the user's last session in
    /// the workspace their locks are freed.
    pub async fn disconnect(&self) -> LeaveOutcome {
        let handle = self.presence.lock().await.handle.take();
        match handle {
            Some(handle) => {
                self.services
                    .end_session(&handle, self.identity.session_id.as_deref())
                    .await
            }
            None => LeaveOutcome::default(),
        }
    }

    /// Set page and resource together. Logs `view` when the page changes.
    pub async fn update_presence(
        &self,
        page_path: &str,
        resource: Option<ResourceRef>,
    ) -> Option<PresenceUser> {
        let mut state = self.presence.lock().await;
        let page_changed = state.page_path != page_path;
        state.page_path = page_path.to_string();
        state.resource = resource.clone();

        let record = match state.handle {
            Some(handle) => {
                self.services
                    .presence
                    .update(&handle, page_path, resource, self.services.now())
                    .await
            }
            None => None,
        };
        drop(state);

        if page_changed {
            self.audit_session(actions::VIEW, page_path.to_string()).await;
        }
        record
    }

    pub async fn set_current_page(&self, page_path: &str) -> Option<PresenceUser> {
        let resource = self.presence.lock().await.resource.clone();
        self.update_presence(page_path, resource).await
    }

    pub async fn set_current_resource(&self, resource: Option<ResourceRef>) -> Option<PresenceUser> {
        let page_path = self.current_page().await;
        self.update_presence(&page_path, resource).await
    }

    /// Refresh presence and renew this user's locks. Returns how many locks
    /// were renewed.
    pub async fn heartbeat(&self) -> CollabResult<u64> {
        let handle = self.presence.lock().await.handle;
        if let Some(handle) = handle {
            self.services
                .presence
                .heartbeat(&handle, self.services.now())
                .await;
        }
        self.extend_locks().await
    }

    pub async fn current_page(&self) -> String {
        self.presence.lock().await.page_path.clone()
    }

    pub async fn online(&self) -> Vec<PresenceUser> {
        self.services
            .presence
            .list_online(self.identity.workspace_id)
            .await
    }

    pub async fn users_on_page(&self, page_path: &str) -> Vec<PresenceUser> {
        self.services
            .presence
            .users_on_page(self.identity.workspace_id, page_path)
            .await
    }

    pub async fn users_on_resource(
        &self,
        resource_type: &str,
        resource_id: &str,
    ) -> Vec<PresenceUser> {
        self.services
            .presence
            .users_on_resource(self.identity.workspace_id, resource_type, resource_id)
            .await
    }
}
