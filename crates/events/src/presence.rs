//! Workspace presence channels.
//!
//! [`PresenceDirectory`] keeps one record per connected session, grouped by
//! workspace, and fans changes out on a per-workspace broadcast channel.
//! A user with several tabs open has several sessions; readers see them
//! de-duplicated to one record per user.

use std::collections::HashMap;

use huddle_core::presence::{PresenceUser, ResourceRef};
use huddle_core::protocol::ServerMessage;
use huddle_core::types::{Timestamp, UserId, WorkspaceId};
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

/// Buffer capacity of each workspace channel.
const CHANNEL_CAPACITY: usize = 256;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Identifies one joined session. Returned by [`PresenceDirectory::join`]
/// and passed back for every later call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PresenceHandle {
    pub workspace_id: WorkspaceId,
    pub user_id: UserId,
    pub session_id: Uuid,
}

/// A change on a workspace presence channel.
#[derive(Debug, Clone, PartialEq)]
pub enum PresenceEvent {
    Join(PresenceUser),
    Update(PresenceUser),
    /// The complete, de-duplicated member set.
    Sync(Vec<PresenceUser>),
    /// The user's last session left.
    Leave(UserId),
}

impl PresenceEvent {
    pub fn to_message(&self) -> ServerMessage {
        match self {
            PresenceEvent::Join(user) => ServerMessage::PresenceJoin { user: user.clone() },
            PresenceEvent::Update(user) => ServerMessage::PresenceUpdate { user: user.clone() },
            PresenceEvent::Sync(users) => ServerMessage::PresenceSync {
                users: users.clone(),
            },
            PresenceEvent::Leave(user_id) => ServerMessage::PresenceLeave { user_id: *user_id },
        }
    }
}

/// Result of [`PresenceDirectory::leave`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LeaveOutcome {
    /// The removed record, `None` when the session had already left.
    pub record: Option<PresenceUser>,
    /// No other session of the same user remains in the workspace.
    /// Only ever `true` for the call that removed that last session.
    pub last_session: bool,
}

impl LeaveOutcome {
    pub fn removed(&self) -> bool {
        self.record.is_some()
    }
}

// ---------------------------------------------------------------------------
// PresenceDirectory
// ---------------------------------------------------------------------------

struct Channel {
    sessions: HashMap<Uuid, PresenceUser>,
    sender: broadcast::Sender<PresenceEvent>,
}

impl Channel {
    fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sessions: HashMap::new(),
            sender,
        }
    }

    fn has_user(&self, user_id: UserId) -> bool {
        self.sessions.values().any(|u| u.user_id == user_id)
    }

    /// One record per user: the most recently seen session wins.
    fn online(&self) -> Vec<PresenceUser> {
        self.matching(|_| true)
    }

    /// Sessions passing `filter`, then one record per user. Filtering
    /// first keeps a user whose other tab is on a different page.
    fn matching(&self, filter: impl Fn(&PresenceUser) -> bool) -> Vec<PresenceUser> {
        let mut by_user: HashMap<UserId, &PresenceUser> = HashMap::new();
        for record in self.sessions.values().filter(|r| filter(r)) {
            by_user
                .entry(record.user_id)
                .and_modify(|kept| {
                    if record.last_seen > kept.last_seen {
                        *kept = record;
                    }
                })
                .or_insert(record);
        }
        let mut users: Vec<PresenceUser> = by_user.into_values().cloned().collect();
        users.sort_by(|a, b| {
            a.online_at
                .cmp(&b.online_at)
                .then_with(|| a.user_name.cmp(&b.user_name))
        });
        users
    }

    fn is_idle(&self) -> bool {
        self.sessions.is_empty() && self.sender.receiver_count() == 0
    }

    fn emit(&self, event: PresenceEvent) {
        let _ = self.sender.send(event);
    }
}

/// In-memory presence for every workspace.
///
/// Thread-safe via an interior `RwLock`; share it behind an `Arc`.
pub struct PresenceDirectory {
    channels: RwLock<HashMap<WorkspaceId, Channel>>,
}

impl PresenceDirectory {
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new session. Its record is visible to [`list_online`]
    /// immediately; subscribers get a `Join` followed by a `Sync`.
    ///
    /// [`list_online`]: PresenceDirectory::list_online
    pub async fn join(
        &self,
        workspace_id: WorkspaceId,
        user_id: UserId,
        user_name: &str,
        now: Timestamp,
    ) -> PresenceHandle {
        let handle = PresenceHandle {
            workspace_id,
            user_id,
            session_id: Uuid::new_v4(),
        };
        let record = PresenceUser::new(user_id, user_name, now);

        let mut channels = self.channels.write().await;
        let channel = channels.entry(workspace_id).or_insert_with(Channel::new);
        channel.sessions.insert(handle.session_id, record.clone());
        channel.emit(PresenceEvent::Join(record));
        channel.emit(PresenceEvent::Sync(channel.online()));

        tracing::debug!(%workspace_id, %user_id, session_id = %handle.session_id, "Presence join");
        handle
    }

    /// Set the session's page and open resource. Returns the updated
    /// record, or `None` if the session already left.
    pub async fn update(
        &self,
        handle: &PresenceHandle,
        page_path: &str,
        resource: Option<ResourceRef>,
        now: Timestamp,
    ) -> Option<PresenceUser> {
        let mut channels = self.channels.write().await;
        let channel = channels.get_mut(&handle.workspace_id)?;
        let record = channel.sessions.get_mut(&handle.session_id)?;
        record.page_path = page_path.to_string();
        record.resource = resource;
        record.touch(now);
        let updated = record.clone();
        channel.emit(PresenceEvent::Update(updated.clone()));
        Some(updated)
    }

    /// Refresh `last_seen`. Returns `false` if the session already left.
    pub async fn heartbeat(&self, handle: &PresenceHandle, now: Timestamp) -> bool {
        let mut channels = self.channels.write().await;
        match channels
            .get_mut(&handle.workspace_id)
            .and_then(|c| c.sessions.get_mut(&handle.session_id))
        {
            Some(record) => {
                record.touch(now);
                true
            }
            None => false,
        }
    }

    /// Remove a session. Idempotent: repeated calls return an empty outcome.
    ///
    /// Subscribers get `Leave` when this was the user's last session, and a
    /// fresh `Sync` either way.
    pub async fn leave(&self, handle: &PresenceHandle) -> LeaveOutcome {
        let mut channels = self.channels.write().await;
        let Some(channel) = channels.get_mut(&handle.workspace_id) else {
            return LeaveOutcome::default();
        };
        let Some(record) = channel.sessions.remove(&handle.session_id) else {
            return LeaveOutcome::default();
        };

        let last_session = !channel.has_user(handle.user_id);
        if last_session {
            channel.emit(PresenceEvent::Leave(handle.user_id));
        }
        channel.emit(PresenceEvent::Sync(channel.online()));

        if channel.is_idle() {
            channels.remove(&handle.workspace_id);
        }

        tracing::debug!(
            workspace_id = %handle.workspace_id,
            user_id = %handle.user_id,
            session_id = %handle.session_id,
            last_session,
            "Presence leave"
        );
        LeaveOutcome {
            record: Some(record),
            last_session,
        }
    }

    /// Everyone online in the workspace, one record per user.
    pub async fn list_online(&self, workspace_id: WorkspaceId) -> Vec<PresenceUser> {
        self.channels
            .read()
            .await
            .get(&workspace_id)
            .map(Channel::online)
            .unwrap_or_default()
    }

    /// Users with at least one session on `page_path`.
    pub async fn users_on_page(
        &self,
        workspace_id: WorkspaceId,
        page_path: &str,
    ) -> Vec<PresenceUser> {
        self.channels
            .read()
            .await
            .get(&workspace_id)
            .map(|c| c.matching(|u| u.is_on_page(page_path)))
            .unwrap_or_default()
    }

    /// Users with at least one session focused on the resource.
    pub async fn users_on_resource(
        &self,
        workspace_id: WorkspaceId,
        resource_type: &str,
        resource_id: &str,
    ) -> Vec<PresenceUser> {
        self.channels
            .read()
            .await
            .get(&workspace_id)
            .map(|c| c.matching(|u| u.is_on_resource(resource_type, resource_id)))
            .unwrap_or_default()
    }

    /// Receive every later change in the workspace.
    pub async fn subscribe(&self, workspace_id: WorkspaceId) -> broadcast::Receiver<PresenceEvent> {
        self.channels
            .write()
            .await
            .entry(workspace_id)
            .or_insert_with(Channel::new)
            .sender
            .subscribe()
    }

    /// Sessions whose `last_seen` is older than `timeout_secs`, across all
    /// workspaces. Callers remove them through [`leave`] so lock cleanup
    /// follows the normal path.
    ///
    /// [`leave`]: PresenceDirectory::leave
    pub async fn stale_sessions(&self, now: Timestamp, timeout_secs: i64) -> Vec<PresenceHandle> {
        self.channels
            .read()
            .await
            .iter()
            .flat_map(|(workspace_id, channel)| {
                channel
                    .sessions
                    .iter()
                    .filter(|(_, record)| record.is_stale(now, timeout_secs))
                    .map(|(session_id, record)| PresenceHandle {
                        workspace_id: *workspace_id,
                        user_id: record.user_id,
                        session_id: *session_id,
                    })
            })
            .collect()
    }

    /// Drop workspace channels with no sessions and no subscribers.
    /// Returns how many were removed.
    pub async fn prune_idle(&self) -> usize {
        let mut channels = self.channels.write().await;
        let before = channels.len();
        channels.retain(|_, channel| !channel.is_idle());
        before - channels.len()
    }

    pub async fn workspace_count(&self) -> usize {
        self.channels.read().await.len()
    }

    /// Total sessions in a workspace, duplicates included.
    pub async fn session_count(&self, workspace_id: WorkspaceId) -> usize {
        self.channels
            .read()
            .await
            .get(&workspace_id)
            .map_or(0, |c| c.sessions.len())
    }
}

impl Default for PresenceDirectory {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
