//! Per-resource field-update channels.
//!
//! One broadcast channel per [`ResourceKey`], created lazily on first
//! subscribe. Delivery is best-effort: no replay, no durability, and a
//! slow subscriber simply skips what it missed. Channels nobody listens to
//! are dropped by [`FieldSyncHub::prune`], which a background job runs.

use std::collections::HashMap;
use std::future::Future;

use huddle_core::collaboration::ResourceKey;
use huddle_core::field_sync::FieldUpdate;
use huddle_core::types::UserId;
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;

/// Buffer capacity of each resource channel.
const CHANNEL_CAPACITY: usize = 64;

// ---------------------------------------------------------------------------
// FieldSubscription
// ---------------------------------------------------------------------------

/// A receiver that drops messages sent by its own user.
pub struct FieldSubscription {
    receiver: broadcast::Receiver<FieldUpdate>,
    self_id: UserId,
}

impl FieldSubscription {
    /// Next update from another user, or `None` once the channel closes.
    pub async fn recv(&mut self) -> Option<FieldUpdate> {
        loop {
            match self.receiver.recv().await {
                Ok(update) if update.user_id == self.self_id => continue,
                Ok(update) => return Some(update),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Field subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Handle returned by [`FieldSyncHub::on_field_update`]. Stops the
/// callback when [`unsubscribe`](Unsubscribe::unsubscribe) is called or the
/// handle is dropped.
pub struct Unsubscribe {
    token: CancellationToken,
}

impl Unsubscribe {
    pub fn unsubscribe(self) {
        self.token.cancel();
    }
}

impl Drop for Unsubscribe {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

// ---------------------------------------------------------------------------
// FieldSyncHub
// ---------------------------------------------------------------------------

/// Registry of live resource channels. Share behind an `Arc`.
pub struct FieldSyncHub {
    channels: Mutex<HashMap<ResourceKey, broadcast::Sender<FieldUpdate>>>,
}

impl FieldSyncHub {
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
        }
    }

    async fn sender(&self, key: &ResourceKey) -> broadcast::Sender<FieldUpdate> {
        self.channels
            .lock()
            .await
            .entry(key.clone())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    /// Publish an update to the resource's current subscribers. Returns how
    /// many receivers it reached, the sender's own subscription included.
    ///
    /// With no subscribers there is nothing to deliver, so no channel is
    /// created and an abandoned one is dropped.
    pub async fn broadcast(&self, key: &ResourceKey, update: FieldUpdate) -> usize {
        let mut channels = self.channels.lock().await;
        let Some(sender) = channels.get(key) else {
            return 0;
        };
        match sender.send(update) {
            Ok(reached) => reached,
            Err(_) => {
                channels.remove(key);
                0
            }
        }
    }

    /// Subscribe as `self_id`; updates from `self_id` are never delivered.
    pub async fn subscribe(&self, key: &ResourceKey, self_id: UserId) -> FieldSubscription {
        FieldSubscription {
            receiver: self.sender(key).await.subscribe(),
            self_id,
        }
    }

    /// Run `callback` for every update from another user until the
    /// returned handle is dropped or unsubscribed.
    pub async fn on_field_update<F, Fut>(
        &self,
        key: &ResourceKey,
        self_id: UserId,
        mut callback: F,
    ) -> Unsubscribe
    where
        F: FnMut(FieldUpdate) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut subscription = self.subscribe(key, self_id).await;
        let token = CancellationToken::new();
        let cancel = token.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    next = subscription.recv() => match next {
                        Some(update) => callback(update).await,
                        None => break,
                    },
                }
            }
        });

        Unsubscribe { token }
    }

    /// Drop channels nobody is subscribed to. Returns how many were removed.
    pub async fn prune(&self) -> usize {
        let mut channels = self.channels.lock().await;
        let before = channels.len();
        channels.retain(|_, sender| sender.receiver_count() > 0);
        before - channels.len()
    }

    pub async fn channel_count(&self) -> usize {
        self.channels.lock().await.len()
    }
}

impl Default for FieldSyncHub {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    use super::*;

    fn update(user_id: UserId, field: &str, value: serde_json::Value) -> FieldUpdate {
        FieldUpdate {
            user_id,
            user_name: "tester".into(),
            field: field.into(),
            value,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn subscriber_never_sees_its_own_updates() {
        let hub = FieldSyncHub::new();
        let key = ResourceKey::new(Uuid::new_v4(), "contact", "c1");
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut a_sub = hub.subscribe(&key, a).await;

        hub.broadcast(&key, update(a, "phone", serde_json::json!("1"))).await;
        hub.broadcast(&key, update(b, "phone", serde_json::json!("2"))).await;

        let got = a_sub.recv().await.unwrap();
        assert_eq!(got.user_id, b);
        assert_eq!(got.value, serde_json::json!("2"));
    }

    #[tokio::test]
    async fn channels_are_scoped_per_resource() {
        let hub = FieldSyncHub::new();
        let ws = Uuid::new_v4();
        let c1 = ResourceKey::new(ws, "contact", "c1");
        let c2 = ResourceKey::new(ws, "contact", "c2");
        let mut sub = hub.subscribe(&c1, Uuid::new_v4()).await;

        hub.broadcast(&c2, update(Uuid::new_v4(), "name", serde_json::json!("x"))).await;
        hub.broadcast(&c1, update(Uuid::new_v4(), "name", serde_json::json!("y"))).await;

        assert_eq!(sub.recv().await.unwrap().value, serde_json::json!("y"));
        // Broadcasting to a resource nobody watches opens no channel.
        assert_eq!(hub.channel_count().await, 1);
    }

    #[tokio::test]
    async fn callback_fires_until_unsubscribed() {
        let hub = FieldSyncHub::new();
        let key = ResourceKey::new(Uuid::new_v4(), "task", "t1");
        let (me, other) = (Uuid::new_v4(), Uuid::new_v4());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let handle = hub
            .on_field_update(&key, me, move |u| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(u.field);
                }
            })
            .await;

        hub.broadcast(&key, update(me, "title", serde_json::json!("own"))).await;
        hub.broadcast(&key, update(other, "status", serde_json::json!("done"))).await;

        let field = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(field, "status");

        handle.unsubscribe();
        // Wait for the task to observe cancellation and drop its receiver.
        let closed = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
        assert!(closed.is_none());
    }

    #[tokio::test]
    async fn prune_removes_idle_channels() {
        let hub = FieldSyncHub::new();
        let key = ResourceKey::new(Uuid::new_v4(), "contact", "c1");
        let sub = hub.subscribe(&key, Uuid::new_v4()).await;

        assert_eq!(hub.prune().await, 0);
        drop(sub);
        assert_eq!(hub.prune().await, 1);
        assert_eq!(hub.channel_count().await, 0);
    }

    #[tokio::test]
    async fn broadcast_without_subscribers_reaches_nobody() {
        let hub = FieldSyncHub::new();
        let key = ResourceKey::new(Uuid::new_v4(), "contact", "c1");
        let reached = hub
            .broadcast(&key, update(Uuid::new_v4(), "phone", serde_json::Value::Null))
            .await;
        assert_eq!(reached, 0);
        assert_eq!(hub.channel_count().await, 0);
    }

    #[tokio::test]
    async fn broadcast_drops_a_channel_its_subscribers_left() {
        let hub = FieldSyncHub::new();
        let key = ResourceKey::new(Uuid::new_v4(), "contact", "c1");
        let sub = hub.subscribe(&key, Uuid::new_v4()).await;
        drop(sub);

        let reached = hub
            .broadcast(&key, update(Uuid::new_v4(), "phone", serde_json::json!("1")))
            .await;
        assert_eq!(reached, 0);
        assert_eq!(hub.channel_count().await, 0);
    }

    #[tokio::test]
    async fn prune_reclaims_channels_after_callbacks_unsubscribe() {
        let hub = FieldSyncHub::new();
        let me = Uuid::new_v4();
        let ws = Uuid::new_v4();
        let mut handles = Vec::new();
        for i in 0..20 {
            let key = ResourceKey::new(ws, "task", format!("t{i}"));
            handles.push(hub.on_field_update(&key, me, |_| async {}).await);
        }
        assert_eq!(hub.channel_count().await, 20);

        drop(handles);
        // Callback tasks release their receivers once they see the cancel.
        for _ in 0..100 {
            hub.prune().await;
            if hub.channel_count().await == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(hub.channel_count().await, 0);
    }
}
