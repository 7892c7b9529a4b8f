//! Fire-and-forget audit logging.
//!
//! [`AuditSink`] methods return `()`: a caller can never observe, await or
//! be blocked by an audit failure. [`AuditLogger`] pushes records onto a
//! bounded queue with `try_send` and drops them when the queue is full;
//! [`AuditWriter`] drains the queue into an [`AuditStore`] in the
//! background, logging and discarding store errors.

use std::sync::Arc;

use huddle_core::audit::redact_details;
use huddle_db::models::activity::CreateActivityLog;
use huddle_db::models::change_history::CreateChangeHistory;
use huddle_db::AuditStore;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// One queued audit write.
#[derive(Debug, Clone)]
pub enum AuditRecord {
    Activity(CreateActivityLog),
    Change(CreateChangeHistory),
}

/// Destination for audit entries that never reports failure.
pub trait AuditSink: Send + Sync {
    fn log_action(&self, entry: CreateActivityLog);

    fn log_field_change(&self, entry: CreateChangeHistory);
}

// ---------------------------------------------------------------------------
// AuditLogger
// ---------------------------------------------------------------------------

/// Queue-backed [`AuditSink`]. Cheap to clone.
#[derive(Clone)]
pub struct AuditLogger {
    sender: mpsc::Sender<AuditRecord>,
}

impl AuditLogger {
    /// Create a logger and the receiver an [`AuditWriter`] drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<AuditRecord>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    fn enqueue(&self, record: AuditRecord) {
        match self.sender.try_send(record) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(record)) => {
                tracing::warn!(record = ?record, "Audit queue full, dropping entry");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!("Audit writer stopped, dropping entry");
            }
        }
    }
}

impl AuditSink for AuditLogger {
    fn log_action(&self, mut entry: CreateActivityLog) {
        entry.details = entry.details.as_ref().map(redact_details);
        self.enqueue(AuditRecord::Activity(entry));
    }

    fn log_field_change(&self, entry: CreateChangeHistory) {
        self.enqueue(AuditRecord::Change(entry));
    }
}

// ---------------------------------------------------------------------------
// AuditWriter
// ---------------------------------------------------------------------------

/// Background service that persists queued audit records.
pub struct AuditWriter;

impl AuditWriter {
    /// Run the writer loop.
    ///
    /// Exits when every [`AuditLogger`] has been dropped, or when `cancel`
    /// fires, after writing whatever is already queued.
    pub async fn run(
        store: Arc<dyn AuditStore>,
        mut receiver: mpsc::Receiver<AuditRecord>,
        cancel: CancellationToken,
    ) {
        tracing::info!("Audit writer started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    receiver.close();
                    while let Some(record) = receiver.recv().await {
                        Self::persist(store.as_ref(), record).await;
                    }
                    tracing::info!("Audit writer stopping");
                    break;
                }
                next = receiver.recv() => match next {
                    Some(record) => Self::persist(store.as_ref(), record).await,
                    None => {
                        tracing::info!("Audit queue closed, writer shutting down");
                        break;
                    }
                },
            }
        }
    }

    async fn persist(store: &dyn AuditStore, record: AuditRecord) {
        match record {
            AuditRecord::Activity(entry) => {
                if let Err(e) = store.insert_activity(&entry).await {
                    tracing::error!(
                        error = %e,
                        action = %entry.action,
                        user_id = %entry.user_id,
                        "Failed to write activity log"
                    );
                }
            }
            AuditRecord::Change(entry) => {
                if let Err(e) = store.insert_change(&entry).await {
                    tracing::error!(
                        error = %e,
                        resource_type = %entry.resource_type,
                        resource_id = %entry.resource_id,
                        field = %entry.field_name,
                        "Failed to write change history"
                    );
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
