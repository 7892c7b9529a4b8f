//! Shared helpers for coordinator integration tests.
//!
//! Everything runs against the in-memory stores with a manually advanced
//! clock, so lease expiry can be exercised without waiting.

#![allow(dead_code)]

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use huddle_collab::{Clock, CollabServices, Coordinator, Identity};
use huddle_core::collaboration::LeaseTtl;
use huddle_core::roles::{ROLE_MEMBER, ROLE_SUPER_ADMIN};
use huddle_core::types::{Timestamp, WorkspaceId};
use huddle_db::models::activity::CreateActivityLog;
use huddle_db::models::change_history::CreateChangeHistory;
use huddle_db::MemoryLockStore;
use huddle_events::{AuditRecord, AuditSink};
use uuid::Uuid;

pub const TTL_MINS: i64 = 30;

pub fn lease_ttl() -> LeaseTtl {
    LeaseTtl::from_mins(TTL_MINS).unwrap()
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// A clock that only moves when told to.
#[derive(Clone)]
pub struct TestClock {
    base: Timestamp,
    offset_secs: Arc<AtomicI64>,
}

impl TestClock {
    pub fn new() -> Self {
        Self {
            base: Utc::now(),
            offset_secs: Arc::new(AtomicI64::new(0)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.offset_secs.fetch_add(by.num_seconds(), Ordering::SeqCst);
    }

    pub fn clock(&self) -> Clock {
        let base = self.base;
        let offset = self.offset_secs.clone();
        Arc::new(move || base + Duration::seconds(offset.load(Ordering::SeqCst)))
    }
}

// ---------------------------------------------------------------------------
// Audit sink
// ---------------------------------------------------------------------------

/// Captures audit records in memory for assertions.
#[derive(Default)]
pub struct RecordingSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl RecordingSink {
    pub fn actions(&self) -> Vec<String> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter_map(|r| match r {
                AuditRecord::Activity(entry) => Some(entry.action.clone()),
                AuditRecord::Change(_) => None,
            })
            .collect()
    }

    pub fn changes(&self) -> Vec<CreateChangeHistory> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter_map(|r| match r {
                AuditRecord::Change(entry) => Some(entry.clone()),
                AuditRecord::Activity(_) => None,
            })
            .collect()
    }

    pub fn activities(&self) -> Vec<CreateActivityLog> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter_map(|r| match r {
                AuditRecord::Activity(entry) => Some(entry.clone()),
                AuditRecord::Change(_) => None,
            })
            .collect()
    }
}

impl AuditSink for RecordingSink {
    fn log_action(&self, entry: CreateActivityLog) {
        self.records.lock().unwrap().push(AuditRecord::Activity(entry));
    }

    fn log_field_change(&self, entry: CreateChangeHistory) {
        self.records.lock().unwrap().push(AuditRecord::Change(entry));
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub store: Arc<MemoryLockStore>,
    pub audit: Arc<RecordingSink>,
    pub clock: TestClock,
    pub services: Arc<CollabServices>,
    pub workspace_id: WorkspaceId,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(MemoryLockStore::new());
        let audit = Arc::new(RecordingSink::default());
        Self::with_sink(store, audit)
    }

    pub fn with_sink(store: Arc<MemoryLockStore>, audit: Arc<RecordingSink>) -> Self {
        let clock = TestClock::new();
        let services = Arc::new(CollabServices::with_clock(
            store.clone(),
            audit.clone(),
            lease_ttl(),
            clock.clock(),
        ));
        Self {
            store,
            audit,
            clock,
            services,
            workspace_id: Uuid::new_v4(),
        }
    }

    pub fn member(&self, name: &str) -> Coordinator {
        self.coordinator(name, ROLE_MEMBER)
    }

    pub fn super_admin(&self, name: &str) -> Coordinator {
        self.coordinator(name, ROLE_SUPER_ADMIN)
    }

    pub fn coordinator(&self, name: &str, role: &str) -> Coordinator {
        Coordinator::new(
            self.services.clone(),
            Identity {
                workspace_id: self.workspace_id,
                user_id: Uuid::new_v4(),
                user_name: name.to_string(),
                contact: Some(format!("{}@example.com", name.to_lowercase())),
                role: role.to_string(),
                session_id: Some(Uuid::new_v4().to_string()),
            },
        )
    }

    /// A second connection for the same user.
    pub fn another_tab(&self, of: &Coordinator) -> Coordinator {
        let mut identity = of.identity().clone();
        identity.session_id = Some(Uuid::new_v4().to_string());
        Coordinator::new(self.services.clone(), identity)
    }

    pub fn expire_leases(&self) {
        self.clock.advance(Duration::minutes(TTL_MINS) + Duration::seconds(1));
    }
}
