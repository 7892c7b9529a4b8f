//! Collaboration services: leases, co-editing, conflict resolution and
//! the per-connection [`Coordinator`] facade business code talks to.
//!
//! Correctness rests on the [`LockStore`](huddle_db::LockStore)'s
//! conditional writes and the lease TTL. Nothing here holds a lock across
//! an await on behalf of a resource.

pub mod clock;
pub mod conflict;
pub mod coordinator;
pub mod error;
pub mod lock_manager;
pub mod services;
pub mod session;

pub use clock::{system_clock, Clock};
pub use conflict::{ConflictResolver, Resolution, ResolutionOutcome};
pub use coordinator::{ActionLog, Coordinator, Identity};
pub use error::{CollabError, CollabResult};
pub use lock_manager::{AcquireOutcome, LockManager, ReleaseOutcome};
pub use services::CollabServices;
pub use session::CollaborationSession;
