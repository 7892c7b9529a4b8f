//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async query methods
//! that accept `&PgPool` as the first argument.

pub mod activity_log_repo;
pub mod change_history_repo;
pub mod resource_lock_repo;

pub use activity_log_repo::ActivityLogRepo;
pub use change_history_repo::ChangeHistoryRepo;
pub use resource_lock_repo::ResourceLockRepo;
