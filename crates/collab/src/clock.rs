//! Injectable wall clock.

use std::sync::Arc;

use huddle_core::types::Timestamp;

/// Source of "now" for lease arithmetic. Tests swap in a controllable one.
pub type Clock = Arc<dyn Fn() -> Timestamp + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(chrono::Utc::now)
}
