//! Row models and insert DTOs.

pub mod activity;
pub mod change_history;
pub mod lock;
