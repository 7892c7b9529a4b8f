//! HTTP request handlers, grouped by resource.

pub mod activity;
pub mod locks;
pub mod presence;
