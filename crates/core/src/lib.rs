//! Domain primitives for the huddle collaboration coordinator.
//!
//! This crate has no internal dependencies so that the storage layer, the
//! pub/sub layer, the coordinator services and the HTTP/WebSocket server all
//! agree on the same constants, identifiers and wire types.

pub mod audit;
pub mod collaboration;
pub mod error;
pub mod field_sync;
pub mod presence;
pub mod protocol;
pub mod roles;
pub mod types;
