//! WebSocket transport for presence, field sync and lock events.
//!
//! Provides connection management, the protocol loop behind the HTTP
//! upgrade handler, the lock event relay and the ping heartbeat.

mod handler;
mod heartbeat;
pub mod manager;
mod relay;

pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
pub use manager::WsManager;
pub use relay::LockEventRelay;
