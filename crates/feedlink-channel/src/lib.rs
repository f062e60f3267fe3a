//! # FeedLink Channel
//! Live push channel: WebSocket transport, wire frames, heartbeat.

pub mod frame;
pub mod heartbeat;
pub mod ws;

pub use frame::{Frame, HEARTBEAT_REQUEST, HEARTBEAT_RESPONSE, parse_frame};
pub use heartbeat::HeartbeatMonitor;
pub use ws::WsTransport;
