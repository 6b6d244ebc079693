// Bidirectional WebSocket correlator (C5 / §4.5.8). Agent tools running
// server-side request data from the client that originated the chat; this
// module ties a server-side tool call to the client's reply via `request_id`.
// Grounded on the `ConnectionManager` class in `websocket.py` (the
// `pending`/`client_requests`/`last_ping` maps and the 30s/60s timing
// constants) and on `nisarsyed-openconv`'s `ws/state.rs` + `ws/connection.rs`
// for the idiomatic DashMap-registry / mpsc-send-loop shape.

pub mod connection;
pub mod registry;
pub mod sweeper;

pub use registry::{ClientMessage, ServerMessage, WsRegistry};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WsError {
    #[error("client is not connected")]
    NotConnected,

    #[error("request timed out")]
    Timeout,

    #[error("client disconnected before responding")]
    Disconnected,

    #[error("{0}")]
    Remote(String),
}
