//! WebSocket module for real-time session observation

mod connection;
mod protocol;

pub use connection::ws_handler;
pub use protocol::{ClientMessage, ServerMessage, fanout_to_server_message};
