//! Connection adapter: decodes and validates inbound frames, routes them
//! against a room, and serves the HTTP/WebSocket transport they ride on.

mod connection;
mod dispatch;
mod server;
mod transport;

pub use connection::{run_connection, DEFAULT_WRITE_DEADLINE, MAX_FRAME_BYTES, OUTBOUND_BUFFER_CAPACITY};
pub use dispatch::{dispatch, ConnectionState, Dispatch};
pub use server::router;
pub use transport::{InboundHalf, OutboundHalf};
