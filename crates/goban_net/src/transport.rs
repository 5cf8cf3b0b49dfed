//! The two halves of a connection's message channel, abstracted behind
//! traits so [`crate::connection::run_connection`] never depends on a
//! concrete transport.

use async_trait::async_trait;

/// The read half of a connection's transport: yields complete text frames.
#[async_trait]
pub trait InboundHalf: Send {
    /// Reads the next frame. `Ok(None)` signals a clean close.
    async fn recv(&mut self) -> std::io::Result<Option<String>>;
}

/// The write half of a connection's transport.
#[async_trait]
pub trait OutboundHalf: Send {
    /// Writes one frame.
    async fn send(&mut self, frame: String) -> std::io::Result<()>;
}
