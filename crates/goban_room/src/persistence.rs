//! Optional, best-effort persistence hook invoked by [`crate::RoomActor`].
//!
//! This trait uses [`mod@async_trait`], mirroring how `valence_network`
//! exposes its own server-lifecycle callbacks. The default implementation
//! does nothing, so the in-memory core never requires an adapter to be
//! wired up.

use async_trait::async_trait;
use goban_core::Cell;

/// Sink for room lifecycle events. Implementations should not block for
/// long; [`RoomActor`](crate::RoomActor) spawns each call onto the tokio
/// runtime and logs failures rather than propagating them to clients.
#[async_trait]
pub trait RoomPersistence: Send + Sync + 'static {
    /// Called after a move request is resolved, accepted or not.
    async fn on_move(&self, room_id: &str, x: i64, y: i64, color_byte: u8, accepted: bool, server_seq: u64) {
        let _ = (room_id, x, y, color_byte, accepted, server_seq);
    }

    /// Called after a board reset.
    async fn on_reset(&self, room_id: &str, server_seq: u64) {
        let _ = (room_id, server_seq);
    }

    /// Called when a connection attaches to or detaches from a room.
    async fn on_presence_change(&self, room_id: &str, connection_count: usize) {
        let _ = (room_id, connection_count);
    }

    /// Called by [`RoomActor`](crate::RoomActor) with a full board
    /// checkpoint: every `SNAPSHOT_INTERVAL` accepted moves, and once more
    /// after every reset.
    async fn on_snapshot(&self, room_id: &str, server_seq: u64, cells: &[Cell]) {
        let _ = (room_id, server_seq, cells);
    }
}

/// The default adapter: every hook is a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPersistence;

#[async_trait]
impl RoomPersistence for NoopPersistence {}
