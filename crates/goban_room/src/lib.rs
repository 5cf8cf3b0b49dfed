//! Single-writer room actor and room registry.
//!
//! Each room owns exactly one [`goban_core::ChunkStore`] and sequence
//! counter, mutated only on the actor task spawned by [`RoomActor::spawn`].
//! Connections never touch board state directly: they submit requests
//! through a [`RoomHandle`] and receive fanned-out deltas through their own
//! outbound buffer.

mod actor;
mod persistence;
mod registry;

pub use actor::{ConnectionId, RoomActor, RoomHandle, RoomRequest, StateBody};
pub use persistence::{NoopPersistence, RoomPersistence};
pub use registry::RoomRegistry;
