//! Realtime multi-room server for an infinite-board Go variant.
//!
//! This crate is a thin facade over the workspace's component crates, for
//! embedders that want to assemble their own binary instead of using
//! `goban-server`: [`core`] for sparse board storage, [`engine`] for
//! capture resolution, [`protocol`] for the wire schema, and [`room`] for
//! the room actor and registry. [`net`] (feature `net`, default-enabled)
//! adds the HTTP/WebSocket transport; [`persist`] (feature `persistence`)
//! adds an optional Postgres-backed persistence adapter.

pub use goban_core as core;
pub use goban_engine as engine;
pub use goban_protocol as protocol;
pub use goban_room as room;

#[cfg(feature = "net")]
pub use goban_net as net;

#[cfg(feature = "persistence")]
pub use goban_persist as persist;
