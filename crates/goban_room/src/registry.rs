//! Maps room ids to running [`RoomActor`] handles, creating rooms lazily
//! and tying their lifetime to a parent cancellation scope.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::actor::{RoomActor, RoomHandle};
use crate::persistence::{NoopPersistence, RoomPersistence};

const DEFAULT_ROOM_ID: &str = "default";

fn normalize(id: &str) -> &str {
    if id.is_empty() {
        DEFAULT_ROOM_ID
    } else {
        id
    }
}

/// Owns every room in the server. A passive object: all board state lives
/// on the room actors it hands out handles to.
pub struct RoomRegistry {
    rooms: RwLock<FxHashMap<String, RoomHandle>>,
    cancel: CancellationToken,
    persistence: Arc<dyn RoomPersistence>,
}

impl RoomRegistry {
    /// A registry with no persistence adapter attached.
    #[must_use]
    pub fn new(cancel: CancellationToken) -> Self {
        Self::with_persistence(cancel, Arc::new(NoopPersistence))
    }

    #[must_use]
    pub fn with_persistence(cancel: CancellationToken, persistence: Arc<dyn RoomPersistence>) -> Self {
        Self {
            rooms: RwLock::default(),
            cancel,
            persistence,
        }
    }

    /// Returns the handle for `id`, creating the room under this
    /// registry's cancellation scope if it doesn't exist yet.
    ///
    /// Double-checked: a reader-role lookup runs first; only on a miss does
    /// this take the writer role, where it re-checks before instantiating
    /// so two concurrent callers never spawn two actors for the same id.
    pub fn attach(&self, id: &str) -> RoomHandle {
        let id = normalize(id);
        if let Some(handle) = self.rooms.read().get(id) {
            return handle.clone();
        }

        let mut rooms = self.rooms.write();
        if let Some(handle) = rooms.get(id) {
            return handle.clone();
        }

        info!(room = id, "creating room");
        let room_cancel = self.cancel.child_token();
        let handle = RoomActor::spawn(id, room_cancel, Arc::clone(&self.persistence));
        rooms.insert(id.to_owned(), handle.clone());
        handle
    }

    /// Non-creating lookup. The boolean reports whether the room already
    /// existed, for callers that care about the distinction beyond the
    /// `Option` alone.
    #[must_use]
    pub fn lookup(&self, id: &str) -> (Option<RoomHandle>, bool) {
        let id = normalize(id);
        let handle = self.rooms.read().get(id).cloned();
        let present = handle.is_some();
        (handle, present)
    }

    /// Detaches `id` from the registry. Does not cancel the room actor;
    /// callers that want that should cancel its child token separately.
    pub fn remove(&self, id: &str) {
        let id = normalize(id);
        if self.rooms.write().remove(id).is_some() {
            debug!(room = id, "room removed from registry");
        }
    }

    /// Every known room id paired with its current attached-connection
    /// count, for the lobby endpoint.
    #[must_use]
    pub fn list(&self) -> Vec<(String, usize)> {
        self.rooms
            .read()
            .iter()
            .map(|(id, handle)| (id.clone(), handle.connection_count()))
            .collect()
    }
}
