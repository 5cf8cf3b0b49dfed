//! The single-writer room actor: owns one board's [`ChunkStore`] and
//! sequence counter, and the reader-biased set of connections attached to
//! it for delta fan-out.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use goban_core::{Cell, ChunkStore, Color};
use goban_engine::{resolve, Rejection};
use goban_protocol::{DeltaUpdateBody, MoveResultBody, OutboundEnvelope, RejectReason};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::persistence::RoomPersistence;

/// Bound on a room's request queue. Requests beyond this back up the
/// sender; unlike the outbound connection buffer, this is allowed to
/// apply backpressure rather than drop.
const REQUEST_QUEUE_CAPACITY: usize = 256;

/// How often an accepted move triggers a full-board checkpoint via
/// [`RoomPersistence::on_snapshot`]. Every reset also checkpoints,
/// regardless of this interval, since it is a large state transition.
const SNAPSHOT_INTERVAL: u64 = 50;

/// Identifies one connection within a room's fan-out set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

/// A full-board snapshot returned to a single requester.
#[derive(Debug, Clone)]
pub struct StateBody {
    pub cells: Vec<Cell>,
    pub server_seq: u64,
}

/// One request accepted onto a room's queue. Each carries its own reply
/// channel so the actor never needs to look the requester up in the
/// connection set to answer it.
pub enum RoomRequest {
    Move {
        x: i64,
        y: i64,
        color: Color,
        reply: oneshot::Sender<MoveResultBody>,
    },
    GetState {
        reply: oneshot::Sender<StateBody>,
    },
    Reset {
        reply: oneshot::Sender<()>,
    },
}

/// The reader-biased set of connections attached to one room. The actor
/// only ever takes the reader role, to fan a serialized delta out; attach
/// and detach take the writer role.
#[derive(Default)]
struct ConnectionSet {
    next_id: AtomicU64,
    outbound: RwLock<FxHashMap<ConnectionId, flume::Sender<String>>>,
}

impl ConnectionSet {
    fn attach(&self, outbound: flume::Sender<String>) -> ConnectionId {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.outbound.write().insert(id, outbound);
        id
    }

    fn detach(&self, id: ConnectionId) {
        self.outbound.write().remove(&id);
    }

    fn count(&self) -> usize {
        self.outbound.read().len()
    }

    /// Hands `frame` to every attached connection's outbound buffer. A full
    /// or closed buffer drops the message; the actor is never blocked.
    fn fan_out(&self, room_id: &str, frame: &str) {
        for (id, sender) in self.outbound.read().iter() {
            if sender.try_send(frame.to_owned()).is_err() {
                warn!(room = room_id, connection = id.0, "dropped delta: outbound buffer full or closed");
            }
        }
    }
}

fn map_rejection(reason: Rejection) -> RejectReason {
    match reason {
        Rejection::OutOfBounds => RejectReason::OutOfBounds,
        Rejection::Occupied => RejectReason::Occupied,
    }
}

/// A cheaply cloneable reference to a running room. The only way a
/// connection adapter interacts with a room's state.
#[derive(Clone)]
pub struct RoomHandle {
    inner: Arc<RoomHandleInner>,
}

struct RoomHandleInner {
    room_id: String,
    requests: mpsc::Sender<RoomRequest>,
    connections: Arc<ConnectionSet>,
    seq_mirror: Arc<AtomicU64>,
    persistence: Arc<dyn RoomPersistence>,
}

impl RoomHandle {
    #[must_use]
    pub fn room_id(&self) -> &str {
        &self.inner.room_id
    }

    /// Attaches a connection's outbound buffer to this room's fan-out set.
    pub fn attach_connection(&self, outbound: flume::Sender<String>) -> ConnectionId {
        let id = self.inner.connections.attach(outbound);
        self.notify_presence_change();
        id
    }

    /// Detaches a connection. A no-op if it was already detached.
    pub fn detach_connection(&self, id: ConnectionId) {
        self.inner.connections.detach(id);
        self.notify_presence_change();
    }

    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.inner.connections.count()
    }

    /// The room's current sequence number, readable without a round trip
    /// through the request queue.
    #[must_use]
    pub fn current_seq(&self) -> u64 {
        self.inner.seq_mirror.load(Ordering::Acquire)
    }

    /// Submits a move and awaits its result. Returns `None` if the room
    /// actor has already shut down.
    pub async fn request_move(&self, x: i64, y: i64, color: Color) -> Option<MoveResultBody> {
        let (reply, reply_rx) = oneshot::channel();
        self.inner
            .requests
            .send(RoomRequest::Move { x, y, color, reply })
            .await
            .ok()?;
        reply_rx.await.ok()
    }

    /// Requests a full-board snapshot. Returns `None` if the room actor has
    /// already shut down.
    pub async fn request_state(&self) -> Option<StateBody> {
        let (reply, reply_rx) = oneshot::channel();
        self.inner.requests.send(RoomRequest::GetState { reply }).await.ok()?;
        reply_rx.await.ok()
    }

    /// Requests a board reset. Returns `None` if the room actor has
    /// already shut down.
    pub async fn request_reset(&self) -> Option<()> {
        let (reply, reply_rx) = oneshot::channel();
        self.inner.requests.send(RoomRequest::Reset { reply }).await.ok()?;
        reply_rx.await.ok()
    }

    fn notify_presence_change(&self) {
        let persistence = Arc::clone(&self.inner.persistence);
        let room_id = self.inner.room_id.clone();
        let count = self.connection_count();
        tokio::spawn(async move {
            persistence.on_presence_change(&room_id, count).await;
        });
    }
}

/// The single-writer task owning one room's board. All reads and writes to
/// the board happen on this task; nothing else ever touches the
/// [`ChunkStore`] directly.
pub struct RoomActor {
    room_id: String,
    store: ChunkStore,
    seq: u64,
    requests: mpsc::Receiver<RoomRequest>,
    connections: Arc<ConnectionSet>,
    seq_mirror: Arc<AtomicU64>,
    persistence: Arc<dyn RoomPersistence>,
    cancel: CancellationToken,
}

impl RoomActor {
    /// Spawns the actor task and returns a handle to it. `cancel` should be
    /// a child of the registry's cancellation scope so cascading shutdown
    /// reaches this room.
    pub fn spawn(room_id: impl Into<String>, cancel: CancellationToken, persistence: Arc<dyn RoomPersistence>) -> RoomHandle {
        let room_id = room_id.into();
        let (tx, rx) = mpsc::channel(REQUEST_QUEUE_CAPACITY);
        let connections = Arc::new(ConnectionSet::default());
        let seq_mirror = Arc::new(AtomicU64::new(0));

        let actor = RoomActor {
            room_id: room_id.clone(),
            store: ChunkStore::new(),
            seq: 0,
            requests: rx,
            connections: Arc::clone(&connections),
            seq_mirror: Arc::clone(&seq_mirror),
            persistence: Arc::clone(&persistence),
            cancel,
        };
        tokio::spawn(actor.run());

        RoomHandle {
            inner: Arc::new(RoomHandleInner {
                room_id,
                requests: tx,
                connections,
                seq_mirror,
                persistence,
            }),
        }
    }

    #[instrument(name = "room_actor", skip(self), fields(room = %self.room_id))]
    async fn run(mut self) {
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!("room actor cancelled");
                    break;
                }
                request = self.requests.recv() => {
                    match request {
                        Some(request) => self.handle(request).await,
                        None => {
                            debug!("room actor request channel closed");
                            break;
                        }
                    }
                }
            }
        }
    }

    async fn handle(&mut self, request: RoomRequest) {
        match request {
            RoomRequest::Move { x, y, color, reply } => self.handle_move(x, y, color, reply).await,
            RoomRequest::GetState { reply } => {
                let _ = reply.send(StateBody {
                    cells: self.store.snapshot(),
                    server_seq: self.seq,
                });
            }
            RoomRequest::Reset { reply } => self.handle_reset(reply).await,
        }
    }

    async fn handle_move(&mut self, x: i64, y: i64, color: Color, reply: oneshot::Sender<MoveResultBody>) {
        let outcome = resolve(&mut self.store, x, y, color);

        let body = if outcome.accepted {
            self.seq += 1;
            self.seq_mirror.store(self.seq, Ordering::Release);

            let body = MoveResultBody::accepted(outcome.removed.clone(), outcome.added, self.seq);
            let delta = DeltaUpdateBody::new(outcome.added, outcome.removed, self.seq);
            self.broadcast(OutboundEnvelope::DeltaUpdate { delta_update: delta });
            self.spawn_persist_move(x, y, color, true);
            if self.seq % SNAPSHOT_INTERVAL == 0 {
                self.spawn_persist_snapshot();
            }
            body
        } else {
            let reason = map_rejection(outcome.reason.expect("rejected outcome carries a reason"));
            self.spawn_persist_move(x, y, color, false);
            MoveResultBody::rejected(reason, self.seq)
        };

        let _ = reply.send(body);
    }

    async fn handle_reset(&mut self, reply: oneshot::Sender<()>) {
        let removed = self.store.clear();
        self.seq += 1;
        self.seq_mirror.store(self.seq, Ordering::Release);

        let delta = DeltaUpdateBody::new(None, removed, self.seq);
        self.broadcast(OutboundEnvelope::DeltaUpdate { delta_update: delta });

        let persistence = Arc::clone(&self.persistence);
        let room_id = self.room_id.clone();
        let seq = self.seq;
        tokio::spawn(async move {
            persistence.on_reset(&room_id, seq).await;
        });
        self.spawn_persist_snapshot();

        let _ = reply.send(());
    }

    fn broadcast(&self, envelope: OutboundEnvelope) {
        match envelope.to_frame() {
            Ok(frame) => self.connections.fan_out(&self.room_id, &frame),
            Err(error) => warn!(room = %self.room_id, %error, "failed to serialize outbound envelope"),
        }
    }

    fn spawn_persist_move(&self, x: i64, y: i64, color: Color, accepted: bool) {
        let persistence = Arc::clone(&self.persistence);
        let room_id = self.room_id.clone();
        let seq = self.seq;
        let color_byte: u8 = color.into();
        tokio::spawn(async move {
            persistence.on_move(&room_id, x, y, color_byte, accepted, seq).await;
        });
    }

    /// Checkpoints the full board, called every [`SNAPSHOT_INTERVAL`]
    /// accepted moves and on every reset.
    fn spawn_persist_snapshot(&self) {
        let persistence = Arc::clone(&self.persistence);
        let room_id = self.room_id.clone();
        let seq = self.seq;
        let cells = self.store.snapshot();
        tokio::spawn(async move {
            persistence.on_snapshot(&room_id, seq, &cells).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::NoopPersistence;
    use goban_protocol::RejectReason;

    fn spawn_room(room_id: &str) -> RoomHandle {
        RoomActor::spawn(room_id, CancellationToken::new(), Arc::new(NoopPersistence))
    }

    /// Records every `server_seq` passed to `on_snapshot`, so tests can
    /// confirm the actor actually drives the checkpoint hook.
    #[derive(Default)]
    struct RecordingPersistence {
        snapshots: parking_lot::Mutex<Vec<u64>>,
    }

    #[async_trait::async_trait]
    impl RoomPersistence for RecordingPersistence {
        async fn on_snapshot(&self, _room_id: &str, server_seq: u64, _cells: &[Cell]) {
            self.snapshots.lock().push(server_seq);
        }
    }

    #[tokio::test]
    async fn seq_is_monotonic_and_only_advances_on_acceptance() {
        let room = spawn_room("t1");
        assert_eq!(room.current_seq(), 0);

        let rejected = room.request_move(1i64 << 40, 0, Color::Black).await.unwrap();
        assert!(!rejected.accepted);
        assert_eq!(rejected.reason, Some(RejectReason::OutOfBounds));
        assert_eq!(rejected.server_seq, 0);

        let first = room.request_move(0, 0, Color::Black).await.unwrap();
        assert!(first.accepted);
        assert_eq!(first.server_seq, 1);

        let occupied = room.request_move(0, 0, Color::White).await.unwrap();
        assert!(!occupied.accepted);
        assert_eq!(occupied.server_seq, 1);

        let second = room.request_move(1, 0, Color::Black).await.unwrap();
        assert!(second.accepted);
        assert_eq!(second.server_seq, 2);
        assert_eq!(room.current_seq(), 2);
    }

    #[tokio::test]
    async fn get_state_reflects_accepted_moves_only() {
        let room = spawn_room("t2");
        room.request_move(0, 0, Color::Black).await.unwrap();
        let _ = room.request_move(0, 0, Color::White).await.unwrap();

        let state = room.request_state().await.unwrap();
        assert_eq!(state.server_seq, 1);
        assert_eq!(state.cells.len(), 1);
        assert_eq!(state.cells[0].color, Color::Black);
    }

    #[tokio::test]
    async fn reset_clears_board_and_broadcasts_removed_cells() {
        let room = spawn_room("t3");
        room.request_move(0, 0, Color::Black).await.unwrap();
        room.request_move(1, 0, Color::White).await.unwrap();

        let (tx, rx) = flume::bounded(8);
        let connection = room.attach_connection(tx);
        room.request_reset().await.unwrap();

        let frame = rx.try_recv().expect("reset delta should have been fanned out");
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["type"], "delta_update");
        assert_eq!(value["delta_update"]["removed"].as_array().unwrap().len(), 2);
        assert_eq!(value["delta_update"]["server_seq"], 3);

        let state = room.request_state().await.unwrap();
        assert!(state.cells.is_empty());
        room.detach_connection(connection);
    }

    #[tokio::test]
    async fn reset_triggers_a_snapshot_checkpoint() {
        let persistence = Arc::new(RecordingPersistence::default());
        let room = RoomActor::spawn("snap-reset", CancellationToken::new(), persistence.clone());

        room.request_move(0, 0, Color::Black).await.unwrap();
        room.request_reset().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert_eq!(persistence.snapshots.lock().last().copied(), Some(2));
    }

    #[tokio::test]
    async fn accepted_moves_checkpoint_every_snapshot_interval() {
        let persistence = Arc::new(RecordingPersistence::default());
        let room = RoomActor::spawn("snap-interval", CancellationToken::new(), persistence.clone());

        for i in 0..SNAPSHOT_INTERVAL {
            let x = i64::try_from(i * 2).unwrap();
            let result = room.request_move(x, 0, Color::Black).await.unwrap();
            assert!(result.accepted);
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert_eq!(*persistence.snapshots.lock(), vec![SNAPSHOT_INTERVAL]);
    }

    #[tokio::test]
    async fn fan_out_skips_a_full_outbound_buffer_without_blocking() {
        let room = spawn_room("t4");
        let (tx, rx) = flume::bounded(1);
        let _connection = room.attach_connection(tx);

        // First delta fills the one-slot buffer; it is left undrained.
        let first = room.request_move(0, 0, Color::Black).await.unwrap();
        assert!(first.accepted);

        // Both of these deltas have nowhere to go and must be dropped
        // rather than stalling the actor.
        let second = room.request_move(5, 5, Color::Black).await.unwrap();
        assert!(second.accepted);
        let third = room.request_move(6, 6, Color::Black).await.unwrap();
        assert!(third.accepted, "actor must not stall even though the buffer can't take more deltas");

        // Exactly the first delta made it through.
        let frame = rx.try_recv().expect("first delta should have been buffered");
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["delta_update"]["server_seq"], 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn cancellation_stops_the_actor_loop() {
        let cancel = CancellationToken::new();
        let room = RoomActor::spawn("t5", cancel.clone(), Arc::new(NoopPersistence));
        cancel.cancel();
        tokio::task::yield_now().await;
        // Give the actor a moment to observe cancellation and exit; a
        // subsequent request then finds a closed channel.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(room.request_move(0, 0, Color::Black).await.is_none());
    }
}
