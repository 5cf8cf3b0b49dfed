//! Drives one connection: a reader task that decodes and routes inbound
//! frames against a room, and a writer task that drains the connection's
//! outbound buffer. The two share a cancellation signal; a failed write
//! cancels both.
//!
//! This mirrors `valence_network`'s packet-IO split of a connection into a
//! `reader_task`/`writer_task` pair over a bounded channel, generalized from
//! Minecraft packets to JSON frames.

use std::time::Duration;

use goban_protocol::{MoveResultBody, OutboundEnvelope, RejectReason};
use goban_room::RoomHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::dispatch::{dispatch, ConnectionState, Dispatch};
use crate::transport::{InboundHalf, OutboundHalf};

/// Inbound frames larger than this are dropped as a decode failure without
/// being parsed.
pub const MAX_FRAME_BYTES: usize = 64 * 1024;
/// Deadline for a single outbound frame write.
pub const DEFAULT_WRITE_DEADLINE: Duration = Duration::from_secs(10);
/// Depth of a connection's outbound buffer. Once full, fanned-out deltas
/// are dropped rather than blocking the room actor that produced them.
pub const OUTBOUND_BUFFER_CAPACITY: usize = 128;

/// Runs one connection to completion: attaches it to `room`, drives both
/// halves of its transport, and detaches it on exit.
#[instrument(skip_all, fields(room = room.room_id()))]
pub async fn run_connection<I, O>(inbound: I, outbound: O, room: RoomHandle, cancel: CancellationToken)
where
    I: InboundHalf + 'static,
    O: OutboundHalf + 'static,
{
    let (outbound_tx, outbound_rx) = flume::bounded::<String>(OUTBOUND_BUFFER_CAPACITY);
    let connection_id = room.attach_connection(outbound_tx.clone());

    let writer = tokio::spawn(write_loop(outbound, outbound_rx, cancel.clone()));
    let reader = tokio::spawn(read_loop(inbound, outbound_tx, room.clone(), cancel.clone()));

    let _ = reader.await;
    // A closed reader means the connection is done either way; make sure
    // the writer observes it too instead of idling on a channel nobody
    // will ever send to again.
    cancel.cancel();
    let _ = writer.await;

    room.detach_connection(connection_id);
    debug!("connection closed");
}

async fn read_loop<I: InboundHalf>(
    mut inbound: I,
    outbound_tx: flume::Sender<String>,
    room: RoomHandle,
    cancel: CancellationToken,
) {
    let mut state = ConnectionState::default();

    loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            frame = inbound.recv() => frame,
        };

        let raw = match frame {
            Ok(Some(raw)) if raw.len() <= MAX_FRAME_BYTES => raw,
            Ok(Some(oversized)) => {
                warn!(len = oversized.len(), "dropping oversized inbound frame");
                continue;
            }
            Ok(None) => break,
            Err(error) => {
                debug!(%error, "inbound transport closed");
                break;
            }
        };

        let action = dispatch(&state, &raw);
        let reply = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            reply = apply(&mut state, &room, action) => reply,
        };

        match reply {
            Outcome::Reply(envelope) => send_direct(&outbound_tx, &envelope),
            Outcome::NoReply => {}
            Outcome::RoomGone => break,
        }
    }

    cancel.cancel();
}

enum Outcome {
    Reply(OutboundEnvelope),
    NoReply,
    RoomGone,
}

async fn apply(state: &mut ConnectionState, room: &RoomHandle, action: Dispatch) -> Outcome {
    match action {
        Dispatch::SelectColor(color) => {
            state.select_color(color);
            Outcome::Reply(OutboundEnvelope::ColorSelected {
                move_result: MoveResultBody::color_selected(room.current_seq()),
            })
        }
        Dispatch::GetState => match room.request_state().await {
            Some(state) => Outcome::Reply(OutboundEnvelope::State {
                cells: state.cells,
                server_seq: state.server_seq,
            }),
            None => Outcome::RoomGone,
        },
        Dispatch::Restart => match room.request_reset().await {
            Some(()) => Outcome::NoReply,
            None => Outcome::RoomGone,
        },
        Dispatch::Move { x, y, color } => match room.request_move(x, y, color).await {
            Some(body) => Outcome::Reply(OutboundEnvelope::MoveResult { move_result: body }),
            None => Outcome::RoomGone,
        },
        Dispatch::Reject(reason) => Outcome::Reply(OutboundEnvelope::MoveResult {
            move_result: rejected(reason, room.current_seq()),
        }),
    }
}

fn rejected(reason: RejectReason, server_seq: u64) -> MoveResultBody {
    MoveResultBody::rejected(reason, server_seq)
}

fn send_direct(outbound_tx: &flume::Sender<String>, envelope: &OutboundEnvelope) {
    match envelope.to_frame() {
        Ok(frame) => {
            if outbound_tx.try_send(frame).is_err() {
                warn!("dropped direct reply: outbound buffer full or closed");
            }
        }
        Err(error) => warn!(%error, "failed to serialize outbound envelope"),
    }
}

async fn write_loop<O: OutboundHalf>(mut outbound: O, outbound_rx: flume::Receiver<String>, cancel: CancellationToken) {
    loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            frame = outbound_rx.recv_async() => frame,
        };

        let Ok(frame) = frame else {
            break;
        };

        match tokio::time::timeout(DEFAULT_WRITE_DEADLINE, outbound.send(frame)).await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                debug!(%error, "outbound write failed");
                break;
            }
            Err(_) => {
                debug!("outbound write exceeded its deadline");
                break;
            }
        }
    }

    cancel.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use goban_room::{NoopPersistence, RoomActor};
    use serde_json::Value;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    struct ChannelInbound(mpsc::UnboundedReceiver<String>);

    #[async_trait]
    impl InboundHalf for ChannelInbound {
        async fn recv(&mut self) -> std::io::Result<Option<String>> {
            Ok(self.0.recv().await)
        }
    }

    struct ChannelOutbound(mpsc::UnboundedSender<String>);

    #[async_trait]
    impl OutboundHalf for ChannelOutbound {
        async fn send(&mut self, frame: String) -> std::io::Result<()> {
            self.0.send(frame).map_err(|_| std::io::ErrorKind::BrokenPipe.into())
        }
    }

    #[tokio::test]
    async fn full_session_select_move_and_state() {
        let room = RoomActor::spawn("net-test", CancellationToken::new(), Arc::new(NoopPersistence));
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(run_connection(
            ChannelInbound(in_rx),
            ChannelOutbound(out_tx),
            room,
            cancel.clone(),
        ));

        in_tx.send(r#"{"type":"select_color","color":0}"#.to_owned()).unwrap();
        let ack: Value = serde_json::from_str(&out_rx.recv().await.unwrap()).unwrap();
        assert_eq!(ack["type"], "color_selected");

        in_tx.send(r#"{"x":0,"y":0,"color":0}"#.to_owned()).unwrap();
        // The direct move_result reply and the room's own fanned-out delta
        // both land on this connection's buffer; only per-connection order
        // among deltas is guaranteed, not the relative order of these two
        // distinct message kinds, so accept either arrival order.
        let first: Value = serde_json::from_str(&out_rx.recv().await.unwrap()).unwrap();
        let second: Value = serde_json::from_str(&out_rx.recv().await.unwrap()).unwrap();
        let (move_result, delta) = if first["type"] == "move_result" {
            (first, second)
        } else {
            (second, first)
        };
        assert_eq!(move_result["type"], "move_result");
        assert_eq!(move_result["move_result"]["accepted"], true);
        assert_eq!(delta["type"], "delta_update");

        in_tx.send(r#"{"type":"get_state"}"#.to_owned()).unwrap();
        let state: Value = serde_json::from_str(&out_rx.recv().await.unwrap()).unwrap();
        assert_eq!(state["type"], "state");
        assert_eq!(state["cells"].as_array().unwrap().len(), 1);

        drop(in_tx);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn move_before_select_color_is_rejected_without_reaching_the_room() {
        let room = RoomActor::spawn("net-test-2", CancellationToken::new(), Arc::new(NoopPersistence));
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(run_connection(
            ChannelInbound(in_rx),
            ChannelOutbound(out_tx),
            room.clone(),
            cancel,
        ));

        in_tx.send(r#"{"x":0,"y":0,"color":0}"#.to_owned()).unwrap();
        let rejection: Value = serde_json::from_str(&out_rx.recv().await.unwrap()).unwrap();
        assert_eq!(rejection["move_result"]["reason"], "color_not_selected");
        assert_eq!(room.current_seq(), 0);

        drop(in_tx);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn malformed_frame_yields_invalid_payload() {
        let room = RoomActor::spawn("net-test-3", CancellationToken::new(), Arc::new(NoopPersistence));
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(run_connection(ChannelInbound(in_rx), ChannelOutbound(out_tx), room, cancel));

        in_tx.send("not json".to_owned()).unwrap();
        let rejection: Value = serde_json::from_str(&out_rx.recv().await.unwrap()).unwrap();
        assert_eq!(rejection["move_result"]["reason"], "invalid_payload");

        drop(in_tx);
        handle.await.unwrap();
    }
}
