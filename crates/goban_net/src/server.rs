//! HTTP surface: a WebSocket upgrade endpoint that attaches a connection to
//! a room, and a read-only lobby endpoint listing known rooms.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use goban_room::RoomRegistry;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::connection::run_connection;
use crate::transport::{InboundHalf, OutboundHalf};

#[derive(Clone)]
struct AppState {
    registry: Arc<RoomRegistry>,
    cancel: CancellationToken,
}

/// Builds the server's HTTP router: `/ws` for gameplay connections, `/lobby`
/// for read-only room enumeration.
#[must_use]
pub fn router(registry: Arc<RoomRegistry>, cancel: CancellationToken) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/lobby", get(lobby_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { registry, cancel })
}

#[derive(Debug, Deserialize)]
struct ConnectQuery {
    #[serde(default)]
    room: String,
}

async fn ws_handler(ws: WebSocketUpgrade, Query(query): Query<ConnectQuery>, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        let room = state.registry.attach(&query.room);
        let (sink, stream) = socket.split();
        run_connection(WebSocketInbound(stream), WebSocketOutbound(sink), room, state.cancel.child_token()).await;
    })
}

#[derive(Debug, Serialize)]
struct LobbyRoom {
    id: String,
    player_count: usize,
}

async fn lobby_handler(State(state): State<AppState>) -> Json<Vec<LobbyRoom>> {
    let rooms = state
        .registry
        .list()
        .into_iter()
        .map(|(id, player_count)| LobbyRoom { id, player_count })
        .collect();
    Json(rooms)
}

struct WebSocketInbound(SplitStream<WebSocket>);

#[async_trait]
impl InboundHalf for WebSocketInbound {
    async fn recv(&mut self) -> std::io::Result<Option<String>> {
        loop {
            match self.0.next().await {
                None => return Ok(None),
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Close(_))) => return Ok(None),
                Some(Ok(_)) => continue,
                Some(Err(error)) => return Err(std::io::Error::new(std::io::ErrorKind::Other, error)),
            }
        }
    }
}

struct WebSocketOutbound(SplitSink<WebSocket, Message>);

#[async_trait]
impl OutboundHalf for WebSocketOutbound {
    async fn send(&mut self, frame: String) -> std::io::Result<()> {
        self.0
            .send(Message::Text(frame))
            .await
            .map_err(|error| std::io::Error::new(std::io::ErrorKind::Other, error))
    }
}
