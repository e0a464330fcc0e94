// Lobby socket endpoint: join, ready, leave, and disconnect grace handling.

use crate::interface_adapters::net::transport::{SharedSink, WsSink, safe_send};
use crate::interface_adapters::protocol::{LobbyClientMessage, LobbyServerMessage};
use crate::interface_adapters::state::AppState;
use crate::use_cases::try_matchmake;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::StreamExt;
use futures_util::stream::SplitStream;
use std::sync::Arc;
use tracing::{debug, info};

pub async fn lobby_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_lobby_socket(socket, state))
}

async fn handle_lobby_socket(socket: WebSocket, state: Arc<AppState>) {
    let (sink, stream) = socket.split();
    let sink = WsSink::shared(sink);

    let player_id = run_lobby_loop(stream, &sink, &state).await;

    // Any exit without an explicit leave arms the reconnect grace instead
    // of dropping the player outright.
    if let Some(player_id) = player_id {
        state.lobby.clone().schedule_disconnect(&player_id).await;
        state.lobby.broadcast_state().await;
    }
}

// Drives the per-socket state machine. Returns the joined player id when
// the loop ended without an explicit leave.
async fn run_lobby_loop(
    mut stream: SplitStream<WebSocket>,
    sink: &SharedSink,
    state: &Arc<AppState>,
) -> Option<String> {
    let mut player_id: Option<String> = None;
    while let Some(incoming) = stream.next().await {
        let text = match incoming {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(error) => {
                debug!(error = %error, "lobby socket receive error");
                break;
            }
        };
        let message = match serde_json::from_str::<LobbyClientMessage>(&text) {
            Ok(message) => message,
            Err(error) => {
                debug!(error = %error, "ignoring malformed lobby frame");
                continue;
            }
        };
        match message {
            LobbyClientMessage::Join { name, player_id: requested_id } => {
                if player_id.is_some() {
                    // A joined socket keeps its identity; repeat joins are noise.
                    continue;
                }
                let name = name.unwrap_or_default();
                let requested_id = requested_id.filter(|id| !id.trim().is_empty());
                if name.trim().is_empty() && requested_id.is_none() {
                    safe_send(
                        sink,
                        &LobbyServerMessage::Error { message: "Name is required".to_owned() },
                    )
                    .await;
                    continue;
                }
                let profile = state.lobby.register_player(sink.clone(), &name, requested_id).await;
                player_id = Some(profile.id.clone());
                let (players, _) = state.lobby.snapshot().await;
                safe_send(
                    sink,
                    &LobbyServerMessage::Joined {
                        player_id: profile.id,
                        player_name: profile.name,
                        players,
                    },
                )
                .await;
                state.lobby.broadcast_state().await;
            }
            LobbyClientMessage::SetReady { ready } => {
                let Some(id) = player_id.as_deref() else {
                    continue;
                };
                state.lobby.set_ready(id, ready).await;
                state.lobby.broadcast_state().await;
                try_matchmake(&state.lobby, &state.sessions).await;
            }
            LobbyClientMessage::Leave => {
                let Some(id) = player_id.take() else {
                    continue;
                };
                info!(player_id = %id, "player left lobby");
                state.lobby.remove_player(&id).await;
                state.lobby.broadcast_state().await;
                break;
            }
            LobbyClientMessage::Unknown => {}
        }
    }
    player_id
}
