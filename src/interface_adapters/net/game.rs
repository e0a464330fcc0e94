// Game socket endpoint: membership policy, start/resume signalling, and the
// opaque state relay loop.

use crate::interface_adapters::net::transport::{SharedSink, WsSink, safe_send};
use crate::interface_adapters::protocol::{GameClientMessage, GameServerMessage, PlayerRef};
use crate::interface_adapters::state::AppState;
use crate::use_cases::{AttachOutcome, Departure, GameSession};
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code};
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use futures_util::StreamExt;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
pub struct GameQuery {
    // Identity of the connecting member; the session rejects strangers.
    #[serde(default, rename = "playerId")]
    player_id: Option<String>,
}

pub async fn game_ws_handler(
    ws: WebSocketUpgrade,
    Path(game_id): Path<String>,
    Query(query): Query<GameQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_game_socket(socket, state, game_id, query.player_id))
}

async fn handle_game_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    game_id: String,
    player_id: Option<String>,
) {
    let Some(player_id) = player_id.filter(|id| !id.is_empty()) else {
        close_policy(socket, "playerId required").await;
        return;
    };
    let Some(session) = state.sessions.get_session(&game_id).await else {
        close_policy(socket, "unknown session").await;
        return;
    };
    if !session.is_member(&player_id) {
        close_policy(socket, "not a session member").await;
        return;
    }

    let (sink, mut stream) = socket.split();
    let sink = WsSink::shared(sink);

    let outcome = session.attach_connection(&player_id, sink.clone()).await;
    state.sessions.cancel_cleanup(&game_id).await;

    announce_connection(&session, &player_id, &sink, outcome).await;

    let mut departure = Departure::Drop;
    while let Some(incoming) = stream.next().await {
        let text = match incoming {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(error) => {
                debug!(error = %error, "game socket receive error");
                break;
            }
        };
        let message = match serde_json::from_str::<GameClientMessage>(&text) {
            Ok(message) => message,
            Err(error) => {
                debug!(error = %error, "ignoring malformed game frame");
                continue;
            }
        };
        match message {
            GameClientMessage::StateUpdate { state: payload } => {
                state.sessions.forward_state(&game_id, &player_id, payload).await;
            }
            GameClientMessage::GameOver { state: payload } => {
                state.sessions.forward_game_over(&game_id, &player_id, payload).await;
            }
            GameClientMessage::Leave => {
                info!(session_id = %game_id, player_id = %player_id, "player left game");
                departure = Departure::Leave;
                break;
            }
            GameClientMessage::Unknown => {}
        }
    }

    state.sessions.clone().handle_disconnect(&game_id, &player_id, departure).await;
}

// Greets the new connection and emits the start/resume signalling the
// attach decision calls for.
async fn announce_connection(
    session: &Arc<GameSession>,
    player_id: &str,
    sink: &SharedSink,
    outcome: AttachOutcome,
) {
    let opponent = session.opponent_of(player_id);
    let you = PlayerRef {
        id: player_id.to_owned(),
        name: session.member_name(player_id).unwrap_or(player_id).to_owned(),
    };
    safe_send(sink, &GameServerMessage::Connected { you, opponent: opponent.clone() }).await;

    match outcome {
        AttachOutcome::Waiting => {}
        AttachOutcome::Started => {
            // Both members are in for the first time: the game begins.
            session.broadcast(&GameServerMessage::Start, None).await;
        }
        AttachOutcome::Rejoined => {
            session
                .broadcast(
                    &GameServerMessage::OpponentReturned { player_id: player_id.to_owned() },
                    Some(player_id),
                )
                .await;
            safe_send(sink, &GameServerMessage::Start).await;
        }
    }

    if let Some(own_state) = session.state_for(player_id).await {
        safe_send(sink, &GameServerMessage::ResumeState { state: own_state }).await;
    }
    if let Some(opponent) = opponent {
        if let Some(opponent_state) = session.state_for(&opponent.id).await {
            safe_send(
                sink,
                &GameServerMessage::OpponentState { player_id: opponent.id, state: opponent_state },
            )
            .await;
        }
    }
}

// Pre-relay policy rejection; the handshake is already done, so the refusal
// is a close frame rather than an HTTP status.
async fn close_policy(mut socket: WebSocket, reason: &'static str) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame { code: close_code::POLICY, reason: reason.into() })))
        .await;
}
