// Shared helpers for booting an isolated relay server and speaking its wire
// protocol from a real WebSocket client.
#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

// Each test gets its own server on an ephemeral port so matchmaking in one
// test can never pair players from another.
pub async fn spawn_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral test port");
    let addr = listener.local_addr().expect("get local addr");
    tokio::spawn(async move {
        relay_server::run(listener).await.expect("server failed");
    });
    format!("127.0.0.1:{}", addr.port())
}

pub async fn connect_ws(url: &str) -> WsClient {
    let (ws, _) = tokio_tungstenite::connect_async(url)
        .await
        .expect("client should connect");
    ws
}

pub async fn connect_lobby(addr: &str) -> WsClient {
    connect_ws(&format!("ws://{addr}/ws/lobby")).await
}

pub async fn connect_game(addr: &str, game_id: &str, player_id: &str) -> WsClient {
    connect_ws(&format!("ws://{addr}/ws/game/{game_id}?playerId={player_id}")).await
}

pub async fn send_json(ws: &mut WsClient, payload: Value) {
    ws.send(Message::text(payload.to_string()))
        .await
        .expect("send should succeed");
}

/// Reads frames until one has the wanted `type`, skipping unrelated
/// broadcasts along the way.
pub async fn recv_until(ws: &mut WsClient, wanted: &str) -> Value {
    recv_until_with(ws, wanted, |_| true).await
}

/// Like [`recv_until`], but also requires the frame to satisfy a predicate.
pub async fn recv_until_with(
    ws: &mut WsClient,
    wanted: &str,
    accept: impl Fn(&Value) -> bool,
) -> Value {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let msg = ws
                .next()
                .await
                .unwrap_or_else(|| panic!("socket closed while waiting for {wanted}"))
                .expect("receive should succeed");
            if let Message::Text(text) = msg {
                let frame: Value = serde_json::from_str(&text).expect("frame should be JSON");
                if frame["type"] == wanted && accept(&frame) {
                    return frame;
                }
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {wanted}"))
}

/// Asserts that no text frame arrives on the socket within the window.
pub async fn assert_silent(ws: &mut WsClient, window: Duration) {
    let outcome = tokio::time::timeout(window, ws.next()).await;
    assert!(outcome.is_err(), "expected no frame, got {outcome:?}");
}

/// Joins the lobby under the given name and returns the assigned player id.
pub async fn join_lobby(ws: &mut WsClient, name: &str) -> String {
    send_json(ws, json!({"type": "join", "name": name})).await;
    let joined = recv_until(ws, "joined").await;
    joined["playerId"]
        .as_str()
        .expect("joined frame should carry playerId")
        .to_owned()
}

/// A matched pair of lobby clients, ready to open their game sockets.
pub struct MatchedPair {
    pub lobby_a: WsClient,
    pub lobby_b: WsClient,
    pub id_a: String,
    pub id_b: String,
    pub game_id: String,
}

/// Drives two players through join and ready-up until a match forms.
pub async fn matched_pair(addr: &str, name_a: &str, name_b: &str) -> MatchedPair {
    let mut lobby_a = connect_lobby(addr).await;
    let mut lobby_b = connect_lobby(addr).await;
    let id_a = join_lobby(&mut lobby_a, name_a).await;
    let id_b = join_lobby(&mut lobby_b, name_b).await;

    send_json(&mut lobby_a, json!({"type": "set_ready", "ready": true})).await;
    send_json(&mut lobby_b, json!({"type": "set_ready", "ready": true})).await;

    let found_a = recv_until(&mut lobby_a, "match_found").await;
    let found_b = recv_until(&mut lobby_b, "match_found").await;
    let game_id = found_a["gameId"].as_str().expect("gameId should be a string").to_owned();
    assert_eq!(found_b["gameId"], game_id.as_str());

    MatchedPair { lobby_a, lobby_b, id_a, id_b, game_id }
}
