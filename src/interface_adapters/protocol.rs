// Wire protocol DTOs for the lobby and game sockets.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// Relayed payloads default to an empty object when the field is absent.
fn empty_state() -> Value {
    Value::Object(serde_json::Map::new())
}

/// A player identity as exposed on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerRef {
    pub id: String,
    pub name: String,
}

/// One row of the lobby roster broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LobbyPlayerEntry {
    pub id: String,
    pub name: String,
    #[serde(rename = "isReady")]
    pub is_ready: bool,
    #[serde(rename = "isConnected")]
    pub is_connected: bool,
}

// Messages read from a lobby socket. Unknown types decode to `Unknown`
// and are dropped by the handler; unknown fields are ignored by serde.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LobbyClientMessage {
    Join {
        #[serde(default)]
        name: Option<String>,
        #[serde(default, rename = "playerId")]
        player_id: Option<String>,
    },
    SetReady {
        #[serde(default)]
        ready: bool,
    },
    Leave,
    #[serde(other)]
    Unknown,
}

// Messages written to a lobby socket.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LobbyServerMessage {
    Joined {
        #[serde(rename = "playerId")]
        player_id: String,
        #[serde(rename = "playerName")]
        player_name: String,
        players: Vec<LobbyPlayerEntry>,
    },
    LobbyState {
        players: Vec<LobbyPlayerEntry>,
    },
    MatchFound {
        #[serde(rename = "gameId")]
        game_id: String,
        opponent: PlayerRef,
    },
    Error {
        message: String,
    },
}

// Messages read from a game socket. The `state` payload is opaque to the
// relay and forwarded verbatim.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameClientMessage {
    StateUpdate {
        #[serde(default = "empty_state")]
        state: Value,
    },
    GameOver {
        #[serde(default = "empty_state")]
        state: Value,
    },
    Leave,
    #[serde(other)]
    Unknown,
}

// Messages written to a game socket.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameServerMessage {
    Connected {
        you: PlayerRef,
        opponent: Option<PlayerRef>,
    },
    Start,
    OpponentState {
        #[serde(rename = "playerId")]
        player_id: String,
        state: Value,
    },
    OpponentGameOver {
        #[serde(rename = "playerId")]
        player_id: String,
        state: Value,
    },
    OpponentLeft {
        #[serde(rename = "playerId")]
        player_id: String,
    },
    OpponentReturned {
        #[serde(rename = "playerId")]
        player_id: String,
    },
    ResumeState {
        state: Value,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_lobby_type_decodes_to_unknown() {
        let parsed: LobbyClientMessage =
            serde_json::from_str(r#"{"type":"emote","payload":1}"#).expect("should parse");
        assert!(matches!(parsed, LobbyClientMessage::Unknown));
    }

    #[test]
    fn join_reads_camel_case_player_id() {
        let parsed: LobbyClientMessage =
            serde_json::from_str(r#"{"type":"join","playerId":"p-1"}"#).expect("should parse");
        match parsed {
            LobbyClientMessage::Join { name, player_id } => {
                assert_eq!(name, None);
                assert_eq!(player_id.as_deref(), Some("p-1"));
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn set_ready_defaults_to_false() {
        let parsed: LobbyClientMessage =
            serde_json::from_str(r#"{"type":"set_ready"}"#).expect("should parse");
        assert!(matches!(parsed, LobbyClientMessage::SetReady { ready: false }));
    }

    #[test]
    fn state_update_defaults_to_empty_object() {
        let parsed: GameClientMessage =
            serde_json::from_str(r#"{"type":"state_update"}"#).expect("should parse");
        match parsed {
            GameClientMessage::StateUpdate { state } => assert_eq!(state, json!({})),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn start_serializes_with_bare_type_tag() {
        let text = serde_json::to_string(&GameServerMessage::Start).expect("should serialize");
        assert_eq!(text, r#"{"type":"start"}"#);
    }

    #[test]
    fn lobby_roster_uses_camel_case_flags() {
        let entry = LobbyPlayerEntry {
            id: "p-1".into(),
            name: "Ada".into(),
            is_ready: true,
            is_connected: false,
        };
        let frame = serde_json::to_value(LobbyServerMessage::LobbyState { players: vec![entry] })
            .expect("should serialize");
        assert_eq!(
            frame,
            json!({
                "type": "lobby_state",
                "players": [{"id": "p-1", "name": "Ada", "isReady": true, "isConnected": false}],
            })
        );
    }

    #[test]
    fn connected_frame_allows_missing_opponent() {
        let frame = serde_json::to_value(GameServerMessage::Connected {
            you: PlayerRef { id: "p-1".into(), name: "Ada".into() },
            opponent: None,
        })
        .expect("should serialize");
        assert_eq!(frame["opponent"], Value::Null);
    }
}
