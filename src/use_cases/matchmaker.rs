// FIFO matchmaking over the lobby ready queue.

use crate::interface_adapters::net::transport::safe_send;
use crate::interface_adapters::protocol::{LobbyServerMessage, PlayerRef};
use crate::use_cases::lobby::{LobbyRegistry, MatchSeat};
use crate::use_cases::session::SessionRegistry;
use std::sync::Arc;
use tracing::info;

/// Pairs consecutive ready, connected players until fewer than two remain.
/// Formed pairs get a session each; afterwards the lobby roster is
/// broadcast once and every pair is told where to meet.
///
/// Safe to invoke spuriously: with nothing to pair it does nothing.
pub async fn try_matchmake(lobby: &Arc<LobbyRegistry>, sessions: &Arc<SessionRegistry>) {
    let mut matches = Vec::new();
    while let Some((first, second)) = lobby.take_ready_pair().await {
        info!(first = %first.id, second = %second.id, "matched players");
        let session = sessions.create_session(&first, &second).await;
        matches.push((first, second, session));
    }
    if matches.is_empty() {
        return;
    }
    // One roster broadcast per invocation, no matter how many pairs formed.
    lobby.broadcast_state().await;
    for (first, second, session) in &matches {
        notify_match_found(&session.id, first, second).await;
    }
}

// Tells both members over their lobby sockets, each seeing the other as
// the opponent.
async fn notify_match_found(session_id: &str, first: &MatchSeat, second: &MatchSeat) {
    if let Some(socket) = &first.socket {
        safe_send(
            socket,
            &LobbyServerMessage::MatchFound {
                game_id: session_id.to_owned(),
                opponent: PlayerRef { id: second.id.clone(), name: second.name.clone() },
            },
        )
        .await;
    }
    if let Some(socket) = &second.socket {
        safe_send(
            socket,
            &LobbyServerMessage::MatchFound {
                game_id: session_id.to_owned(),
                opponent: PlayerRef { id: first.id.clone(), name: first.name.clone() },
            },
        )
        .await;
    }
    info!(session_id, first = %first.id, second = %second.id, "match notification sent");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface_adapters::net::transport::test_support::RecordingSink;
    use crate::use_cases::lobby::LobbySettings;
    use crate::use_cases::session::SessionSettings;
    use std::sync::Arc;
    use std::time::Duration;

    fn registries() -> (Arc<LobbyRegistry>, Arc<SessionRegistry>) {
        let lobby = Arc::new(LobbyRegistry::new(LobbySettings {
            reconnect_grace: Duration::from_secs(3600),
        }));
        let sessions = Arc::new(SessionRegistry::new(SessionSettings {
            cleanup_grace: Duration::from_secs(3600),
        }));
        (lobby, sessions)
    }

    #[tokio::test]
    async fn pairs_ready_players_in_queue_order() {
        let (lobby, sessions) = registries();
        let sink_a = RecordingSink::shared();
        let sink_b = RecordingSink::shared();
        let a = lobby.register_player(sink_a.clone(), "Ada", None).await;
        let b = lobby.register_player(sink_b.clone(), "Bob", None).await;
        lobby.set_ready(&a.id, true).await;
        lobby.set_ready(&b.id, true).await;

        try_matchmake(&lobby, &sessions).await;

        let found_a = sink_a.frames_of_type("match_found");
        let found_b = sink_b.frames_of_type("match_found");
        assert_eq!(found_a.len(), 1);
        assert_eq!(found_b.len(), 1);
        assert_eq!(found_a[0]["opponent"]["id"], b.id.as_str());
        assert_eq!(found_a[0]["opponent"]["name"], "Bob");
        assert_eq!(found_b[0]["opponent"]["id"], a.id.as_str());
        assert_eq!(found_a[0]["gameId"], found_b[0]["gameId"]);

        let game_id = found_a[0]["gameId"].as_str().expect("gameId should be a string");
        let session = sessions.get_session(game_id).await.expect("session should exist");
        assert!(session.is_member(&a.id));
        assert!(session.is_member(&b.id));

        // Both matched players have left the ready queue.
        let (players, _) = lobby.snapshot().await;
        assert!(players.iter().all(|entry| !entry.is_ready));
    }

    #[tokio::test]
    async fn broadcasts_roster_exactly_once_per_invocation() {
        let (lobby, sessions) = registries();
        let observer = RecordingSink::shared();
        lobby.register_player(observer.clone(), "Watcher", None).await;
        let mut ids = Vec::new();
        for name in ["P1", "P2", "P3", "P4"] {
            let profile = lobby.register_player(RecordingSink::shared(), name, None).await;
            ids.push(profile.id);
        }
        for id in &ids {
            lobby.set_ready(id, true).await;
        }
        let before = observer.frames_of_type("lobby_state").len();

        try_matchmake(&lobby, &sessions).await;

        // Two pairs formed, one broadcast.
        let after = observer.frames_of_type("lobby_state").len();
        assert_eq!(after, before + 1);
    }

    #[tokio::test]
    async fn single_ready_player_stays_queued() {
        let (lobby, sessions) = registries();
        let sink = RecordingSink::shared();
        let a = lobby.register_player(sink.clone(), "Ada", None).await;
        lobby.set_ready(&a.id, true).await;
        let before = sink.frames_of_type("lobby_state").len();

        try_matchmake(&lobby, &sessions).await;

        assert!(sink.frames_of_type("match_found").is_empty());
        assert_eq!(sink.frames_of_type("lobby_state").len(), before);
        let (players, _) = lobby.snapshot().await;
        assert!(players[0].is_ready, "lone player should remain queued");
    }

    #[tokio::test]
    async fn disconnected_queue_entries_are_not_matched() {
        let (lobby, sessions) = registries();
        let sink_a = RecordingSink::shared();
        let a = lobby.register_player(sink_a.clone(), "Ada", None).await;
        let b = lobby.register_player(RecordingSink::shared(), "Bob", None).await;
        lobby.set_ready(&a.id, true).await;
        lobby.set_ready(&b.id, true).await;
        lobby.clone().schedule_disconnect(&b.id).await;

        try_matchmake(&lobby, &sessions).await;

        assert!(sink_a.frames_of_type("match_found").is_empty());
    }
}
