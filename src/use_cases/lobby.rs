// Lobby registry: player presence, the ready queue, and reconnect grace timers.

use crate::domain::player::{PlayerProfile, fallback_name, sanitize_name};
use crate::interface_adapters::net::transport::{SharedSink, send_json};
use crate::interface_adapters::protocol::{LobbyPlayerEntry, LobbyServerMessage};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Shared configuration for lobby lifecycle handling.
#[derive(Debug, Clone)]
pub struct LobbySettings {
    /// How long a dropped player may reconnect before removal.
    pub reconnect_grace: Duration,
}

/// A player known to the lobby, possibly mid-reconnect.
pub struct LobbyPlayer {
    pub id: String,
    pub name: String,
    /// Write half of the current lobby socket; `None` while disconnected.
    pub socket: Option<SharedSink>,
    pub connected: bool,
}

/// One seat of a formed match, captured while the lobby lock was held.
pub struct MatchSeat {
    pub id: String,
    pub name: String,
    pub socket: Option<SharedSink>,
}

impl MatchSeat {
    fn of(player: &LobbyPlayer) -> Self {
        Self {
            id: player.id.clone(),
            name: player.name.clone(),
            socket: player.socket.clone(),
        }
    }
}

#[derive(Default)]
struct LobbyInner {
    players: HashMap<String, LobbyPlayer>,
    // Insertion order doubles as matchmaking FIFO order.
    ready_queue: Vec<String>,
    reconnect_timers: HashMap<String, JoinHandle<()>>,
}

/// Registry for every player currently known to the lobby.
pub struct LobbyRegistry {
    settings: LobbySettings,
    // One lock guards the players, the ready queue and the timer table;
    // matchmaking fairness depends on their joint consistency.
    inner: Mutex<LobbyInner>,
}

impl LobbyRegistry {
    /// Creates an empty registry with the provided settings.
    pub fn new(settings: LobbySettings) -> Self {
        Self {
            settings,
            inner: Mutex::new(LobbyInner::default()),
        }
    }

    /// Creates a player, or re-adopts an existing one when the requested id
    /// is already known. Re-adoption rebinds the socket, keeps the stored
    /// name unless the new one sanitizes to something, and cancels any
    /// pending reconnect timer inside the same critical section.
    pub async fn register_player(
        &self,
        socket: SharedSink,
        name: &str,
        requested_id: Option<String>,
    ) -> PlayerProfile {
        let sanitized = sanitize_name(name);
        let mut inner = self.inner.lock().await;
        let player_id = requested_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let profile = match inner.players.entry(player_id) {
            Entry::Occupied(mut entry) => {
                let player = entry.get_mut();
                if !sanitized.is_empty() {
                    player.name = sanitized;
                }
                player.socket = Some(socket);
                player.connected = true;
                info!(player_id = %player.id, name = %player.name, "player reconnected");
                PlayerProfile { id: player.id.clone(), name: player.name.clone() }
            }
            Entry::Vacant(entry) => {
                let id = entry.key().clone();
                let name = if sanitized.is_empty() { fallback_name(&id) } else { sanitized };
                let player = entry.insert(LobbyPlayer {
                    id: id.clone(),
                    name,
                    socket: Some(socket),
                    connected: true,
                });
                info!(player_id = %player.id, name = %player.name, "player joined lobby");
                PlayerProfile { id: player.id.clone(), name: player.name.clone() }
            }
        };
        // Cancelling under the lock that rebound the socket means a pending
        // grace timer can never remove a player who just came back.
        if let Some(timer) = inner.reconnect_timers.remove(&profile.id) {
            timer.abort();
            info!(player_id = %profile.id, "cancelled reconnect timer");
        }
        profile
    }

    /// Forgets a player entirely: roster, ready queue and pending timer.
    pub async fn remove_player(&self, player_id: &str) {
        let removed = {
            let mut inner = self.inner.lock().await;
            if inner.ready_queue.iter().any(|id| id == player_id) {
                inner.ready_queue.retain(|id| id != player_id);
                info!(player_id, "player removed from ready queue");
            }
            if let Some(timer) = inner.reconnect_timers.remove(player_id) {
                timer.abort();
            }
            inner.players.remove(player_id)
        };
        if let Some(player) = removed {
            info!(player_id, name = %player.name, "player removed from lobby");
        }
    }

    /// Idempotent ready toggle; repeat calls keep the queue position.
    pub async fn set_ready(&self, player_id: &str, ready: bool) {
        let mut inner = self.inner.lock().await;
        if !inner.players.contains_key(player_id) {
            return;
        }
        let queued = inner.ready_queue.iter().any(|id| id == player_id);
        if ready && !queued {
            inner.ready_queue.push(player_id.to_owned());
            info!(player_id, "player marked ready");
        } else if !ready && queued {
            inner.ready_queue.retain(|id| id != player_id);
            info!(player_id, "player unmarked as ready");
        }
    }

    /// Atomic view of the roster plus the sinks of currently live sockets.
    pub async fn snapshot(&self) -> (Vec<LobbyPlayerEntry>, Vec<(String, SharedSink)>) {
        let inner = self.inner.lock().await;
        let players = inner
            .players
            .values()
            .map(|player| LobbyPlayerEntry {
                id: player.id.clone(),
                name: player.name.clone(),
                is_ready: inner.ready_queue.iter().any(|id| *id == player.id),
                is_connected: player.connected,
            })
            .collect();
        let sockets = inner
            .players
            .values()
            .filter_map(|player| player.socket.clone().map(|sink| (player.id.clone(), sink)))
            .collect();
        (players, sockets)
    }

    /// Pushes the current roster to every live socket. Sockets whose send
    /// fails outright are treated as stale and their players evicted.
    pub async fn broadcast_state(&self) {
        let (players, sockets) = self.snapshot().await;
        let message = LobbyServerMessage::LobbyState { players };
        let mut stale = Vec::new();
        for (player_id, sink) in sockets {
            if send_json(&sink, &message).await.is_err() {
                stale.push(player_id);
            }
        }
        for player_id in stale {
            warn!(player_id = %player_id, "dropping stale lobby socket");
            self.remove_player(&player_id).await;
        }
    }

    /// Marks the player disconnected, pulls them out of the ready queue and
    /// arms the reconnect grace timer. A second call while a timer is
    /// pending changes nothing.
    pub async fn schedule_disconnect(self: Arc<Self>, player_id: &str) {
        let mut inner = self.inner.lock().await;
        let Some(player) = inner.players.get_mut(player_id) else {
            return;
        };
        player.connected = false;
        player.socket = None;
        if inner.ready_queue.iter().any(|id| id == player_id) {
            inner.ready_queue.retain(|id| id != player_id);
            info!(player_id, "player removed from ready queue on disconnect");
        }
        if inner.reconnect_timers.contains_key(player_id) {
            debug!(player_id, "reconnect timer already armed");
            return;
        }
        info!(
            player_id,
            grace_secs = self.settings.reconnect_grace.as_secs(),
            "player disconnected; waiting for reconnect"
        );
        let timer = tokio::spawn(self.clone().delayed_remove(player_id.to_owned()));
        inner.reconnect_timers.insert(player_id.to_owned(), timer);
    }

    // Grace expiry: re-checks under the lock that the player is still gone
    // before removing, so a cancelled or late timer has no effect.
    async fn delayed_remove(self: Arc<Self>, player_id: String) {
        tokio::time::sleep(self.settings.reconnect_grace).await;
        let expired = {
            let mut inner = self.inner.lock().await;
            inner.reconnect_timers.remove(&player_id);
            let still_gone = inner
                .players
                .get(&player_id)
                .is_some_and(|player| !player.connected);
            if still_gone {
                inner.players.remove(&player_id);
                inner.ready_queue.retain(|id| *id != player_id);
            }
            still_gone
        };
        if expired {
            info!(player_id = %player_id, "player removed after grace period");
            self.broadcast_state().await;
        } else {
            debug!(player_id = %player_id, "reconnect grace expiry had nothing to do");
        }
    }

    /// Pops the first two ready, connected players in queue order. The pop
    /// happens entirely under the lobby lock, so an id can never be matched
    /// into two sessions.
    pub async fn take_ready_pair(&self) -> Option<(MatchSeat, MatchSeat)> {
        let mut inner = self.inner.lock().await;
        let eligible: Vec<String> = inner
            .ready_queue
            .iter()
            .filter(|id| inner.players.get(id.as_str()).is_some_and(|p| p.connected))
            .cloned()
            .collect();
        if eligible.len() < 2 {
            return None;
        }
        let first_id = eligible[0].clone();
        let second_id = eligible[1].clone();
        inner.ready_queue.retain(|id| *id != first_id && *id != second_id);
        let first = MatchSeat::of(inner.players.get(&first_id)?);
        let second = MatchSeat::of(inner.players.get(&second_id)?);
        Some((first, second))
    }
}
