// Session registry: relay state for paired players and cleanup grace timers.

use crate::interface_adapters::net::transport::{SharedSink, safe_send};
use crate::interface_adapters::protocol::{GameServerMessage, PlayerRef};
use crate::use_cases::lobby::MatchSeat;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

/// Shared configuration for session lifecycle handling.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// How long an abandoned session survives before destruction.
    pub cleanup_grace: Duration,
}

// Mutable relay state of one session, behind the session's own lock.
#[derive(Default)]
struct SessionChannels {
    connections: HashMap<String, SharedSink>,
    last_states: HashMap<String, Value>,
    // Set once both members have been simultaneously connected. Lives under
    // the same lock as `connections` so the everyone-is-here check and the
    // flip are one critical section.
    started: bool,
}

/// What a freshly attached connection means for start signalling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachOutcome {
    /// Not every member is connected yet.
    Waiting,
    /// Both members are in for the first time.
    Started,
    /// Both members are in again; the caller is the returning socket.
    Rejoined,
}

/// How a player's game connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Departure {
    /// The client asked to leave.
    Leave,
    /// The socket dropped without a leave.
    Drop,
}

/// A relay between exactly two players, created by the matchmaker.
///
/// Membership is frozen at creation; only the connection table and the
/// per-player last-state memo change over the session's life.
pub struct GameSession {
    pub id: String,
    // Member id to display name.
    members: HashMap<String, String>,
    finished: AtomicBool,
    channels: Mutex<SessionChannels>,
}

impl GameSession {
    fn new(id: String, members: HashMap<String, String>) -> Self {
        Self {
            id,
            members,
            finished: AtomicBool::new(false),
            channels: Mutex::new(SessionChannels::default()),
        }
    }

    pub fn is_member(&self, player_id: &str) -> bool {
        self.members.contains_key(player_id)
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn member_name(&self, player_id: &str) -> Option<&str> {
        self.members.get(player_id).map(String::as_str)
    }

    /// The other member of the pair.
    pub fn opponent_of(&self, player_id: &str) -> Option<PlayerRef> {
        self.members
            .iter()
            .find(|(id, _)| id.as_str() != player_id)
            .map(|(id, name)| PlayerRef { id: id.clone(), name: name.clone() })
    }

    /// Attaches the socket and decides the start signalling inside one
    /// critical section, so two simultaneous connects cannot both observe
    /// the first everyone-is-here moment.
    pub async fn attach_connection(&self, player_id: &str, socket: SharedSink) -> AttachOutcome {
        let mut channels = self.channels.lock().await;
        channels.connections.insert(player_id.to_owned(), socket);
        info!(session_id = %self.id, player_id, "player joined session");
        if channels.connections.len() < self.members.len() {
            AttachOutcome::Waiting
        } else if !channels.started {
            channels.started = true;
            AttachOutcome::Started
        } else {
            AttachOutcome::Rejoined
        }
    }

    pub async fn remove_connection(&self, player_id: &str) {
        let removed = self.channels.lock().await.connections.remove(player_id);
        if removed.is_some() {
            info!(session_id = %self.id, player_id, "player left session");
        }
    }

    pub async fn connected_count(&self) -> usize {
        self.channels.lock().await.connections.len()
    }

    /// Sends to every connection except `exclude`. Targets are snapshotted
    /// first so no send happens under the session lock.
    pub async fn broadcast(&self, message: &GameServerMessage, exclude: Option<&str>) {
        let targets: Vec<SharedSink> = {
            let channels = self.channels.lock().await;
            channels
                .connections
                .iter()
                .filter(|(id, _)| exclude != Some(id.as_str()))
                .map(|(_, sink)| sink.clone())
                .collect()
        };
        for sink in targets {
            safe_send(&sink, message).await;
        }
    }

    pub async fn send_to_opponent(&self, sender_id: &str, message: &GameServerMessage) {
        let Some(opponent) = self.opponent_of(sender_id) else {
            return;
        };
        let socket = self.channels.lock().await.connections.get(&opponent.id).cloned();
        if let Some(socket) = socket {
            safe_send(&socket, message).await;
        }
    }

    pub async fn record_state(&self, player_id: &str, state: Value) {
        self.channels.lock().await.last_states.insert(player_id.to_owned(), state);
    }

    pub async fn state_for(&self, player_id: &str) -> Option<Value> {
        self.channels.lock().await.last_states.get(player_id).cloned()
    }

    pub async fn is_started(&self) -> bool {
        self.channels.lock().await.started
    }

    pub fn mark_finished(&self) {
        self.finished.store(true, Ordering::SeqCst);
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct SessionInner {
    sessions: HashMap<String, Arc<GameSession>>,
    cleanup_timers: HashMap<String, JoinHandle<()>>,
}

/// Registry for every active game session.
pub struct SessionRegistry {
    settings: SessionSettings,
    // One lock guards the session table and the cleanup timer table.
    // When a session's own lock is also needed, this one comes first.
    inner: Mutex<SessionInner>,
}

impl SessionRegistry {
    /// Creates an empty registry with the provided settings.
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            settings,
            inner: Mutex::new(SessionInner::default()),
        }
    }

    /// Allocates a fresh session for a matched pair.
    pub async fn create_session(&self, first: &MatchSeat, second: &MatchSeat) -> Arc<GameSession> {
        let session_id = Uuid::new_v4().to_string();
        let members = HashMap::from([
            (first.id.clone(), first.name.clone()),
            (second.id.clone(), second.name.clone()),
        ]);
        let session = Arc::new(GameSession::new(session_id.clone(), members));
        self.inner.lock().await.sessions.insert(session_id.clone(), session.clone());
        info!(
            session_id = %session_id,
            first = %first.id,
            second = %second.id,
            "session created"
        );
        session
    }

    pub async fn get_session(&self, session_id: &str) -> Option<Arc<GameSession>> {
        self.inner.lock().await.sessions.get(session_id).cloned()
    }

    /// Deletes the session and cancels its cleanup timer, if armed.
    pub async fn remove_session(&self, session_id: &str) {
        let session = {
            let mut inner = self.inner.lock().await;
            if let Some(timer) = inner.cleanup_timers.remove(session_id) {
                timer.abort();
            }
            inner.sessions.remove(session_id)
        };
        if let Some(session) = session {
            let mut channels = session.channels.lock().await;
            channels.connections.clear();
            channels.last_states.clear();
            info!(session_id, "session removed");
        }
    }

    /// Stores the sender's latest state and relays it to the opponent.
    /// Unknown sessions are dropped silently.
    pub async fn forward_state(&self, session_id: &str, sender_id: &str, state: Value) {
        let Some(session) = self.get_session(session_id).await else {
            return;
        };
        session.record_state(sender_id, state.clone()).await;
        session
            .send_to_opponent(
                sender_id,
                &GameServerMessage::OpponentState { player_id: sender_id.to_owned(), state },
            )
            .await;
        debug!(session_id, player_id = sender_id, "state relayed");
    }

    /// Like [`Self::forward_state`], but also marks the session finished.
    pub async fn forward_game_over(&self, session_id: &str, sender_id: &str, state: Value) {
        let Some(session) = self.get_session(session_id).await else {
            return;
        };
        session.record_state(sender_id, state.clone()).await;
        session.mark_finished();
        info!(session_id, player_id = sender_id, "session marked finished");
        session
            .send_to_opponent(
                sender_id,
                &GameServerMessage::OpponentGameOver { player_id: sender_id.to_owned(), state },
            )
            .await;
    }

    /// Drops the player's connection and tells whoever remains. An explicit
    /// leave that empties an already-finished session destroys it on the
    /// spot; any other emptying arms the cleanup grace timer.
    pub async fn handle_disconnect(
        self: Arc<Self>,
        session_id: &str,
        player_id: &str,
        departure: Departure,
    ) {
        let Some(session) = self.get_session(session_id).await else {
            return;
        };
        session.remove_connection(player_id).await;
        session
            .broadcast(
                &GameServerMessage::OpponentLeft { player_id: player_id.to_owned() },
                Some(player_id),
            )
            .await;
        if session.connected_count().await > 0 {
            return;
        }
        if departure == Departure::Leave && session.is_finished() {
            info!(session_id, "finished session emptied by leave; removing now");
            self.remove_session(session_id).await;
        } else {
            self.clone().schedule_cleanup(session_id).await;
            info!(session_id, "session has no active connections; cleanup scheduled");
        }
    }

    /// Arms the cleanup grace timer; a second call while armed is a no-op.
    pub async fn schedule_cleanup(self: Arc<Self>, session_id: &str) {
        let mut inner = self.inner.lock().await;
        if inner.cleanup_timers.contains_key(session_id) {
            return;
        }
        let timer = tokio::spawn(self.clone().delayed_cleanup(session_id.to_owned()));
        inner.cleanup_timers.insert(session_id.to_owned(), timer);
    }

    /// Cancels the cleanup timer if one is armed.
    pub async fn cancel_cleanup(&self, session_id: &str) {
        let timer = self.inner.lock().await.cleanup_timers.remove(session_id);
        if let Some(timer) = timer {
            timer.abort();
            info!(session_id, "session cleanup cancelled");
        }
    }

    // Cleanup expiry: the still-empty-or-finished check and the destruction
    // happen in one critical section over both locks, so a connection racing
    // back in is never stranded in a deleted session.
    async fn delayed_cleanup(self: Arc<Self>, session_id: String) {
        tokio::time::sleep(self.settings.cleanup_grace).await;
        let mut inner = self.inner.lock().await;
        inner.cleanup_timers.remove(&session_id);
        let Some(session) = inner.sessions.get(&session_id).cloned() else {
            return;
        };
        let mut channels = session.channels.lock().await;
        if channels.connections.is_empty() || session.is_finished() {
            channels.connections.clear();
            channels.last_states.clear();
            inner.sessions.remove(&session_id);
            info!(session_id = %session_id, "session cleanup executed");
        } else {
            debug!(session_id = %session_id, "session cleanup skipped; players still connected");
        }
    }
}
