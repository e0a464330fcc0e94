use crate::use_cases::{LobbyRegistry, SessionRegistry};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    // Shared registry of lobby players and the ready queue.
    pub lobby: Arc<LobbyRegistry>,
    // Shared registry of active game sessions.
    pub sessions: Arc<SessionRegistry>,
}
