// Use cases layer: lobby, matchmaking, and session workflows.

pub mod lobby;
pub mod matchmaker;
pub mod session;

pub use lobby::{LobbyRegistry, LobbySettings};
pub use matchmaker::try_matchmake;
pub use session::{AttachOutcome, Departure, GameSession, SessionRegistry, SessionSettings};
