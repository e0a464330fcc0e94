// Network adapter modules split by endpoint, plus the shared sink adapter.

pub mod game;
pub mod lobby;
pub mod transport;

pub use game::game_ws_handler;
pub use lobby::lobby_ws_handler;
