// Domain layer: identity types and naming policy.

pub mod player;

pub use player::{MAX_NAME_LENGTH, PlayerProfile, fallback_name, sanitize_name};
