// Player identity and display-name policy.

/// Longest display name the lobby will store, in characters.
pub const MAX_NAME_LENGTH: usize = 24;

// Length of the id prefix used when no usable name was supplied.
const ID_FALLBACK_LENGTH: usize = 6;

/// Identity snapshot handed back to callers after registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerProfile {
    pub id: String,
    pub name: String,
}

/// Trims surrounding whitespace and keeps at most [`MAX_NAME_LENGTH`] characters.
pub fn sanitize_name(raw: &str) -> String {
    raw.trim().chars().take(MAX_NAME_LENGTH).collect()
}

/// Display name used when sanitization leaves nothing.
pub fn fallback_name(player_id: &str) -> String {
    player_id.chars().take(ID_FALLBACK_LENGTH).collect()
}
