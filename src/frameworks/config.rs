use std::{env, time::Duration};

// Runtime/server constants (not relay policy).

pub fn http_port() -> u16 {
    env::var("RELAY_SERVER_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8000)
}

/// Window in which a dropped lobby player may reconnect before removal.
pub fn reconnect_grace() -> Duration {
    let secs = env::var("RECONNECT_GRACE_SECONDS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(10);
    Duration::from_secs(secs)
}

/// Window in which an abandoned session may be rescued before destruction.
pub fn session_cleanup_grace() -> Duration {
    let secs = env::var("SESSION_CLEANUP_GRACE_SECONDS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(20);
    Duration::from_secs(secs)
}

// Browser origins allowed to reach the API.
pub fn cors_origins() -> Vec<String> {
    match env::var("CORS_ALLOWED_ORIGINS") {
        Ok(value) => value
            .split(',')
            .map(|origin| origin.trim().to_owned())
            .filter(|origin| !origin.is_empty())
            .collect(),
        Err(_) => vec![
            "http://localhost:3000".to_owned(),
            "http://frontend:3000".to_owned(),
        ],
    }
}
