// Framework bootstrap for the relay server runtime.

use crate::frameworks::config;
use crate::interface_adapters::http::{health_check, root};
use crate::interface_adapters::net::{game_ws_handler, lobby_ws_handler};
use crate::interface_adapters::state::AppState;
use crate::use_cases::{LobbyRegistry, LobbySettings, SessionRegistry, SessionSettings};

use axum::http::HeaderValue;
use axum::{Router, routing::get};
use std::net::SocketAddr;
use std::{io::Result, sync::Arc};
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};

fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

pub async fn run(listener: tokio::net::TcpListener) -> Result<()> {
    let address = listener.local_addr()?;
    let state = build_state();
    let app = router(state);

    tracing::info!(%address, "listening");

    // Serve app and report errors rather than panicking
    axum::serve(listener, app).await.inspect_err(|e| {
        tracing::error!(error = %e, "server error");
    })
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let address = SocketAddr::from(([0, 0, 0, 0], config::http_port()));

    // Bind TCP listener with error handling
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .inspect_err(|e| {
            tracing::error!(%address, error = %e, "failed to bind");
        })?;

    run(listener).await
}

fn build_state() -> Arc<AppState> {
    // The two registries are process-scoped; handlers receive them through
    // the router state rather than any ambient global.
    let lobby = Arc::new(LobbyRegistry::new(LobbySettings {
        reconnect_grace: config::reconnect_grace(),
    }));
    let sessions = Arc::new(SessionRegistry::new(SessionSettings {
        cleanup_grace: config::session_cleanup_grace(),
    }));
    Arc::new(AppState { lobby, sessions })
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/ws/lobby", get(lobby_ws_handler))
        .route("/ws/game/{game_id}", get(game_ws_handler))
        .layer(cors_layer())
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    let origins: Vec<HeaderValue> = config::cors_origins()
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    // Mirrored methods/headers keep credentialed requests valid.
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}
