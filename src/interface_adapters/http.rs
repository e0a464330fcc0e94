// Liveness routes; they carry no relay state.

use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct WelcomeResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub async fn root() -> Json<WelcomeResponse> {
    Json(WelcomeResponse { message: "Welcome to the game relay API" })
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}
