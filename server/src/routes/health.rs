//! Liveness endpoints

use axum::{extract::State, Json};
use serde::Serialize;

use crate::state::SharedState;

/// GET /ping - Liveness probe
pub async fn ping() -> Json<&'static str> {
    Json("Hello, I am alive")
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_seconds: u64,
    pub version: String,
    pub target_layer: String,
}

/// GET /health - Status with the Grad-CAM layer in use
pub async fn health_check(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        target_layer: state.pipeline.target_layer().name.clone(),
    })
}
