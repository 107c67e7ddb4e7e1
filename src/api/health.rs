//! Health check endpoint

use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use super::ApiState;
use crate::engine::Variant;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub engines: EngineInfo,
    pub stored_messages: usize,
}

/// Configured variant per capability
#[derive(Serialize)]
pub struct EngineInfo {
    pub transcription: &'static str,
    pub generation: &'static str,
    pub synthesis: &'static str,
}

/// Liveness probe with the active engine selection
async fn health(State(state): State<Arc<ApiState>>) -> Json<HealthResponse> {
    let coordinator = &state.coordinator;
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        engines: EngineInfo {
            transcription: coordinator.transcriber().key(),
            generation: coordinator.generator().key(),
            synthesis: coordinator.synthesizer().key(),
        },
        stored_messages: coordinator.session().len(),
    })
}

/// Build health router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}
