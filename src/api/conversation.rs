//! Text conversation endpoints

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use super::{ApiError, ApiState};
use crate::session::Message;
use crate::turn::InvokeOptions;

/// Build conversation router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/reply", post(reply))
        .route("/reset", post(reset))
        .route("/history", get(history))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct ReplyRequest {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ReplyResponse {
    pub reply: String,
}

/// Record a user turn and answer it; blank text yields an empty reply
async fn reply(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<ReplyRequest>,
) -> Result<Json<ReplyResponse>, ApiError> {
    let reply = state
        .coordinator
        .reply(&request.text, &InvokeOptions::default())
        .await?
        .unwrap_or_default();

    Ok(Json(ReplyResponse { reply }))
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub ok: bool,
}

async fn reset(State(state): State<Arc<ApiState>>) -> Json<ResetResponse> {
    state.coordinator.reset();
    Json(ResetResponse { ok: true })
}

/// Conversation snapshot, directive first
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub max_turns: usize,
    pub messages: Vec<Message>,
}

async fn history(State(state): State<Arc<ApiState>>) -> Json<HistoryResponse> {
    let session = state.coordinator.session();
    Json(HistoryResponse {
        max_turns: session.max_turns(),
        messages: session.snapshot(),
    })
}
