//! Audio endpoints: transcription, synthesis, and full turns

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use super::{ApiError, ApiState};
use crate::turn::InvokeOptions;

/// Build voice router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/transcribe", post(transcribe))
        .route("/speak", post(speak))
        .route("/turn", post(turn))
        .with_state(state)
}

/// Optional per-request recognizer selection
#[derive(Debug, Default, Deserialize)]
pub struct EngineQuery {
    pub engine: Option<String>,
}

/// Transcription response
#[derive(Debug, Serialize)]
pub struct TranscribeResponse {
    pub text: String,
    pub confidence: f32,
}

/// Transcribe a WAV body; memory is not touched
async fn transcribe(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<EngineQuery>,
    body: Bytes,
) -> Result<Json<TranscribeResponse>, ApiError> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("empty audio data"));
    }

    let transcription = state
        .coordinator
        .transcribe(body.to_vec(), query.engine.as_deref(), &InvokeOptions::default())
        .await?;

    Ok(Json(TranscribeResponse {
        text: transcription.text,
        confidence: transcription.confidence,
    }))
}

/// Synthesis request
#[derive(Debug, Deserialize)]
pub struct SpeakRequest {
    #[serde(default)]
    pub text: String,
}

/// Synthesize text to a downloadable WAV
async fn speak(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<SpeakRequest>,
) -> Result<Response, ApiError> {
    let audio = state
        .coordinator
        .speak(&request.text, &InvokeOptions::default())
        .await?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "audio/wav"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"reply.wav\""),
        ],
        audio.wav,
    )
        .into_response())
}

/// Full turn response; `audio` is base64 WAV, empty when nothing was heard
#[derive(Debug, Serialize)]
pub struct TurnResponse {
    pub transcript: String,
    pub confidence: f32,
    pub reply: String,
    pub audio: String,
}

async fn turn(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<EngineQuery>,
    body: Bytes,
) -> Result<Json<TurnResponse>, ApiError> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("empty audio data"));
    }

    let result = state
        .coordinator
        .run_turn(body.to_vec(), query.engine.as_deref(), &InvokeOptions::default())
        .await?;

    Ok(Json(TurnResponse {
        audio: base64::engine::general_purpose::STANDARD.encode(&result.audio),
        transcript: result.transcript,
        confidence: result.confidence,
        reply: result.reply,
    }))
}
