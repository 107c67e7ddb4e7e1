//! JSON error responses

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::Error;

/// API errors
#[derive(Debug)]
pub enum ApiError {
    BadRequest(&'static str),
    Turn(Error),
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self::Turn(e)
    }
}

impl ApiError {
    /// HTTP status and stable machine-readable code
    #[must_use]
    pub const fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::BadRequest(_) | Self::Turn(Error::Audio(_)) => {
                (StatusCode::BAD_REQUEST, "bad_request")
            }
            Self::Turn(Error::EngineUnreachable { .. }) => {
                (StatusCode::SERVICE_UNAVAILABLE, "engine_unreachable")
            }
            Self::Turn(Error::Generation(_)) => (StatusCode::BAD_GATEWAY, "generation_failed"),
            Self::Turn(Error::Synthesis(_)) => (StatusCode::BAD_GATEWAY, "synthesis_failed"),
            Self::Turn(Error::Timeout { .. }) => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            Self::Turn(Error::Cancelled { .. }) => (StatusCode::SERVICE_UNAVAILABLE, "cancelled"),
            Self::Turn(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: ErrorBody,
        }

        #[derive(Serialize)]
        struct ErrorBody {
            code: &'static str,
            message: String,
        }

        let (status, code) = self.status_and_code();
        let message = match self {
            Self::BadRequest(msg) => msg.to_string(),
            Self::Turn(e) => e.to_string(),
        };

        if status.is_server_error() {
            tracing::error!(code, %message, "request failed");
        } else {
            tracing::debug!(code, %message, "request rejected");
        }

        (status, Json(ErrorResponse { error: ErrorBody { code, message } })).into_response()
    }
}
