//! Server error types

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use attune_core::SessionError;

/// Errors that can occur in the attune server
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to the specified address
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Error from the session orchestrator
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Internal server error
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error body sent to clients
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
}

impl ServerError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ServerError::Session(SessionError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "not_found")
            }
            ServerError::Session(SessionError::InvalidTransition { .. }) => {
                (StatusCode::CONFLICT, "invalid_transition")
            }
            ServerError::Session(SessionError::Classify(_)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "invalid_sample")
            }
            ServerError::Session(SessionError::Collaborator(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "collaborator_unavailable")
            }
            ServerError::Session(SessionError::Config(_)) => {
                (StatusCode::BAD_REQUEST, "invalid_config")
            }
            ServerError::Bind { .. } | ServerError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let body = ErrorBody {
            error: self.to_string(),
            code,
        };
        (status, Json(body)).into_response()
    }
}
