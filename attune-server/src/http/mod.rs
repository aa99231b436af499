//! HTTP server module

mod api;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;

use crate::AppState;

pub use api::{
    CreateSessionRequest, CreateSessionResponse, EventsResponse, HealthResponse,
    LifecycleResponse, SampleRequest, SessionListResponse, SessionSummary, SubmitResponseRequest,
};

/// Create the HTTP router with all routes configured
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(api::health))
        .route(
            "/api/sessions",
            post(api::create_session).get(api::list_sessions),
        )
        .route("/api/sessions/:id", get(api::session_snapshot))
        .route("/api/sessions/:id/start", post(api::start_session))
        .route("/api/sessions/:id/pause", post(api::pause_session))
        .route("/api/sessions/:id/resume", post(api::resume_session))
        .route("/api/sessions/:id/stop", post(api::stop_session))
        .route("/api/sessions/:id/samples", post(api::record_sample))
        .route("/api/sessions/:id/responses", post(api::submit_response))
        .route("/api/sessions/:id/deliver", post(api::manual_override))
        .route("/api/sessions/:id/reconcile", post(api::reconcile))
        .route("/ws", get(crate::ws::ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
