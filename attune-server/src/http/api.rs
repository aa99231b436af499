//! REST API handlers
//!
//! The thin command surface: session lifecycle, sample and response
//! ingestion, manual delivery override, and roster reconciliation. Every
//! mutation goes through the orchestrator; handlers only translate between
//! JSON and core types and keep the tick tasks in step with the lifecycle.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use attune_core::{
    EngagementSample, OrderedEvent, ResponseSubmission, SessionConfig, SessionSnapshot,
    SessionState,
};

use crate::error::ServerError;
use crate::AppState;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: i64,
    pub active_sessions: usize,
}

/// Health check endpoint
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let active_sessions = state.orchestrator.active_sessions().await.len();
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
        active_sessions,
    })
}

/// Request body for session creation
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub config: Option<SessionConfig>,
    /// Presentation text the question generator draws from
    #[serde(default)]
    pub slide_text: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
}

/// POST /api/sessions - create a session in the Created state
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<Json<CreateSessionResponse>, ServerError> {
    let config = request
        .config
        .unwrap_or_else(|| state.session_defaults.clone());
    let session_id = state
        .orchestrator
        .create_session(config, request.slide_text)
        .await?;
    Ok(Json(CreateSessionResponse { session_id }))
}

/// Summary of a session for list views
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub state: SessionState,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionSummary>,
}

/// GET /api/sessions - list all sessions
pub async fn list_sessions(State(state): State<Arc<AppState>>) -> Json<SessionListResponse> {
    let sessions = state
        .orchestrator
        .list_sessions()
        .await
        .into_iter()
        .map(|(id, state)| SessionSummary { id, state })
        .collect();
    Json(SessionListResponse { sessions })
}

/// GET /api/sessions/:id - current snapshot (state, metric, level counts)
pub async fn session_snapshot(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionSnapshot>, ServerError> {
    Ok(Json(state.orchestrator.snapshot(&id).await?))
}

/// Response to a lifecycle command: the emitted event's coordinates
#[derive(Debug, Serialize, Deserialize)]
pub struct LifecycleResponse {
    pub session_id: String,
    pub state: SessionState,
    pub seq: u64,
}

/// POST /api/sessions/:id/start
pub async fn start_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<LifecycleResponse>, ServerError> {
    let event = state.orchestrator.start_session(&id).await?;
    state.ticker.start(&id).await;
    Ok(Json(LifecycleResponse {
        session_id: id,
        state: SessionState::Active,
        seq: event.seq,
    }))
}

/// POST /api/sessions/:id/pause
pub async fn pause_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<LifecycleResponse>, ServerError> {
    let event = state.orchestrator.pause_session(&id).await?;
    state.ticker.stop(&id).await;
    Ok(Json(LifecycleResponse {
        session_id: id,
        state: SessionState::Paused,
        seq: event.seq,
    }))
}

/// POST /api/sessions/:id/resume
pub async fn resume_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<LifecycleResponse>, ServerError> {
    let event = state.orchestrator.resume_session(&id).await?;
    state.ticker.start(&id).await;
    Ok(Json(LifecycleResponse {
        session_id: id,
        state: SessionState::Active,
        seq: event.seq,
    }))
}

/// POST /api/sessions/:id/stop
pub async fn stop_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<LifecycleResponse>, ServerError> {
    let event = state.orchestrator.stop_session(&id).await?;
    state.ticker.stop(&id).await;
    Ok(Json(LifecycleResponse {
        session_id: id,
        state: SessionState::Stopped,
        seq: event.seq,
    }))
}

/// Request body for a raw engagement sample
#[derive(Debug, Serialize, Deserialize)]
pub struct SampleRequest {
    pub participant_id: String,
    #[serde(default)]
    pub attention: Option<f64>,
    #[serde(default)]
    pub response_latency_ms: Option<u32>,
    #[serde(default)]
    pub active: Option<bool>,
}

impl SampleRequest {
    fn into_sample(self) -> EngagementSample {
        EngagementSample {
            participant_id: self.participant_id,
            timestamp: Utc::now(),
            attention: self.attention,
            response_latency_ms: self.response_latency_ms,
            active: self.active,
        }
    }
}

/// Events emitted by an ingest operation, in emission order
#[derive(Debug, Serialize, Deserialize)]
pub struct EventsResponse {
    pub events: Vec<OrderedEvent>,
}

/// POST /api/sessions/:id/samples - pipe a sample through the control loop
pub async fn record_sample(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<SampleRequest>,
) -> Result<Json<EventsResponse>, ServerError> {
    let events = state
        .orchestrator
        .record_sample(&id, request.into_sample())
        .await?;
    Ok(Json(EventsResponse { events }))
}

/// Request body for a participant's answer to a delivered question
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponseRequest {
    pub participant_id: String,
    pub question_id: String,
    pub response_text: String,
    pub response_time_ms: u32,
    pub is_correct: bool,
}

/// POST /api/sessions/:id/responses - persist an answer and feed it back
/// into the loop as an engagement sample
pub async fn submit_response(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<SubmitResponseRequest>,
) -> Result<Json<EventsResponse>, ServerError> {
    let events = state
        .orchestrator
        .submit_response(
            &id,
            ResponseSubmission {
                participant_id: request.participant_id,
                question_id: request.question_id,
                response_text: request.response_text,
                response_time_ms: request.response_time_ms,
                is_correct: request.is_correct,
            },
        )
        .await?;
    Ok(Json(EventsResponse { events }))
}

/// POST /api/sessions/:id/deliver - instructor-forced delivery
pub async fn manual_override(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<EventsResponse>, ServerError> {
    let event = state.orchestrator.manual_override(&id).await?;
    Ok(Json(EventsResponse {
        events: vec![event],
    }))
}

/// POST /api/sessions/:id/reconcile - sync the roster with the meeting
pub async fn reconcile(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<EventsResponse>, ServerError> {
    let events = state.orchestrator.reconcile_participants(&id).await?;
    Ok(Json(EventsResponse { events }))
}
