//! WebSocket connection handling
//!
//! One connection observes one session. Subscribing goes through the
//! orchestrator, so the snapshot is queued before any later event can be
//! published; this handler only forwards what the fanout channel hands it,
//! in order. When the channel ends (session stopped, or this subscriber was
//! dropped on overflow) the socket is closed and the client must reconnect
//! for a fresh snapshot.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use chrono::Utc;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, info, warn};

use attune_core::{EngagementSample, ResponseSubmission, SubscriberRole};

use crate::AppState;

use super::protocol::{fanout_to_server_message, ClientMessage, ServerMessage};

/// Query parameters for the session WebSocket
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Session to observe
    pub session: String,
    /// "instructor" or "student" (default)
    #[serde(default)]
    pub role: Option<String>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<WsQuery>,
) -> impl IntoResponse {
    let role = match query.role.as_deref() {
        Some("instructor") => SubscriberRole::Instructor,
        _ => SubscriberRole::Student,
    };
    ws.on_upgrade(move |socket| handle_socket(socket, state, query.session, role))
}

async fn handle_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    session_id: String,
    role: SubscriberRole,
) {
    let (mut sender, mut receiver) = socket.split();

    let mut subscription = match state.orchestrator.subscribe(&session_id, role).await {
        Ok(subscription) => subscription,
        Err(e) => {
            warn!(session_id = %session_id, error = %e, "subscribe failed");
            let message = ServerMessage::Error {
                message: e.to_string(),
                code: "subscribe_failed".to_string(),
            };
            let _ = send_json(&mut sender, &message).await;
            return;
        }
    };
    info!(session_id = %session_id, ?role, "WebSocket client subscribed");

    loop {
        tokio::select! {
            // Client input: samples and question responses
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Err(e) = handle_text_message(&text, &state, &session_id).await {
                            let message = ServerMessage::Error {
                                message: e.message,
                                code: e.code,
                            };
                            if send_json(&mut sender, &message).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("WebSocket client sent close frame");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {
                        // Ignore binary and pong messages
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket error: {}", e);
                        break;
                    }
                }
            }

            // Ordered fanout: snapshot first, then live events
            fanout = subscription.rx.recv() => {
                match fanout {
                    Some(message) => {
                        let message = fanout_to_server_message(message);
                        if send_json(&mut sender, &message).await.is_err() {
                            break;
                        }
                    }
                    None => {
                        // Session stopped, or this subscriber overflowed and
                        // was dropped; either way a reconnect gets a fresh
                        // snapshot.
                        info!(session_id = %session_id, "subscription ended");
                        break;
                    }
                }
            }
        }
    }

    info!(session_id = %session_id, "WebSocket client disconnected");
}

struct ClientError {
    message: String,
    code: String,
}

/// Handle a text message from the client
async fn handle_text_message(
    text: &str,
    state: &Arc<AppState>,
    session_id: &str,
) -> Result<(), ClientError> {
    let message: ClientMessage = serde_json::from_str(text).map_err(|e| ClientError {
        message: format!("invalid message: {e}"),
        code: "invalid_message".to_string(),
    })?;

    match message {
        ClientMessage::Sample {
            participant_id,
            attention,
            response_latency_ms,
            active,
        } => {
            let sample = EngagementSample {
                participant_id,
                timestamp: Utc::now(),
                attention,
                response_latency_ms,
                active,
            };
            state
                .orchestrator
                .record_sample(session_id, sample)
                .await
                .map_err(|e| ClientError {
                    message: e.to_string(),
                    code: "sample_rejected".to_string(),
                })?;
        }

        ClientMessage::Response {
            participant_id,
            question_id,
            response_text,
            response_time_ms,
            is_correct,
        } => {
            state
                .orchestrator
                .submit_response(
                    session_id,
                    ResponseSubmission {
                        participant_id,
                        question_id,
                        response_text,
                        response_time_ms,
                        is_correct,
                    },
                )
                .await
                .map_err(|e| ClientError {
                    message: e.to_string(),
                    code: "response_rejected".to_string(),
                })?;
        }
    }

    Ok(())
}

/// Helper to serialize and send a JSON message
async fn send_json(
    sender: &mut SplitSink<WebSocket, Message>,
    message: &ServerMessage,
) -> Result<(), axum::Error> {
    match serde_json::to_string(message) {
        Ok(json) => sender.send(Message::Text(json.into())).await,
        Err(e) => {
            warn!("serialize error: {}", e);
            Ok(())
        }
    }
}
