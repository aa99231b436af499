//! Per-session scheduled-interval tick
//!
//! While a session is Active the server runs one tick task for it, driving
//! `evaluate_schedule` so scheduled deliveries fire even when no samples are
//! arriving. Pausing or stopping a session cancels its task through a
//! CancellationToken.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use attune_core::Orchestrator;

/// Spawns and cancels the per-session tick tasks
pub struct SessionTicker {
    orchestrator: Arc<Orchestrator>,
    tick: Duration,
    tokens: Mutex<HashMap<String, CancellationToken>>,
}

impl SessionTicker {
    pub fn new(orchestrator: Arc<Orchestrator>, tick: Duration) -> Self {
        Self {
            orchestrator,
            tick,
            tokens: Mutex::new(HashMap::new()),
        }
    }

    /// Start ticking a session; replaces any previous task for the same id
    pub async fn start(&self, session_id: &str) {
        let token = CancellationToken::new();
        if let Some(previous) = self
            .tokens
            .lock()
            .await
            .insert(session_id.to_string(), token.clone())
        {
            previous.cancel();
        }

        let orchestrator = Arc::clone(&self.orchestrator);
        let session_id = session_id.to_string();
        let tick = self.tick;
        tokio::spawn(async move {
            tracing::debug!(session_id = %session_id, "tick task started");
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(tick) => {
                        match orchestrator.evaluate_schedule(&session_id).await {
                            Ok(events) if !events.is_empty() => {
                                tracing::debug!(
                                    session_id = %session_id,
                                    count = events.len(),
                                    "scheduled delivery fired"
                                );
                            }
                            Ok(_) => {}
                            Err(e) => {
                                tracing::warn!(session_id = %session_id, error = %e, "tick failed");
                                break;
                            }
                        }
                    }
                }
            }
            tracing::debug!(session_id = %session_id, "tick task ended");
        });
    }

    /// Cancel the tick task for a session, if any
    pub async fn stop(&self, session_id: &str) {
        if let Some(token) = self.tokens.lock().await.remove(session_id) {
            token.cancel();
        }
    }

    pub async fn ticking_count(&self) -> usize {
        self.tokens.lock().await.len()
    }
}
