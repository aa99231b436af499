//! Session orchestrator
//!
//! Owns the registry of sessions and is the sole route to their mutable
//! state. The registry is a map of session id to an independently-lockable
//! context: looking a session up takes a short read lock on the map, and the
//! operation itself serializes on that session's own mutex. Operations on
//! different sessions never contend.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::classifier::{EngagementClassifier, EngagementSample};
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::events::OrderedEvent;
use crate::fanout::{SessionSnapshot, SubscriberRole, Subscription};
use crate::questions::QuestionSource;
use crate::roster::ParticipantDirectory;
use crate::store::{ResponseRecord, SessionRecord, Store};

use super::context::SessionContext;
use super::state::SessionState;

/// A participant's answer to a delivered question, as submitted by a client
#[derive(Debug, Clone)]
pub struct ResponseSubmission {
    pub participant_id: String,
    pub question_id: String,
    pub response_text: String,
    pub response_time_ms: u32,
    pub is_correct: bool,
}

pub struct Orchestrator {
    sessions: RwLock<HashMap<String, Arc<Mutex<SessionContext>>>>,
    classifier: Arc<dyn EngagementClassifier>,
    question_source: Arc<dyn QuestionSource>,
    directory: Arc<dyn ParticipantDirectory>,
    store: Arc<dyn Store>,
}

impl Orchestrator {
    pub fn new(
        classifier: Arc<dyn EngagementClassifier>,
        question_source: Arc<dyn QuestionSource>,
        directory: Arc<dyn ParticipantDirectory>,
        store: Arc<dyn Store>,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            classifier,
            question_source,
            directory,
            store,
        }
    }

    /// Create a session in the Created state
    ///
    /// The session record is persisted before the session becomes reachable;
    /// creation emits no event.
    pub async fn create_session(
        &self,
        config: SessionConfig,
        slide_text: Option<String>,
    ) -> Result<String, SessionError> {
        config.validate()?;
        let id = Uuid::new_v4().to_string();

        self.store
            .save_session(SessionRecord {
                id: id.clone(),
                state: SessionState::Created.as_str().to_string(),
                created_at: Utc::now(),
                config: config.clone(),
            })
            .await?;

        let context = SessionContext::new(
            id.clone(),
            config,
            slide_text,
            Arc::clone(&self.classifier),
            Arc::clone(&self.question_source),
            Arc::clone(&self.store),
        );
        self.sessions
            .write()
            .await
            .insert(id.clone(), Arc::new(Mutex::new(context)));
        tracing::info!(session_id = %id, "session created");
        Ok(id)
    }

    // ==================== Lifecycle commands ====================

    pub async fn start_session(&self, id: &str) -> Result<OrderedEvent, SessionError> {
        let context = self.context(id).await?;
        let mut context = context.lock().await;
        context.start(Utc::now()).await
    }

    pub async fn pause_session(&self, id: &str) -> Result<OrderedEvent, SessionError> {
        let context = self.context(id).await?;
        let mut context = context.lock().await;
        context.pause(Utc::now()).await
    }

    pub async fn resume_session(&self, id: &str) -> Result<OrderedEvent, SessionError> {
        let context = self.context(id).await?;
        let mut context = context.lock().await;
        context.resume(Utc::now()).await
    }

    pub async fn stop_session(&self, id: &str) -> Result<OrderedEvent, SessionError> {
        let context = self.context(id).await?;
        let mut context = context.lock().await;
        context.stop(Utc::now()).await
    }

    // ==================== Control loop ====================

    /// Pipe a raw sample through classifier, aggregator, and controller
    pub async fn record_sample(
        &self,
        id: &str,
        sample: EngagementSample,
    ) -> Result<Vec<OrderedEvent>, SessionError> {
        let context = self.context(id).await?;
        let mut context = context.lock().await;
        context.record_sample(sample).await
    }

    /// Persist a participant's answer and feed it back in as an engagement
    /// sample (response latency + correctness)
    pub async fn submit_response(
        &self,
        id: &str,
        submission: ResponseSubmission,
    ) -> Result<Vec<OrderedEvent>, SessionError> {
        let timestamp = Utc::now();
        // Persist first: a store failure must not half-apply the operation
        self.store
            .save_response(ResponseRecord {
                session_id: id.to_string(),
                participant_id: submission.participant_id.clone(),
                question_id: submission.question_id.clone(),
                response_text: submission.response_text.clone(),
                response_time_ms: submission.response_time_ms,
                is_correct: submission.is_correct,
                timestamp,
            })
            .await?;

        let sample = EngagementSample::new(submission.participant_id, timestamp)
            .with_response_latency(submission.response_time_ms)
            .with_activity(submission.is_correct);
        self.record_sample(id, sample).await
    }

    pub async fn manual_override(&self, id: &str) -> Result<OrderedEvent, SessionError> {
        let context = self.context(id).await?;
        let mut context = context.lock().await;
        context.manual_override(Utc::now()).await
    }

    /// Evaluate the scheduled-interval policy for one session (tick driver)
    pub async fn evaluate_schedule(&self, id: &str) -> Result<Vec<OrderedEvent>, SessionError> {
        let context = self.context(id).await?;
        let mut context = context.lock().await;
        context.evaluate_schedule(Utc::now()).await
    }

    /// Reconcile the roster against the external participant directory
    pub async fn reconcile_participants(
        &self,
        id: &str,
    ) -> Result<Vec<OrderedEvent>, SessionError> {
        let context = self.context(id).await?;

        let meeting_id = {
            let context = context.lock().await;
            match context.meeting_id() {
                Some(meeting_id) => meeting_id.to_string(),
                None => return Ok(Vec::new()),
            }
        };

        // Fetch outside the session lock; a directory failure aborts the
        // operation before any mutation.
        let participants = self.directory.fetch_participants(&meeting_id).await?;

        let mut context = context.lock().await;
        context.reconcile(&participants, Utc::now())
    }

    // ==================== Fanout ====================

    pub async fn subscribe(
        &self,
        id: &str,
        role: SubscriberRole,
    ) -> Result<Subscription, SessionError> {
        let context = self.context(id).await?;
        let mut context = context.lock().await;
        context.subscribe(role)
    }

    // ==================== Queries ====================

    pub async fn session_state(&self, id: &str) -> Result<SessionState, SessionError> {
        let context = self.context(id).await?;
        let context = context.lock().await;
        Ok(context.state())
    }

    pub async fn snapshot(&self, id: &str) -> Result<SessionSnapshot, SessionError> {
        let context = self.context(id).await?;
        let context = context.lock().await;
        Ok(context.snapshot())
    }

    pub async fn list_sessions(&self) -> Vec<(String, SessionState)> {
        let sessions = self.sessions.read().await;
        let mut result = Vec::with_capacity(sessions.len());
        for (id, context) in sessions.iter() {
            let context = context.lock().await;
            result.push((id.clone(), context.state()));
        }
        result
    }

    /// Ids of sessions currently accepting scheduled deliveries
    pub async fn active_sessions(&self) -> Vec<String> {
        self.list_sessions()
            .await
            .into_iter()
            .filter(|(_, state)| state.accepts_samples())
            .map(|(id, _)| id)
            .collect()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn context(&self, id: &str) -> Result<Arc<Mutex<SessionContext>>, SessionError> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }
}
