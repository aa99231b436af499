//! Durable store collaborator
//!
//! The core never depends on store internals, only on save/load succeeding
//! or failing. Lifecycle operations persist before they append to the event
//! log, so a store failure leaves no partial log entry behind.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::config::SessionConfig;
use crate::error::CollaboratorError;
use crate::questions::Question;

/// Persisted view of a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub state: String,
    pub created_at: DateTime<Utc>,
    pub config: SessionConfig,
}

/// A participant's answer to a delivered question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub session_id: String,
    pub participant_id: String,
    pub question_id: String,
    pub response_text: String,
    pub response_time_ms: u32,
    pub is_correct: bool,
    pub timestamp: DateTime<Utc>,
}

/// Durable storage for session, question, and response records
#[async_trait]
pub trait Store: Send + Sync {
    async fn save_session(&self, record: SessionRecord) -> Result<(), CollaboratorError>;

    async fn load_session(&self, id: &str) -> Result<SessionRecord, CollaboratorError>;

    async fn save_question(
        &self,
        session_id: &str,
        question: Question,
    ) -> Result<(), CollaboratorError>;

    async fn save_response(&self, record: ResponseRecord) -> Result<(), CollaboratorError>;
}

/// In-memory store, the default for the server and for tests
#[derive(Default)]
pub struct MemoryStore {
    sessions: RwLock<HashMap<String, SessionRecord>>,
    questions: RwLock<Vec<(String, Question)>>,
    responses: RwLock<Vec<ResponseRecord>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn response_count(&self) -> usize {
        self.responses.read().await.len()
    }

    pub async fn question_count(&self) -> usize {
        self.questions.read().await.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn save_session(&self, record: SessionRecord) -> Result<(), CollaboratorError> {
        self.sessions.write().await.insert(record.id.clone(), record);
        Ok(())
    }

    async fn load_session(&self, id: &str) -> Result<SessionRecord, CollaboratorError> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| CollaboratorError::RecordNotFound(id.to_string()))
    }

    async fn save_question(
        &self,
        session_id: &str,
        question: Question,
    ) -> Result<(), CollaboratorError> {
        self.questions
            .write()
            .await
            .push((session_id.to_string(), question));
        Ok(())
    }

    async fn save_response(&self, record: ResponseRecord) -> Result<(), CollaboratorError> {
        self.responses.write().await.push(record);
        Ok(())
    }
}
