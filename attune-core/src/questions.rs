//! Question supply
//!
//! Question text generation is an external collaborator behind the
//! [`QuestionSource`] trait; the core only drains a per-session FIFO pool
//! and refills it from the source when a delivery finds it empty.

use std::collections::VecDeque;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CollaboratorError;

/// An opaque question payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub correct_answer: Option<String>,
    #[serde(default)]
    pub source_slide: Option<usize>,
    pub created_at: DateTime<Utc>,
}

impl Question {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            correct_answer: None,
            source_slide: None,
            created_at: Utc::now(),
        }
    }
}

/// External question generator
#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// Generate questions from presentation text
    async fn generate(&self, text: &str) -> Result<Vec<Question>, CollaboratorError>;
}

/// Per-session FIFO pool of ready-to-deliver questions
#[derive(Debug, Default)]
pub struct QuestionPool {
    queue: VecDeque<Question>,
    /// Registered presentation text the source generates from
    slide_text: Option<String>,
}

impl QuestionPool {
    pub fn new(slide_text: Option<String>) -> Self {
        Self {
            queue: VecDeque::new(),
            slide_text,
        }
    }

    pub fn register_text(&mut self, text: impl Into<String>) {
        self.slide_text = Some(text.into());
    }

    pub fn push(&mut self, question: Question) {
        self.queue.push_back(question);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Take the next question, refilling from the source if the pool is dry
    ///
    /// Returns `Ok(None)` when the source has nothing to offer (the caller
    /// downgrades the delivery to a starved no-op). A source failure
    /// propagates so the triggering operation can fail atomically.
    pub async fn take(
        &mut self,
        source: &dyn QuestionSource,
    ) -> Result<Option<Question>, CollaboratorError> {
        if self.queue.is_empty() {
            if let Some(text) = self.slide_text.clone() {
                let generated = source.generate(&text).await?;
                tracing::debug!(count = generated.len(), "refilled question pool");
                self.queue.extend(generated);
            }
        }
        Ok(self.queue.pop_front())
    }
}

/// Deterministic template-based source, the default until a real generator
/// is wired in
pub struct TemplateQuestionSource {
    templates: Vec<&'static str>,
}

impl TemplateQuestionSource {
    pub fn new() -> Self {
        Self {
            templates: vec![
                "What is the main topic discussed in this section?",
                "Which concept is most important in this section?",
                "What is a key takeaway from this material?",
                "Explain the primary concept discussed.",
                "What problem does this solution address?",
            ],
        }
    }
}

impl Default for TemplateQuestionSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QuestionSource for TemplateQuestionSource {
    async fn generate(&self, text: &str) -> Result<Vec<Question>, CollaboratorError> {
        let chunks: Vec<&str> = text
            .split("\n\n")
            .map(str::trim)
            .filter(|chunk| !chunk.is_empty())
            .collect();

        let questions = chunks
            .iter()
            .enumerate()
            .take(self.templates.len())
            .map(|(index, _)| {
                let mut question = Question::new(format!(
                    "{} (slide {})",
                    self.templates[index % self.templates.len()],
                    index + 1
                ));
                question.source_slide = Some(index);
                question
            })
            .collect();

        Ok(questions)
    }
}
