//! Shared application state for the attune server

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use attune_core::{
    MemoryStore, Orchestrator, RuleClassifier, SessionConfig, StaticDirectory,
    TemplateQuestionSource,
};

use crate::ticker::SessionTicker;

/// Shared application state accessible by all handlers
pub struct AppState {
    /// Session orchestrator, the sole route to session state
    pub orchestrator: Arc<Orchestrator>,
    /// Per-session scheduled-interval tick tasks
    pub ticker: SessionTicker,
    /// Config applied to sessions created without an explicit one
    pub session_defaults: SessionConfig,
    /// When the server started
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Create state with in-memory collaborators and the rule classifier
    pub fn new(tick: Duration) -> Self {
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::new(RuleClassifier::default()),
            Arc::new(TemplateQuestionSource::new()),
            Arc::new(StaticDirectory::default()),
            MemoryStore::new(),
        ));
        Self::with_orchestrator(orchestrator, tick)
    }

    /// Create state around an existing orchestrator (for tests and for
    /// custom collaborator wiring)
    pub fn with_orchestrator(orchestrator: Arc<Orchestrator>, tick: Duration) -> Self {
        let ticker = SessionTicker::new(Arc::clone(&orchestrator), tick);
        Self {
            orchestrator,
            ticker,
            session_defaults: SessionConfig::default(),
            started_at: Utc::now(),
        }
    }

    /// Override the defaults applied to sessions created without a config
    pub fn with_session_defaults(mut self, session_defaults: SessionConfig) -> Self {
        self.session_defaults = session_defaults;
        self
    }

    /// Returns how long the server has been running
    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}
