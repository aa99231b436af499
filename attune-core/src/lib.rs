//! attune-core: adaptive engagement monitoring for live sessions
//!
//! This crate implements the engagement-to-delivery control loop:
//!
//! - **Classification** - [`EngagementClassifier`] strategy scoring raw
//!   per-participant samples, with [`RuleClassifier`] as the default
//! - **Aggregation** - [`SessionAggregator`] reducing per-participant scores
//!   to one session metric with a trend indicator
//! - **Delivery policy** - [`DeliveryController`] deciding when to push the
//!   next question and how to adapt the cadence
//! - **Orchestration** - [`Orchestrator`] owning session lifecycles and
//!   serializing every mutation per session
//! - **Fanout** - [`SessionFanout`] broadcasting ordered events to bounded
//!   subscriber channels with snapshot-first delivery
//!
//! Data flows one direction: samples → classifier → aggregator → controller
//! → orchestrator → fanout. Administrative commands enter at the
//! orchestrator only.

pub mod aggregator;
pub mod classifier;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod fanout;
pub mod questions;
pub mod roster;
pub mod session;
pub mod store;

// Re-export key types for convenience
pub use aggregator::{LevelCounts, SessionAggregator, SessionMetric, Trend};
pub use classifier::{
    EngagementClassifier, EngagementLevel, EngagementSample, EngagementScore, RuleClassifier,
};
pub use config::SessionConfig;
pub use controller::{DeliveryController, DeliveryDecision, TriggerReason};
pub use error::{AttuneError, ClassifyError, CollaboratorError, ConfigError, SessionError};
pub use events::{EventLog, EventSeq, OrderedEvent, SessionEvent};
pub use fanout::{FanoutMessage, SessionFanout, SessionSnapshot, SubscriberRole, Subscription};
pub use questions::{Question, QuestionPool, QuestionSource, TemplateQuestionSource};
pub use roster::{ConnectionStatus, Participant, ParticipantDirectory, Roster, StaticDirectory};
pub use session::{Orchestrator, ResponseSubmission, SessionContext, SessionState};
pub use store::{MemoryStore, ResponseRecord, SessionRecord, Store};
