//! Event type definitions
//!
//! Outbound events are a closed tagged enum: one variant per observable
//! state change, no dynamic payloads. The orchestrator stamps each emitted
//! event with the session's next sequence number; that stamp is the single
//! source of truth for event order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregator::SessionMetric;
use crate::controller::TriggerReason;
use crate::questions::Question;

/// Per-session sequence number (monotonic, gap-free)
pub type EventSeq = u64;

/// Events emitted by the session orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Session transitioned to Active
    SessionStarted {
        session_id: String,
        connected_participants: usize,
    },

    /// Session transitioned to Paused
    SessionPaused { session_id: String },

    /// Session transitioned back to Active
    SessionResumed { session_id: String },

    /// Session reached its terminal state
    SessionStopped { session_id: String },

    /// The session engagement metric was recomputed
    MetricUpdated {
        session_id: String,
        metric: SessionMetric,
    },

    /// A question was pushed to participants
    QuestionDelivered {
        session_id: String,
        question: Question,
        reason: TriggerReason,
    },

    /// A delivery fired but no question was available; the loop continues
    DeliveryStarved {
        session_id: String,
        reason: TriggerReason,
    },
}

impl SessionEvent {
    pub fn session_id(&self) -> &str {
        match self {
            SessionEvent::SessionStarted { session_id, .. } => session_id,
            SessionEvent::SessionPaused { session_id } => session_id,
            SessionEvent::SessionResumed { session_id } => session_id,
            SessionEvent::SessionStopped { session_id } => session_id,
            SessionEvent::MetricUpdated { session_id, .. } => session_id,
            SessionEvent::QuestionDelivered { session_id, .. } => session_id,
            SessionEvent::DeliveryStarved { session_id, .. } => session_id,
        }
    }
}

/// An event stamped with its sequence number and emission time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderedEvent {
    pub seq: EventSeq,
    pub timestamp: DateTime<Utc>,
    pub event: SessionEvent,
}
