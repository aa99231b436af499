//! Sample and score types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One raw engagement reading for a participant
///
/// Samples are immutable and ephemeral: the classifier consumes them and
/// nothing retains them beyond the latest-score map. Every feature is
/// optional; at least one must be present for classification to succeed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementSample {
    pub participant_id: String,
    pub timestamp: DateTime<Utc>,
    /// Attention proxy in [0, 1]; values outside the range are clamped
    #[serde(default)]
    pub attention: Option<f64>,
    /// Time the participant took to respond to the most recent prompt
    #[serde(default)]
    pub response_latency_ms: Option<u32>,
    /// Whether the participant showed any activity in the sampling window
    #[serde(default)]
    pub active: Option<bool>,
}

impl EngagementSample {
    pub fn new(participant_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            participant_id: participant_id.into(),
            timestamp,
            attention: None,
            response_latency_ms: None,
            active: None,
        }
    }

    pub fn with_attention(mut self, attention: f64) -> Self {
        self.attention = Some(attention);
        self
    }

    pub fn with_response_latency(mut self, latency_ms: u32) -> Self {
        self.response_latency_ms = Some(latency_ms);
        self
    }

    pub fn with_activity(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    /// True when no feature is present at all
    pub fn is_empty(&self) -> bool {
        self.attention.is_none() && self.response_latency_ms.is_none() && self.active.is_none()
    }
}

/// Engagement category derived from the scalar score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementLevel {
    High,
    Medium,
    Low,
}

impl EngagementLevel {
    /// Categorize a scalar against the configured thresholds
    pub fn from_value(value: f64, low_threshold: f64, high_threshold: f64) -> Self {
        if value >= high_threshold {
            Self::High
        } else if value >= low_threshold {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// A classified engagement score for one participant at one instant
///
/// Derived from exactly one sample; never mutated independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementScore {
    pub participant_id: String,
    pub timestamp: DateTime<Utc>,
    /// Scalar in [0, 1]
    pub value: f64,
    pub level: EngagementLevel,
}
