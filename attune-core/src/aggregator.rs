//! Session-level engagement aggregation
//!
//! Keeps the latest score per connected participant and reduces them to one
//! session metric on every update. The previous aggregate is discarded; only
//! what the trend computation needs is retained. The aggregator has exactly
//! one writer (the session's serialized execution context) and is never
//! shared across sessions.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classifier::{EngagementLevel, EngagementScore};

/// Short-term direction of the session metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Rising,
    Stable,
    Falling,
}

/// Aggregate engagement for a session at one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetric {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    /// Weighted mean of the latest score of every connected participant
    pub value: f64,
    pub trend: Trend,
}

/// Count of participants per engagement level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

/// Latest-score-per-participant reduction for one session
#[derive(Debug)]
pub struct SessionAggregator {
    session_id: String,
    scores: HashMap<String, EngagementScore>,
    weights: HashMap<String, f64>,
    hysteresis: f64,
    previous: Option<f64>,
}

impl SessionAggregator {
    pub fn new(
        session_id: impl Into<String>,
        weights: HashMap<String, f64>,
        hysteresis: f64,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            scores: HashMap::new(),
            weights,
            hysteresis,
            previous: None,
        }
    }

    /// Record a participant's newest score and recompute the session metric
    pub fn update(&mut self, score: EngagementScore) -> SessionMetric {
        let timestamp = score.timestamp;
        self.scores.insert(score.participant_id.clone(), score);
        self.recompute(timestamp)
    }

    /// Drop a participant's contribution (on disconnect)
    ///
    /// Takes effect on the next recomputation; returns the removed score.
    pub fn remove(&mut self, participant_id: &str) -> Option<EngagementScore> {
        self.scores.remove(participant_id)
    }

    /// Latest score for a participant, used as the classifier prior
    pub fn latest(&self, participant_id: &str) -> Option<&EngagementScore> {
        self.scores.get(participant_id)
    }

    pub fn participant_count(&self) -> usize {
        self.scores.len()
    }

    /// Count scored participants per level
    pub fn level_counts(&self) -> LevelCounts {
        let mut counts = LevelCounts::default();
        for score in self.scores.values() {
            match score.level {
                EngagementLevel::High => counts.high += 1,
                EngagementLevel::Medium => counts.medium += 1,
                EngagementLevel::Low => counts.low += 1,
            }
        }
        counts
    }

    /// Recompute the weighted mean and trend against the previous aggregate
    pub fn recompute(&mut self, timestamp: DateTime<Utc>) -> SessionMetric {
        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;
        for (participant_id, score) in &self.scores {
            let weight = self.weights.get(participant_id).copied().unwrap_or(1.0);
            weighted_sum += score.value * weight;
            weight_total += weight;
        }
        let value = if weight_total > 0.0 {
            weighted_sum / weight_total
        } else {
            0.0
        };

        let trend = match self.previous {
            Some(previous) if value - previous > self.hysteresis => Trend::Rising,
            Some(previous) if previous - value > self.hysteresis => Trend::Falling,
            Some(_) => Trend::Stable,
            None => Trend::Stable,
        };
        self.previous = Some(value);

        SessionMetric {
            session_id: self.session_id.clone(),
            timestamp,
            value,
            trend,
        }
    }
}
