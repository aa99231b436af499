//! Session configuration
//!
//! Every tunable of the control loop lives here rather than as a hard
//! constant: classification thresholds, the adaptive cadence parameters, and
//! the fanout buffer size. Defaults match the documented policy values.

use std::collections::HashMap;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for one session's control loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Base delivery interval in seconds; the adaptive interval starts here
    /// and never grows beyond it
    #[serde(default = "default_base_interval")]
    pub base_interval_secs: u64,

    /// Floor for the adaptive interval in seconds
    #[serde(default = "default_min_interval")]
    pub min_interval_secs: u64,

    /// Minimum spacing between two triggered deliveries in seconds
    /// (debounce); manual overrides are exempt
    #[serde(default = "default_min_spacing")]
    pub min_spacing_secs: u64,

    /// Interval shrink factor applied on low-engagement triggers; the
    /// inverse is applied when engagement is consistently high
    #[serde(default = "default_shrink_factor")]
    pub shrink_factor: f64,

    /// Scores below this are classified Low
    #[serde(default = "default_low_threshold")]
    pub low_threshold: f64,

    /// Scores at or above this are classified High
    #[serde(default = "default_high_threshold")]
    pub high_threshold: f64,

    /// Aggregate change below this band is reported as a Stable trend
    #[serde(default = "default_hysteresis")]
    pub hysteresis: f64,

    /// Consecutive falling-low evaluations required for an EngagementDrop
    /// trigger
    #[serde(default = "default_falling_trigger_count")]
    pub falling_trigger_count: u32,

    /// Per-participant aggregation weights; participants not listed weigh 1.0
    #[serde(default)]
    pub participant_weights: HashMap<String, f64>,

    /// Per-subscriber fanout buffer capacity; a subscriber whose buffer
    /// fills is dropped and must resubscribe
    #[serde(default = "default_fanout_buffer")]
    pub fanout_buffer: usize,

    /// External meeting to reconcile the participant roster against
    #[serde(default)]
    pub meeting_id: Option<String>,
}

fn default_base_interval() -> u64 {
    60
}

fn default_min_interval() -> u64 {
    15
}

fn default_min_spacing() -> u64 {
    10
}

fn default_shrink_factor() -> f64 {
    0.75
}

fn default_low_threshold() -> f64 {
    0.33
}

fn default_high_threshold() -> f64 {
    0.66
}

fn default_hysteresis() -> f64 {
    0.05
}

fn default_falling_trigger_count() -> u32 {
    2
}

fn default_fanout_buffer() -> usize {
    64
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_interval_secs: default_base_interval(),
            min_interval_secs: default_min_interval(),
            min_spacing_secs: default_min_spacing(),
            shrink_factor: default_shrink_factor(),
            low_threshold: default_low_threshold(),
            high_threshold: default_high_threshold(),
            hysteresis: default_hysteresis(),
            falling_trigger_count: default_falling_trigger_count(),
            participant_weights: HashMap::new(),
            fanout_buffer: default_fanout_buffer(),
            meeting_id: None,
        }
    }
}

impl SessionConfig {
    /// Check the configuration for values the control loop cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shrink_factor <= 0.0 || self.shrink_factor >= 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "shrink_factor",
                reason: format!("must be in (0, 1), got {}", self.shrink_factor),
            });
        }
        if self.low_threshold >= self.high_threshold {
            return Err(ConfigError::InvalidValue {
                field: "low_threshold",
                reason: format!(
                    "must be below high_threshold ({} >= {})",
                    self.low_threshold, self.high_threshold
                ),
            });
        }
        if self.min_interval_secs == 0 || self.min_interval_secs > self.base_interval_secs {
            return Err(ConfigError::InvalidValue {
                field: "min_interval_secs",
                reason: format!(
                    "must be in 1..=base_interval_secs, got {}",
                    self.min_interval_secs
                ),
            });
        }
        if self.falling_trigger_count == 0 {
            return Err(ConfigError::InvalidValue {
                field: "falling_trigger_count",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.fanout_buffer == 0 {
            return Err(ConfigError::InvalidValue {
                field: "fanout_buffer",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn base_interval(&self) -> Duration {
        Duration::seconds(self.base_interval_secs as i64)
    }

    pub fn min_interval(&self) -> Duration {
        Duration::seconds(self.min_interval_secs as i64)
    }

    pub fn min_spacing(&self) -> Duration {
        Duration::seconds(self.min_spacing_secs as i64)
    }

    /// Aggregation weight for a participant (1.0 unless configured)
    pub fn weight_for(&self, participant_id: &str) -> f64 {
        self.participant_weights
            .get(participant_id)
            .copied()
            .unwrap_or(1.0)
    }
}
