//! Rule-based engagement classifier
//!
//! Weighted combination of the sample features: attention counts most,
//! response latency next, the bare activity flag least. Latency maps
//! linearly from "fast" (full credit) to "slow" (none); the knees default to
//! 4s and 7s. Weights renormalize over the features actually present, so a
//! sample carrying only an activity flag still scores.

use crate::error::ClassifyError;

use super::types::{EngagementLevel, EngagementSample, EngagementScore};
use super::EngagementClassifier;

/// Default classifier: weighted rules over the raw feature vector
#[derive(Debug, Clone)]
pub struct RuleClassifier {
    low_threshold: f64,
    high_threshold: f64,
    /// Latency at or below this scores full engagement credit
    fast_latency_ms: u32,
    /// Latency at or above this scores none
    slow_latency_ms: u32,
    attention_weight: f64,
    latency_weight: f64,
    activity_weight: f64,
    /// Blend factor toward the prior score, damping single-sample spikes
    prior_smoothing: f64,
}

impl RuleClassifier {
    pub fn new(low_threshold: f64, high_threshold: f64) -> Self {
        Self {
            low_threshold,
            high_threshold,
            fast_latency_ms: 4_000,
            slow_latency_ms: 7_000,
            attention_weight: 0.5,
            latency_weight: 0.3,
            activity_weight: 0.2,
            prior_smoothing: 0.3,
        }
    }

    pub fn with_latency_knees(mut self, fast_ms: u32, slow_ms: u32) -> Self {
        self.fast_latency_ms = fast_ms;
        self.slow_latency_ms = slow_ms.max(fast_ms + 1);
        self
    }

    /// Map response latency onto [0, 1]: fast responses score high
    fn latency_component(&self, latency_ms: u32) -> f64 {
        if latency_ms <= self.fast_latency_ms {
            1.0
        } else if latency_ms >= self.slow_latency_ms {
            0.0
        } else {
            let span = (self.slow_latency_ms - self.fast_latency_ms) as f64;
            1.0 - (latency_ms - self.fast_latency_ms) as f64 / span
        }
    }
}

impl Default for RuleClassifier {
    fn default() -> Self {
        Self::new(0.33, 0.66)
    }
}

impl EngagementClassifier for RuleClassifier {
    fn classify(
        &self,
        sample: &EngagementSample,
        prior: Option<&EngagementScore>,
    ) -> Result<EngagementScore, ClassifyError> {
        if sample.is_empty() {
            return Err(ClassifyError::MissingFeatures {
                participant_id: sample.participant_id.clone(),
            });
        }

        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;

        if let Some(attention) = sample.attention {
            weighted_sum += attention.clamp(0.0, 1.0) * self.attention_weight;
            weight_total += self.attention_weight;
        }
        if let Some(latency_ms) = sample.response_latency_ms {
            weighted_sum += self.latency_component(latency_ms) * self.latency_weight;
            weight_total += self.latency_weight;
        }
        if let Some(active) = sample.active {
            let activity = if active { 1.0 } else { 0.0 };
            weighted_sum += activity * self.activity_weight;
            weight_total += self.activity_weight;
        }

        let raw = weighted_sum / weight_total;
        let value = match prior {
            Some(prior) => {
                self.prior_smoothing * prior.value + (1.0 - self.prior_smoothing) * raw
            }
            None => raw,
        };
        let value = value.clamp(0.0, 1.0);

        Ok(EngagementScore {
            participant_id: sample.participant_id.clone(),
            timestamp: sample.timestamp,
            value,
            level: EngagementLevel::from_value(value, self.low_threshold, self.high_threshold),
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn classify(sample: &EngagementSample) -> EngagementScore {
        RuleClassifier::default().classify(sample, None).unwrap()
    }

    #[test]
    fn empty_sample_is_rejected_not_defaulted() {
        let sample = EngagementSample::new("p-1", Utc::now());
        let result = RuleClassifier::default().classify(&sample, None);
        assert!(matches!(
            result,
            Err(ClassifyError::MissingFeatures { participant_id }) if participant_id == "p-1"
        ));
    }

    #[test]
    fn fast_correct_response_scores_high() {
        let sample = EngagementSample::new("p-1", Utc::now())
            .with_response_latency(2_000)
            .with_activity(true);
        let score = classify(&sample);
        assert_eq!(score.level, EngagementLevel::High);
        assert!((score.value - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn slow_inactive_response_scores_low() {
        let sample = EngagementSample::new("p-1", Utc::now())
            .with_response_latency(9_000)
            .with_activity(false);
        let score = classify(&sample);
        assert_eq!(score.level, EngagementLevel::Low);
        assert!(score.value < 0.01);
    }

    #[test]
    fn latency_between_knees_interpolates() {
        let classifier = RuleClassifier::default();
        // 5500ms is the midpoint between the 4000/7000 knees
        assert!((classifier.latency_component(5_500) - 0.5).abs() < 1e-9);
        assert!((classifier.latency_component(4_000) - 1.0).abs() < f64::EPSILON);
        assert!((classifier.latency_component(7_000)).abs() < f64::EPSILON);
    }

    #[test]
    fn out_of_range_attention_is_clamped() {
        let high = EngagementSample::new("p-1", Utc::now()).with_attention(3.5);
        let low = EngagementSample::new("p-1", Utc::now()).with_attention(-1.0);
        assert!((classify(&high).value - 1.0).abs() < f64::EPSILON);
        assert!(classify(&low).value.abs() < f64::EPSILON);
    }

    #[test]
    fn classification_is_deterministic() {
        let sample = EngagementSample::new("p-1", Utc::now())
            .with_attention(0.4)
            .with_response_latency(5_000);
        let first = classify(&sample);
        let second = classify(&sample);
        assert_eq!(first, second);
    }

    #[test]
    fn prior_score_smooths_the_result() {
        let classifier = RuleClassifier::default();
        let sample = EngagementSample::new("p-1", Utc::now()).with_attention(0.0);
        let prior = EngagementScore {
            participant_id: "p-1".to_string(),
            timestamp: Utc::now(),
            value: 1.0,
            level: EngagementLevel::High,
        };

        let without_prior = classifier.classify(&sample, None).unwrap();
        let with_prior = classifier.classify(&sample, Some(&prior)).unwrap();

        assert!(without_prior.value.abs() < f64::EPSILON);
        assert!((with_prior.value - 0.3).abs() < 1e-9);
    }

    #[test]
    fn single_feature_sample_renormalizes_weights() {
        let sample = EngagementSample::new("p-1", Utc::now()).with_activity(true);
        let score = classify(&sample);
        assert!((score.value - 1.0).abs() < f64::EPSILON);
    }
}
