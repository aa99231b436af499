//! Engagement classification
//!
//! The classifier is a pluggable strategy injected at session-configuration
//! time: callers depend only on the scalar/label contract, so the rule-based
//! default can later be swapped for a learned model without touching the
//! delivery controller.

mod rules;
mod types;

pub use rules::RuleClassifier;
pub use types::{EngagementLevel, EngagementSample, EngagementScore};

use crate::error::ClassifyError;

/// Strategy interface for scoring one participant's sample
///
/// Implementations must be pure and deterministic: no side effects, no
/// blocking, and the same `(sample, prior)` pair always yields the same
/// score. Out-of-range feature values are clamped, never rejected; a sample
/// with no usable feature at all is malformed and yields an error.
pub trait EngagementClassifier: Send + Sync {
    fn classify(
        &self,
        sample: &EngagementSample,
        prior: Option<&EngagementScore>,
    ) -> Result<EngagementScore, ClassifyError>;
}
