//! Adaptive delivery controller
//!
//! Feedback policy deciding when to push the next question. The cadence
//! tightens while the audience is disengaged and relaxes back toward the
//! base interval while it is consistently engaged. Evaluation is pure
//! computation over the caller-supplied clock, so the policy is fully
//! deterministic under test.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregator::{SessionMetric, Trend};
use crate::config::SessionConfig;

/// Why a delivery fired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerReason {
    /// The adaptive interval elapsed
    ScheduledInterval,
    /// Sustained falling low engagement pre-empted the schedule
    EngagementDrop,
    /// Instructor forced a delivery
    ManualOverride,
}

/// Outcome of one policy evaluation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeliveryDecision {
    /// `None` means no delivery this evaluation
    pub reason: Option<TriggerReason>,
    /// The interval in effect after this evaluation
    pub next_interval: Duration,
}

impl DeliveryDecision {
    pub fn triggered(&self) -> bool {
        self.reason.is_some()
    }
}

/// Per-session feedback policy state
#[derive(Debug)]
pub struct DeliveryController {
    base_interval: Duration,
    min_interval: Duration,
    min_spacing: Duration,
    shrink_factor: f64,
    low_threshold: f64,
    high_threshold: f64,
    falling_trigger_count: u32,
    current_interval: Duration,
    /// Reference point for the schedule: session start or the last delivery
    interval_anchor: Option<DateTime<Utc>>,
    /// Last actual delivery; the debounce window is measured from here
    last_delivery: Option<DateTime<Utc>>,
    falling_streak: u32,
    high_streak: u32,
}

impl DeliveryController {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            base_interval: config.base_interval(),
            min_interval: config.min_interval(),
            min_spacing: config.min_spacing(),
            shrink_factor: config.shrink_factor,
            low_threshold: config.low_threshold,
            high_threshold: config.high_threshold,
            falling_trigger_count: config.falling_trigger_count,
            current_interval: config.base_interval(),
            interval_anchor: None,
            last_delivery: None,
            falling_streak: 0,
            high_streak: 0,
        }
    }

    /// Arm the schedule: the first interval is measured from session start
    pub fn arm(&mut self, now: DateTime<Utc>) {
        self.interval_anchor = Some(now);
    }

    pub fn current_interval(&self) -> Duration {
        self.current_interval
    }

    /// Evaluate the policy against the newest metric
    ///
    /// On a trigger the controller records the delivery time and adjusts the
    /// interval; the caller is responsible for actually emitting the event
    /// (and for downgrading to a no-op when no question is available).
    pub fn evaluate(&mut self, metric: &SessionMetric, now: DateTime<Utc>) -> DeliveryDecision {
        if metric.trend == Trend::Falling && metric.value < self.low_threshold {
            self.falling_streak += 1;
        } else {
            self.falling_streak = 0;
        }
        if metric.value >= self.high_threshold {
            self.high_streak += 1;
        } else {
            self.high_streak = 0;
        }

        let engagement_drop = self.falling_streak >= self.falling_trigger_count;
        let interval_elapsed = match self.interval_anchor {
            Some(anchor) => now - anchor >= self.current_interval,
            None => true,
        };

        let reason = if engagement_drop {
            Some(TriggerReason::EngagementDrop)
        } else if interval_elapsed {
            Some(TriggerReason::ScheduledInterval)
        } else {
            None
        };

        // Debounce: nothing fires inside the minimum spacing window, even an
        // engagement drop.
        let debounced = match (reason, self.last_delivery) {
            (Some(_), Some(last)) if now - last < self.min_spacing => true,
            _ => false,
        };

        if debounced || reason.is_none() {
            return DeliveryDecision {
                reason: None,
                next_interval: self.current_interval,
            };
        }

        self.record_trigger(metric.value, now);
        if reason == Some(TriggerReason::EngagementDrop) {
            self.falling_streak = 0;
        }

        DeliveryDecision {
            reason,
            next_interval: self.current_interval,
        }
    }

    /// A manual override always fires and resets the interval to base
    pub fn manual_override(&mut self, now: DateTime<Utc>) -> DeliveryDecision {
        self.interval_anchor = Some(now);
        self.last_delivery = Some(now);
        self.current_interval = self.base_interval;
        self.falling_streak = 0;
        self.high_streak = 0;

        DeliveryDecision {
            reason: Some(TriggerReason::ManualOverride),
            next_interval: self.current_interval,
        }
    }

    /// Record a fired delivery and adapt the interval to the metric
    fn record_trigger(&mut self, metric_value: f64, now: DateTime<Utc>) {
        self.interval_anchor = Some(now);
        self.last_delivery = Some(now);

        if metric_value < self.low_threshold {
            self.current_interval = max_duration(
                self.min_interval,
                mul_duration(self.current_interval, self.shrink_factor),
            );
        } else if self.high_streak >= self.falling_trigger_count {
            self.current_interval = min_duration(
                self.base_interval,
                mul_duration(self.current_interval, 1.0 / self.shrink_factor),
            );
        }
    }
}

fn mul_duration(duration: Duration, factor: f64) -> Duration {
    let millis = duration.num_milliseconds() as f64 * factor;
    Duration::milliseconds(millis.round() as i64)
}

fn max_duration(a: Duration, b: Duration) -> Duration {
    if a > b { a } else { b }
}

fn min_duration(a: Duration, b: Duration) -> Duration {
    if a < b { a } else { b }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::Trend;

    fn config() -> SessionConfig {
        SessionConfig::default()
    }

    fn metric(value: f64, trend: Trend, timestamp: DateTime<Utc>) -> SessionMetric {
        SessionMetric {
            session_id: "s-1".to_string(),
            timestamp,
            value,
            trend,
        }
    }

    fn start() -> DateTime<Utc> {
        "2026-03-01T10:00:00Z".parse().unwrap()
    }

    // ==================== Schedule Tests ====================

    #[test]
    fn no_trigger_before_interval_elapses() {
        let mut controller = DeliveryController::new(&config());
        let t0 = start();
        controller.arm(t0);

        let decision = controller.evaluate(
            &metric(0.5, Trend::Stable, t0),
            t0 + Duration::seconds(30),
        );
        assert!(!decision.triggered());
    }

    #[test]
    fn scheduled_trigger_fires_when_interval_elapses() {
        let mut controller = DeliveryController::new(&config());
        let t0 = start();
        controller.arm(t0);

        let decision = controller.evaluate(
            &metric(0.5, Trend::Stable, t0),
            t0 + Duration::seconds(60),
        );
        assert_eq!(decision.reason, Some(TriggerReason::ScheduledInterval));
    }

    // ==================== Engagement Drop Tests ====================

    #[test]
    fn falling_low_streak_triggers_engagement_drop_at_k() {
        let mut controller = DeliveryController::new(&config());
        let t0 = start();
        controller.arm(t0);

        // First falling-low evaluation: streak 1, below K=2
        let first = controller.evaluate(&metric(0.1, Trend::Falling, t0), t0);
        assert!(!first.triggered());

        // Second consecutive: fires immediately, ahead of the schedule
        let second = controller.evaluate(
            &metric(0.15, Trend::Falling, t0),
            t0 + Duration::seconds(1),
        );
        assert_eq!(second.reason, Some(TriggerReason::EngagementDrop));
    }

    #[test]
    fn stable_trend_resets_falling_streak() {
        let mut controller = DeliveryController::new(&config());
        let t0 = start();
        controller.arm(t0);

        controller.evaluate(&metric(0.1, Trend::Falling, t0), t0 + Duration::seconds(1));
        controller.evaluate(&metric(0.1, Trend::Stable, t0), t0 + Duration::seconds(2));
        let third = controller.evaluate(&metric(0.1, Trend::Falling, t0), t0 + Duration::seconds(3));
        // Streak restarted at 1, so no drop trigger yet
        assert!(!third.triggered());
    }

    #[test]
    fn scenario_three_low_samples_trigger_once_with_debounce() {
        // base 60s, spacing 10s, K=2: scores 0.1 / 0.15 / 0.2 all falling
        let mut controller = DeliveryController::new(&config());
        let t0 = start();
        controller.arm(t0);

        let d1 = controller.evaluate(&metric(0.1, Trend::Falling, t0), t0 + Duration::seconds(1));
        let d2 = controller.evaluate(&metric(0.15, Trend::Falling, t0), t0 + Duration::seconds(2));
        let d3 = controller.evaluate(&metric(0.2, Trend::Falling, t0), t0 + Duration::seconds(3));

        assert!(!d1.triggered());
        assert_eq!(d2.reason, Some(TriggerReason::EngagementDrop));
        assert!(!d3.triggered(), "third sample must be debounced");
    }

    // ==================== Adaptive Interval Tests ====================

    #[test]
    fn low_engagement_trigger_shrinks_interval() {
        let mut controller = DeliveryController::new(&config());
        let t0 = start();
        controller.arm(t0);

        let decision = controller.evaluate(
            &metric(0.1, Trend::Stable, t0),
            t0 + Duration::seconds(60),
        );
        assert!(decision.triggered());
        assert_eq!(decision.next_interval, Duration::seconds(45));
    }

    #[test]
    fn interval_never_shrinks_below_minimum() {
        let mut config = config();
        config.min_spacing_secs = 0;
        let mut controller = DeliveryController::new(&config);
        let mut now = start();
        controller.arm(now);

        for _ in 0..20 {
            now += controller.current_interval();
            controller.evaluate(&metric(0.1, Trend::Stable, now), now);
        }
        assert_eq!(controller.current_interval(), Duration::seconds(15));
    }

    #[test]
    fn sustained_high_engagement_grows_interval_back_to_base() {
        let mut config = config();
        config.min_spacing_secs = 0;
        let mut controller = DeliveryController::new(&config);
        let mut now = start();
        controller.arm(now);

        // Shrink first
        now += controller.current_interval();
        controller.evaluate(&metric(0.1, Trend::Stable, now), now);
        assert_eq!(controller.current_interval(), Duration::seconds(45));

        // Two consecutive high evaluations, then a scheduled trigger grows it
        for _ in 0..4 {
            now += controller.current_interval();
            controller.evaluate(&metric(0.9, Trend::Stable, now), now);
        }
        assert_eq!(controller.current_interval(), Duration::seconds(60));
    }

    // ==================== Manual Override Tests ====================

    #[test]
    fn manual_override_always_fires() {
        let mut controller = DeliveryController::new(&config());
        let t0 = start();
        controller.arm(t0);

        // Inside the debounce window: a manual override still fires
        controller.evaluate(&metric(0.1, Trend::Stable, t0), t0 + Duration::seconds(60));
        let decision = controller.manual_override(t0 + Duration::seconds(61));
        assert_eq!(decision.reason, Some(TriggerReason::ManualOverride));
    }

    #[test]
    fn manual_override_resets_interval_to_base() {
        let mut config = config();
        config.min_spacing_secs = 0;
        let mut controller = DeliveryController::new(&config);
        let mut now = start();
        controller.arm(now);

        for _ in 0..3 {
            now += controller.current_interval();
            controller.evaluate(&metric(0.1, Trend::Stable, now), now);
        }
        assert!(controller.current_interval() < Duration::seconds(60));

        let decision = controller.manual_override(now);
        assert_eq!(decision.next_interval, Duration::seconds(60));
    }

    // ==================== Debounce Tests ====================

    #[test]
    fn engagement_drop_respects_minimum_spacing() {
        let mut controller = DeliveryController::new(&config());
        let t0 = start();
        controller.arm(t0);

        // Fire a scheduled delivery
        controller.evaluate(&metric(0.5, Trend::Stable, t0), t0 + Duration::seconds(60));

        // Build a qualifying drop streak immediately afterwards
        let t1 = t0 + Duration::seconds(62);
        let t2 = t0 + Duration::seconds(64);
        controller.evaluate(&metric(0.1, Trend::Falling, t1), t1);
        let suppressed = controller.evaluate(&metric(0.05, Trend::Falling, t2), t2);
        assert!(!suppressed.triggered());

        // Outside the spacing window the still-standing streak fires
        let t3 = t0 + Duration::seconds(71);
        let fired = controller.evaluate(&metric(0.05, Trend::Falling, t3), t3);
        assert_eq!(fired.reason, Some(TriggerReason::EngagementDrop));
    }
}
