//! End-to-end tests for the engagement-to-delivery control loop
//!
//! These drive a SessionContext directly with synthetic clocks so the
//! adaptive policy is fully deterministic, plus a few orchestrator-level
//! checks using the real clock.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use attune_core::{
    ClassifyError, CollaboratorError, EngagementClassifier, EngagementLevel, EngagementSample,
    EngagementScore, FanoutMessage, MemoryStore, Orchestrator, Question, QuestionSource,
    RuleClassifier, SessionConfig, SessionContext, SessionEvent, SessionRecord, SessionState,
    StaticDirectory, Store, SubscriberRole, TemplateQuestionSource, TriggerReason,
};

/// Classifier that maps the attention feature straight to the score, so
/// tests control the metric exactly
struct ScriptedClassifier;

impl EngagementClassifier for ScriptedClassifier {
    fn classify(
        &self,
        sample: &EngagementSample,
        _prior: Option<&EngagementScore>,
    ) -> Result<EngagementScore, ClassifyError> {
        let value = sample
            .attention
            .ok_or_else(|| ClassifyError::MissingFeatures {
                participant_id: sample.participant_id.clone(),
            })?
            .clamp(0.0, 1.0);
        Ok(EngagementScore {
            participant_id: sample.participant_id.clone(),
            timestamp: sample.timestamp,
            value,
            level: EngagementLevel::from_value(value, 0.33, 0.66),
        })
    }
}

/// Question source with nothing to offer
struct EmptySource;

#[async_trait]
impl QuestionSource for EmptySource {
    async fn generate(&self, _text: &str) -> Result<Vec<Question>, CollaboratorError> {
        Ok(Vec::new())
    }
}

/// Question source that always fails
struct FailingSource;

#[async_trait]
impl QuestionSource for FailingSource {
    async fn generate(&self, _text: &str) -> Result<Vec<Question>, CollaboratorError> {
        Err(CollaboratorError::GeneratorFailed("offline".to_string()))
    }
}

/// Store whose save_session always fails
#[derive(Default)]
struct FailingStore;

#[async_trait]
impl Store for FailingStore {
    async fn save_session(&self, _record: SessionRecord) -> Result<(), CollaboratorError> {
        Err(CollaboratorError::StoreUnavailable(
            "connection refused".to_string(),
        ))
    }

    async fn load_session(&self, id: &str) -> Result<SessionRecord, CollaboratorError> {
        Err(CollaboratorError::RecordNotFound(id.to_string()))
    }

    async fn save_question(
        &self,
        _session_id: &str,
        _question: Question,
    ) -> Result<(), CollaboratorError> {
        Ok(())
    }

    async fn save_response(
        &self,
        _record: attune_core::ResponseRecord,
    ) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

fn t0() -> DateTime<Utc> {
    "2026-03-01T10:00:00Z".parse().unwrap()
}

fn context_with(
    question_source: Arc<dyn QuestionSource>,
    slide_text: Option<String>,
) -> SessionContext {
    SessionContext::new(
        "s-1",
        SessionConfig::default(),
        slide_text,
        Arc::new(ScriptedClassifier),
        question_source,
        MemoryStore::new(),
    )
}

fn context() -> SessionContext {
    context_with(
        Arc::new(TemplateQuestionSource::new()),
        Some("Slide one\n\nSlide two\n\nSlide three".to_string()),
    )
}

fn attention_sample(participant_id: &str, attention: f64, at: DateTime<Utc>) -> EngagementSample {
    EngagementSample::new(participant_id, at).with_attention(attention)
}

// ==================== Lifecycle Tests ====================

#[tokio::test]
async fn lifecycle_events_are_sequenced_without_gaps() {
    let mut context = context();
    let now = t0();

    let started = context.start(now).await.unwrap();
    let paused = context.pause(now + Duration::seconds(1)).await.unwrap();
    let resumed = context.resume(now + Duration::seconds(2)).await.unwrap();
    let stopped = context.stop(now + Duration::seconds(3)).await.unwrap();

    assert_eq!(started.seq, 0);
    assert_eq!(paused.seq, 1);
    assert_eq!(resumed.seq, 2);
    assert_eq!(stopped.seq, 3);
    assert!(matches!(started.event, SessionEvent::SessionStarted { .. }));
    assert!(matches!(stopped.event, SessionEvent::SessionStopped { .. }));
}

#[tokio::test]
async fn stopped_session_rejects_every_operation() {
    let mut context = context();
    let now = t0();
    context.start(now).await.unwrap();
    context.stop(now + Duration::seconds(1)).await.unwrap();

    let later = now + Duration::seconds(2);
    assert!(context.start(later).await.is_err());
    assert!(context.pause(later).await.is_err());
    assert!(context.resume(later).await.is_err());
    assert!(context.stop(later).await.is_err());
    assert!(context
        .record_sample(attention_sample("p-1", 0.5, later))
        .await
        .is_err());
    assert!(context.manual_override(later).await.is_err());
    assert!(context.subscribe(SubscriberRole::Student).is_err());
}

#[tokio::test]
async fn pause_emits_once_and_rejects_samples_until_resume() {
    let mut context = context();
    let now = t0();
    context.start(now).await.unwrap();

    let paused = context.pause(now + Duration::seconds(1)).await.unwrap();
    assert!(matches!(paused.event, SessionEvent::SessionPaused { .. }));
    let log_len_after_pause = context.event_log().len();

    // Samples are rejected while paused, with no event emitted
    let rejected = context
        .record_sample(attention_sample("p-1", 0.5, now + Duration::seconds(2)))
        .await;
    assert!(rejected.is_err());
    assert_eq!(context.event_log().len(), log_len_after_pause);

    context.resume(now + Duration::seconds(3)).await.unwrap();
    let accepted = context
        .record_sample(attention_sample("p-1", 0.5, now + Duration::seconds(4)))
        .await;
    assert!(accepted.is_ok());
}

#[tokio::test]
async fn double_start_is_rejected() {
    let mut context = context();
    context.start(t0()).await.unwrap();
    let result = context.start(t0() + Duration::seconds(1)).await;
    assert!(result.is_err());
    // The failed operation appended nothing
    assert_eq!(context.event_log().len(), 1);
}

// ==================== Engagement Drop Tests ====================

#[tokio::test]
async fn sustained_falling_low_engagement_triggers_exactly_one_drop() {
    let mut context = context();
    let now = t0();
    context.start(now).await.unwrap();

    // Seed a healthy metric, then let it fall below the low threshold for
    // two consecutive evaluations; the third low sample lands inside the
    // 10s debounce window and must not re-trigger.
    let mut all_events = Vec::new();
    for (offset, attention) in [(1, 0.9), (2, 0.28), (3, 0.2), (4, 0.1)] {
        let events = context
            .record_sample(attention_sample(
                "p-1",
                attention,
                now + Duration::seconds(offset),
            ))
            .await
            .unwrap();
        all_events.extend(events);
    }

    let drops: Vec<_> = all_events
        .iter()
        .filter(|e| {
            matches!(
                &e.event,
                SessionEvent::QuestionDelivered {
                    reason: TriggerReason::EngagementDrop,
                    ..
                }
            )
        })
        .collect();
    assert_eq!(drops.len(), 1, "exactly one engagement-drop delivery");

    // The drop fired on the second consecutive low sample (t0 + 3s)
    let expected_at = now + Duration::seconds(3);
    assert_eq!(drops[0].timestamp, expected_at);
}

// ==================== Delivery Tests ====================

#[tokio::test]
async fn manual_override_delivers_regardless_of_schedule() {
    let mut context = context();
    let now = t0();
    context.start(now).await.unwrap();

    // Well inside the base interval
    let event = context
        .manual_override(now + Duration::seconds(5))
        .await
        .unwrap();
    assert!(matches!(
        event.event,
        SessionEvent::QuestionDelivered {
            reason: TriggerReason::ManualOverride,
            ..
        }
    ));
}

#[tokio::test]
async fn starved_delivery_downgrades_to_warning_and_loop_continues() {
    let mut context = context_with(Arc::new(EmptySource), None);
    let now = t0();
    context.start(now).await.unwrap();

    let event = context
        .manual_override(now + Duration::seconds(1))
        .await
        .unwrap();
    assert!(matches!(
        event.event,
        SessionEvent::DeliveryStarved {
            reason: TriggerReason::ManualOverride,
            ..
        }
    ));

    // The loop keeps running after a starved delivery
    let events = context
        .record_sample(attention_sample("p-1", 0.5, now + Duration::seconds(2)))
        .await
        .unwrap();
    assert!(!events.is_empty());
}

#[tokio::test]
async fn generator_failure_leaves_the_log_untouched() {
    let mut context = context_with(Arc::new(FailingSource), Some("some text".to_string()));
    let now = t0();
    context.start(now).await.unwrap();
    let log_len = context.event_log().len();

    // Manual override must reach the generator and fail atomically
    let result = context.manual_override(now + Duration::seconds(1)).await;
    assert!(result.is_err());
    assert_eq!(context.event_log().len(), log_len);
}

#[tokio::test]
async fn scheduled_interval_fires_via_tick_evaluation() {
    let mut context = context();
    let now = t0();
    context.start(now).await.unwrap();
    context
        .record_sample(attention_sample("p-1", 0.5, now + Duration::seconds(1)))
        .await
        .unwrap();

    // Before the interval elapses the tick is a no-op
    let quiet = context
        .evaluate_schedule(now + Duration::seconds(30))
        .await
        .unwrap();
    assert!(quiet.is_empty());

    let fired = context
        .evaluate_schedule(now + Duration::seconds(61))
        .await
        .unwrap();
    assert_eq!(fired.len(), 1);
    assert!(matches!(
        fired[0].event,
        SessionEvent::QuestionDelivered {
            reason: TriggerReason::ScheduledInterval,
            ..
        }
    ));
}

// ==================== Store Failure Tests ====================

#[tokio::test]
async fn store_failure_fails_start_atomically() {
    let mut context = SessionContext::new(
        "s-1",
        SessionConfig::default(),
        None,
        Arc::new(ScriptedClassifier),
        Arc::new(TemplateQuestionSource::new()),
        Arc::new(FailingStore),
    );

    let result = context.start(t0()).await;
    assert!(result.is_err());
    assert_eq!(context.state(), SessionState::Created);
    assert!(context.event_log().is_empty());
}

// ==================== Fanout Tests ====================

#[tokio::test]
async fn late_joiner_gets_snapshot_before_any_live_event() {
    let mut context = context();
    let now = t0();
    context.start(now).await.unwrap();

    // Some history before the subscriber joins
    for offset in 1..=3 {
        context
            .record_sample(attention_sample(
                "p-1",
                0.5,
                now + Duration::seconds(offset),
            ))
            .await
            .unwrap();
    }
    let last_seq_at_join = context.event_log().last_seq();

    let mut subscription = context.subscribe(SubscriberRole::Instructor).unwrap();

    // A burst of samples lands immediately after the join
    for offset in 4..=13 {
        context
            .record_sample(attention_sample(
                "p-2",
                0.5,
                now + Duration::seconds(offset),
            ))
            .await
            .unwrap();
    }

    let first = subscription.rx.recv().await.unwrap();
    let snapshot = match first {
        FanoutMessage::Snapshot(snapshot) => snapshot,
        FanoutMessage::Event(event) => panic!("expected snapshot first, got event {}", event.seq),
    };
    assert_eq!(snapshot.last_seq, last_seq_at_join);
    assert_eq!(snapshot.state, SessionState::Active);
    assert!(snapshot.metric.is_some());

    // Live events continue seamlessly from the snapshot, strictly
    // increasing with no gaps
    let mut expected = snapshot.last_seq.unwrap() + 1;
    for _ in 0..10 {
        match subscription.rx.recv().await.unwrap() {
            FanoutMessage::Event(event) => {
                assert_eq!(event.seq, expected);
                expected += 1;
            }
            FanoutMessage::Snapshot(_) => panic!("unexpected second snapshot"),
        }
    }
}

#[tokio::test]
async fn stop_closes_subscriber_channels_after_terminal_event() {
    let mut context = context();
    let now = t0();
    context.start(now).await.unwrap();
    let mut subscription = context.subscribe(SubscriberRole::Student).unwrap();

    context.stop(now + Duration::seconds(1)).await.unwrap();

    // Snapshot, then the terminal event, then the channel ends
    assert!(matches!(
        subscription.rx.recv().await.unwrap(),
        FanoutMessage::Snapshot(_)
    ));
    assert!(matches!(
        subscription.rx.recv().await.unwrap(),
        FanoutMessage::Event(event) if matches!(event.event, SessionEvent::SessionStopped { .. })
    ));
    assert!(subscription.rx.recv().await.is_none());
}

// ==================== Reconciliation Tests ====================

#[tokio::test]
async fn departed_participant_stops_contributing_to_the_metric() {
    use attune_core::Participant;

    let mut context = context();
    let now = t0();
    context.start(now).await.unwrap();
    context
        .record_sample(attention_sample("p-1", 1.0, now + Duration::seconds(1)))
        .await
        .unwrap();
    context
        .record_sample(attention_sample("p-2", 0.0, now + Duration::seconds(2)))
        .await
        .unwrap();

    // Only p-1 is still in the meeting
    let events = context
        .reconcile(
            &[Participant::connected("p-1")],
            now + Duration::seconds(3),
        )
        .unwrap();

    assert_eq!(events.len(), 1);
    match &events[0].event {
        SessionEvent::MetricUpdated { metric, .. } => {
            assert!((metric.value - 1.0).abs() < f64::EPSILON);
        }
        other => panic!("expected MetricUpdated, got {other:?}"),
    }
}

#[tokio::test]
async fn reconcile_with_unchanged_roster_emits_nothing() {
    use attune_core::Participant;

    let mut context = context();
    let now = t0();
    context.start(now).await.unwrap();
    context
        .record_sample(attention_sample("p-1", 0.5, now + Duration::seconds(1)))
        .await
        .unwrap();

    let events = context
        .reconcile(
            &[Participant::connected("p-1")],
            now + Duration::seconds(2),
        )
        .unwrap();
    assert!(events.is_empty());
}

// ==================== Orchestrator Tests ====================

fn orchestrator() -> Orchestrator {
    Orchestrator::new(
        Arc::new(RuleClassifier::default()),
        Arc::new(TemplateQuestionSource::new()),
        Arc::new(StaticDirectory::default()),
        MemoryStore::new(),
    )
}

#[tokio::test]
async fn orchestrator_runs_full_session_flow() {
    let orchestrator = orchestrator();
    let id = orchestrator
        .create_session(SessionConfig::default(), Some("Slide text".to_string()))
        .await
        .unwrap();

    assert_eq!(
        orchestrator.session_state(&id).await.unwrap(),
        SessionState::Created
    );

    orchestrator.start_session(&id).await.unwrap();
    let events = orchestrator
        .record_sample(
            &id,
            EngagementSample::new("p-1", Utc::now()).with_attention(0.8),
        )
        .await
        .unwrap();
    assert!(matches!(
        events[0].event,
        SessionEvent::MetricUpdated { .. }
    ));

    orchestrator.stop_session(&id).await.unwrap();
    assert_eq!(
        orchestrator.session_state(&id).await.unwrap(),
        SessionState::Stopped
    );
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let orchestrator = orchestrator();
    let result = orchestrator.start_session("missing").await;
    assert!(matches!(
        result,
        Err(attune_core::SessionError::NotFound(_))
    ));
}

#[tokio::test]
async fn invalid_config_is_rejected_at_creation() {
    let orchestrator = orchestrator();
    let config = SessionConfig {
        shrink_factor: 2.0,
        ..Default::default()
    };
    let result = orchestrator.create_session(config, None).await;
    assert!(result.is_err());
    assert_eq!(orchestrator.session_count().await, 0);
}

#[tokio::test]
async fn response_submission_feeds_the_control_loop() {
    use attune_core::ResponseSubmission;

    let orchestrator = orchestrator();
    let id = orchestrator
        .create_session(SessionConfig::default(), None)
        .await
        .unwrap();
    orchestrator.start_session(&id).await.unwrap();

    let events = orchestrator
        .submit_response(
            &id,
            ResponseSubmission {
                participant_id: "p-1".to_string(),
                question_id: "q-1".to_string(),
                response_text: "ownership".to_string(),
                response_time_ms: 2_000,
                is_correct: true,
            },
        )
        .await
        .unwrap();

    // A fast correct answer scores high
    match &events[0].event {
        SessionEvent::MetricUpdated { metric, .. } => {
            assert!(metric.value > 0.66, "got {}", metric.value);
        }
        other => panic!("expected MetricUpdated, got {other:?}"),
    }
}

#[tokio::test]
async fn sessions_are_independent() {
    let orchestrator = orchestrator();
    let first = orchestrator
        .create_session(SessionConfig::default(), None)
        .await
        .unwrap();
    let second = orchestrator
        .create_session(SessionConfig::default(), None)
        .await
        .unwrap();

    orchestrator.start_session(&first).await.unwrap();
    orchestrator.stop_session(&first).await.unwrap();

    // Stopping the first session leaves the second untouched
    orchestrator.start_session(&second).await.unwrap();
    assert_eq!(
        orchestrator.session_state(&second).await.unwrap(),
        SessionState::Active
    );
    assert_eq!(orchestrator.active_sessions().await, vec![second]);
}
