//! Per-session execution context
//!
//! A SessionContext owns everything mutable about one session: lifecycle
//! state, the aggregator map, the controller counters, the question pool,
//! the roster, the event log, and the fanout registry. The orchestrator
//! reaches it only through a per-session mutex, so every operation here runs
//! one at a time in submission order — the single enforced lock boundary per
//! session.
//!
//! Operation bodies keep a strict shape: validate the transition, run every
//! collaborator call that can fail, and only then mutate state and append to
//! the log. A failed store or generator call therefore leaves no partial log
//! entry and no partial broadcast behind.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::aggregator::{SessionAggregator, SessionMetric};
use crate::classifier::{EngagementClassifier, EngagementSample};
use crate::config::SessionConfig;
use crate::controller::{DeliveryController, TriggerReason};
use crate::error::SessionError;
use crate::events::{EventLog, OrderedEvent, SessionEvent};
use crate::fanout::{SessionFanout, SessionSnapshot, SubscriberRole, Subscription};
use crate::questions::{QuestionPool, QuestionSource};
use crate::roster::{Participant, Roster};
use crate::store::{SessionRecord, Store};

use super::state::SessionState;

pub struct SessionContext {
    id: String,
    state: SessionState,
    created_at: DateTime<Utc>,
    config: SessionConfig,
    classifier: Arc<dyn EngagementClassifier>,
    question_source: Arc<dyn QuestionSource>,
    store: Arc<dyn Store>,
    aggregator: SessionAggregator,
    controller: DeliveryController,
    roster: Roster,
    pool: QuestionPool,
    log: EventLog,
    fanout: SessionFanout,
    /// Most recent session metric; superseded values are discarded
    last_metric: Option<SessionMetric>,
}

impl SessionContext {
    pub fn new(
        id: impl Into<String>,
        config: SessionConfig,
        slide_text: Option<String>,
        classifier: Arc<dyn EngagementClassifier>,
        question_source: Arc<dyn QuestionSource>,
        store: Arc<dyn Store>,
    ) -> Self {
        let id = id.into();
        let aggregator = SessionAggregator::new(
            id.clone(),
            config.participant_weights.clone(),
            config.hysteresis,
        );
        let controller = DeliveryController::new(&config);
        let fanout = SessionFanout::new(config.fanout_buffer);
        Self {
            id,
            state: SessionState::Created,
            created_at: Utc::now(),
            config,
            classifier,
            question_source,
            store,
            aggregator,
            controller,
            roster: Roster::new(),
            pool: QuestionPool::new(slide_text),
            log: EventLog::new(),
            fanout,
            last_metric: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn meeting_id(&self) -> Option<&str> {
        self.config.meeting_id.as_deref()
    }

    pub fn subscriber_count(&self) -> usize {
        self.fanout.subscriber_count()
    }

    pub fn event_log(&self) -> &EventLog {
        &self.log
    }

    /// Consistent view for late joiners and the REST state endpoint
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id.clone(),
            state: self.state,
            metric: self.last_metric.clone(),
            level_counts: self.aggregator.level_counts(),
            connected_participants: self.roster.connected_count(),
            last_seq: self.log.last_seq(),
        }
    }

    // ==================== Lifecycle ====================

    pub async fn start(&mut self, now: DateTime<Utc>) -> Result<OrderedEvent, SessionError> {
        if self.state != SessionState::Created {
            return Err(self.invalid("start"));
        }
        self.persist(SessionState::Active).await?;

        self.state = SessionState::Active;
        self.controller.arm(now);
        tracing::info!(session_id = %self.id, "session started");
        Ok(self.emit(
            SessionEvent::SessionStarted {
                session_id: self.id.clone(),
                connected_participants: self.roster.connected_count(),
            },
            now,
        ))
    }

    pub async fn pause(&mut self, now: DateTime<Utc>) -> Result<OrderedEvent, SessionError> {
        if self.state != SessionState::Active {
            return Err(self.invalid("pause"));
        }
        self.persist(SessionState::Paused).await?;

        self.state = SessionState::Paused;
        tracing::info!(session_id = %self.id, "session paused");
        Ok(self.emit(
            SessionEvent::SessionPaused {
                session_id: self.id.clone(),
            },
            now,
        ))
    }

    pub async fn resume(&mut self, now: DateTime<Utc>) -> Result<OrderedEvent, SessionError> {
        if self.state != SessionState::Paused {
            return Err(self.invalid("resume"));
        }
        self.persist(SessionState::Active).await?;

        self.state = SessionState::Active;
        // Time spent paused does not count against the delivery schedule
        self.controller.arm(now);
        tracing::info!(session_id = %self.id, "session resumed");
        Ok(self.emit(
            SessionEvent::SessionResumed {
                session_id: self.id.clone(),
            },
            now,
        ))
    }

    /// Stop the session and close every subscriber channel after the
    /// terminal event has gone out
    pub async fn stop(&mut self, now: DateTime<Utc>) -> Result<OrderedEvent, SessionError> {
        if !matches!(self.state, SessionState::Active | SessionState::Paused) {
            return Err(self.invalid("stop"));
        }
        self.persist(SessionState::Stopped).await?;

        self.state = SessionState::Stopped;
        let event = self.emit(
            SessionEvent::SessionStopped {
                session_id: self.id.clone(),
            },
            now,
        );
        self.fanout.close_all();
        tracing::info!(session_id = %self.id, "session stopped");
        Ok(event)
    }

    // ==================== Control loop ====================

    /// Ingest one engagement sample: classify, aggregate, evaluate, and
    /// deliver if the policy fires
    ///
    /// The sample's own timestamp is the policy clock, so replaying a
    /// recorded stream reproduces the same decisions.
    pub async fn record_sample(
        &mut self,
        sample: EngagementSample,
    ) -> Result<Vec<OrderedEvent>, SessionError> {
        if !self.state.accepts_samples() {
            return Err(self.invalid("record_sample"));
        }
        let now = sample.timestamp;

        self.roster.mark_connected(&sample.participant_id);
        let prior = self.aggregator.latest(&sample.participant_id);
        let score = self.classifier.classify(&sample, prior)?;
        let metric = self.aggregator.update(score);
        self.last_metric = Some(metric.clone());

        let decision = self.controller.evaluate(&metric, now);
        // Resolve the question before appending anything, so a generator or
        // store failure leaves the log untouched.
        let delivery = match decision.reason {
            Some(reason) => Some(self.resolve_delivery(reason).await?),
            None => None,
        };

        let mut events = vec![self.emit(
            SessionEvent::MetricUpdated {
                session_id: self.id.clone(),
                metric,
            },
            now,
        )];
        if let Some(delivery) = delivery {
            events.push(self.emit(delivery, now));
        }
        Ok(events)
    }

    /// Instructor-forced delivery, independent of the schedule
    pub async fn manual_override(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<OrderedEvent, SessionError> {
        if self.state != SessionState::Active {
            return Err(self.invalid("manual_override"));
        }

        let decision = self.controller.manual_override(now);
        let reason = decision
            .reason
            .unwrap_or(TriggerReason::ManualOverride);
        let delivery = self.resolve_delivery(reason).await?;
        Ok(self.emit(delivery, now))
    }

    /// Fire the schedule if the adaptive interval has elapsed
    ///
    /// Driven by the server's per-session tick while the session is Active.
    /// Returns no events when there is nothing to do; never an error on a
    /// tick that raced a pause or stop.
    pub async fn evaluate_schedule(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<Vec<OrderedEvent>, SessionError> {
        if self.state != SessionState::Active {
            return Ok(Vec::new());
        }
        let Some(metric) = self.last_metric.clone() else {
            // Nothing scored yet; the schedule waits for the first sample
            return Ok(Vec::new());
        };

        let decision = self.controller.evaluate(&metric, now);
        match decision.reason {
            Some(reason) => {
                let delivery = self.resolve_delivery(reason).await?;
                Ok(vec![self.emit(delivery, now)])
            }
            None => Ok(Vec::new()),
        }
    }

    /// Apply the directory's view of who is still in the meeting
    ///
    /// Departed participants stop contributing to the metric immediately; a
    /// changed metric is broadcast, an unchanged roster emits nothing.
    pub fn reconcile(
        &mut self,
        current: &[Participant],
        now: DateTime<Utc>,
    ) -> Result<Vec<OrderedEvent>, SessionError> {
        if !matches!(self.state, SessionState::Active | SessionState::Paused) {
            return Err(self.invalid("reconcile"));
        }

        let departed = self.roster.reconcile(current);
        if departed.is_empty() {
            return Ok(Vec::new());
        }
        for participant_id in &departed {
            self.aggregator.remove(participant_id);
        }
        tracing::debug!(
            session_id = %self.id,
            departed = departed.len(),
            "participants left the meeting"
        );

        let metric = self.aggregator.recompute(now);
        self.last_metric = Some(metric.clone());
        Ok(vec![self.emit(
            SessionEvent::MetricUpdated {
                session_id: self.id.clone(),
                metric,
            },
            now,
        )])
    }

    // ==================== Fanout ====================

    /// Register a subscriber; its snapshot is queued atomically with respect
    /// to event emission, so it never observes a causal gap
    pub fn subscribe(&mut self, role: SubscriberRole) -> Result<Subscription, SessionError> {
        if self.state.is_terminal() {
            return Err(self.invalid("subscribe"));
        }
        let snapshot = self.snapshot();
        Ok(self.fanout.subscribe(role, snapshot))
    }

    // ==================== Internals ====================

    /// Pick the next question, or downgrade the trigger to a starved no-op
    async fn resolve_delivery(
        &mut self,
        reason: TriggerReason,
    ) -> Result<SessionEvent, SessionError> {
        match self.pool.take(self.question_source.as_ref()).await? {
            Some(question) => {
                self.store
                    .save_question(&self.id, question.clone())
                    .await?;
                tracing::info!(
                    session_id = %self.id,
                    question_id = %question.id,
                    ?reason,
                    "question delivered"
                );
                Ok(SessionEvent::QuestionDelivered {
                    session_id: self.id.clone(),
                    question,
                    reason,
                })
            }
            None => {
                tracing::warn!(session_id = %self.id, ?reason, "delivery starved");
                Ok(SessionEvent::DeliveryStarved {
                    session_id: self.id.clone(),
                    reason,
                })
            }
        }
    }

    /// Append to the log and broadcast, in that order
    fn emit(&mut self, event: SessionEvent, now: DateTime<Utc>) -> OrderedEvent {
        let ordered = self.log.append(event, now);
        self.fanout.publish(&ordered);
        ordered
    }

    async fn persist(&self, next: SessionState) -> Result<(), SessionError> {
        self.store
            .save_session(SessionRecord {
                id: self.id.clone(),
                state: next.as_str().to_string(),
                created_at: self.created_at,
                config: self.config.clone(),
            })
            .await?;
        Ok(())
    }

    fn invalid(&self, operation: &str) -> SessionError {
        SessionError::InvalidTransition {
            operation: operation.to_string(),
            state: self.state.to_string(),
        }
    }
}
