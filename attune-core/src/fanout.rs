//! Realtime fanout
//!
//! Delivers orchestrator-emitted events to every subscriber of a session in
//! log order. Each subscriber owns a bounded channel; a subscriber whose
//! buffer fills is dropped rather than blocking the publisher or receiving
//! stale data, and must resubscribe for a fresh snapshot.
//!
//! The registry lives inside the session's serialized execution context, so
//! subscribing and publishing never interleave: a new subscriber's snapshot
//! is atomic with respect to event emission and late joiners cannot observe
//! a causal gap.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::aggregator::{LevelCounts, SessionMetric};
use crate::events::{EventSeq, OrderedEvent};
use crate::session::SessionState;

/// Who is on the other end of a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriberRole {
    Instructor,
    Student,
}

/// Consistent view of a session handed to every new subscriber before any
/// live event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub state: SessionState,
    pub metric: Option<SessionMetric>,
    pub level_counts: LevelCounts,
    pub connected_participants: usize,
    /// Sequence number of the last event already emitted; live events
    /// continue from here
    pub last_seq: Option<EventSeq>,
}

/// What flows through a subscription channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FanoutMessage {
    Snapshot(SessionSnapshot),
    Event(OrderedEvent),
}

/// Receiving side of one subscription
#[derive(Debug)]
pub struct Subscription {
    pub id: String,
    pub role: SubscriberRole,
    pub rx: mpsc::Receiver<FanoutMessage>,
}

#[derive(Debug)]
struct Subscriber {
    id: String,
    role: SubscriberRole,
    tx: mpsc::Sender<FanoutMessage>,
}

/// Per-session registry of bounded subscriber channels
#[derive(Debug)]
pub struct SessionFanout {
    buffer: usize,
    subscribers: Vec<Subscriber>,
}

impl SessionFanout {
    pub fn new(buffer: usize) -> Self {
        Self {
            buffer,
            subscribers: Vec::new(),
        }
    }

    /// Register a subscriber; the snapshot is queued before anything else
    /// can be published to it
    pub fn subscribe(&mut self, role: SubscriberRole, snapshot: SessionSnapshot) -> Subscription {
        let (tx, rx) = mpsc::channel(self.buffer);
        let id = Uuid::new_v4().to_string();

        // The channel was just created with a non-zero capacity, so the
        // snapshot always fits.
        let _ = tx.try_send(FanoutMessage::Snapshot(snapshot));

        self.subscribers.push(Subscriber {
            id: id.clone(),
            role,
            tx,
        });
        tracing::debug!(subscriber_id = %id, ?role, "subscriber added");

        Subscription { id, role, rx }
    }

    /// Deliver an event to every subscriber, dropping any whose buffer is
    /// full or whose receiver is gone
    pub fn publish(&mut self, event: &OrderedEvent) {
        self.subscribers.retain(|subscriber| {
            match subscriber.tx.try_send(FanoutMessage::Event(event.clone())) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(
                        subscriber_id = %subscriber.id,
                        seq = event.seq,
                        "subscriber overflow, dropping"
                    );
                    false
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    tracing::debug!(subscriber_id = %subscriber.id, "subscriber gone");
                    false
                }
            }
        });
    }

    /// Close every subscriber channel (terminal state reached)
    pub fn close_all(&mut self) {
        self.subscribers.clear();
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
