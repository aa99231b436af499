//! Per-session event log
//!
//! The log is owned by the session's serialized execution context, so it
//! needs no internal locking: there is exactly one writer, and sequence
//! numbers are assigned at append time, strictly increasing with no gaps.

use chrono::{DateTime, Utc};

use super::types::{EventSeq, OrderedEvent, SessionEvent};

/// Ordered record of every event a session has emitted
#[derive(Debug, Default)]
pub struct EventLog {
    entries: Vec<OrderedEvent>,
    next_seq: EventSeq,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp an event with the next sequence number and record it
    pub fn append(&mut self, event: SessionEvent, timestamp: DateTime<Utc>) -> OrderedEvent {
        let ordered = OrderedEvent {
            seq: self.next_seq,
            timestamp,
            event,
        };
        self.next_seq += 1;
        self.entries.push(ordered.clone());
        ordered
    }

    /// Sequence number of the most recent event, if any
    pub fn last_seq(&self) -> Option<EventSeq> {
        self.entries.last().map(|entry| entry.seq)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All events at or after the given sequence number
    pub fn events_from(&self, seq: EventSeq) -> impl Iterator<Item = &OrderedEvent> {
        self.entries.iter().filter(move |entry| entry.seq >= seq)
    }

    pub fn entries(&self) -> &[OrderedEvent] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paused(session_id: &str) -> SessionEvent {
        SessionEvent::SessionPaused {
            session_id: session_id.to_string(),
        }
    }

    #[test]
    fn append_assigns_sequence_numbers_from_zero() {
        let mut log = EventLog::new();
        let first = log.append(paused("s-1"), Utc::now());
        let second = log.append(paused("s-1"), Utc::now());
        assert_eq!(first.seq, 0);
        assert_eq!(second.seq, 1);
    }

    #[test]
    fn sequence_numbers_are_gap_free() {
        let mut log = EventLog::new();
        for _ in 0..50 {
            log.append(paused("s-1"), Utc::now());
        }
        for (index, entry) in log.entries().iter().enumerate() {
            assert_eq!(entry.seq, index as EventSeq);
        }
    }

    #[test]
    fn last_seq_tracks_the_newest_entry() {
        let mut log = EventLog::new();
        assert_eq!(log.last_seq(), None);
        log.append(paused("s-1"), Utc::now());
        log.append(paused("s-1"), Utc::now());
        assert_eq!(log.last_seq(), Some(1));
    }

    #[test]
    fn events_from_filters_by_sequence() {
        let mut log = EventLog::new();
        for _ in 0..5 {
            log.append(paused("s-1"), Utc::now());
        }
        let tail: Vec<_> = log.events_from(3).collect();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].seq, 3);
    }
}
