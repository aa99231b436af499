//! WebSocket protocol message types
//!
//! Instructor and student clients share one protocol: the server pushes the
//! join snapshot and then the live event stream; clients push samples and
//! question responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use attune_core::{FanoutMessage, SessionEvent, SessionSnapshot};

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Raw engagement sample for one participant
    Sample {
        participant_id: String,
        #[serde(default)]
        attention: Option<f64>,
        #[serde(default)]
        response_latency_ms: Option<u32>,
        #[serde(default)]
        active: Option<bool>,
    },

    /// Answer to a delivered question
    Response {
        participant_id: String,
        question_id: String,
        response_text: String,
        response_time_ms: u32,
        is_correct: bool,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Session snapshot, always the first message after subscribing
    Snapshot { snapshot: SessionSnapshot },

    /// Live session event with its sequence number
    Event {
        seq: u64,
        timestamp: DateTime<Utc>,
        event: SessionEvent,
    },

    /// Error message
    Error { message: String, code: String },
}

/// Translate a fanout message into its wire form
pub fn fanout_to_server_message(message: FanoutMessage) -> ServerMessage {
    match message {
        FanoutMessage::Snapshot(snapshot) => ServerMessage::Snapshot { snapshot },
        FanoutMessage::Event(event) => ServerMessage::Event {
            seq: event.seq,
            timestamp: event.timestamp,
            event: event.event,
        },
    }
}
