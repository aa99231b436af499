//! Participant roster
//!
//! Tracks which participants a session knows about and whether they are
//! currently connected. The roster is reconciled against an external
//! meeting-participant directory; participants that left feed `remove()` on
//! the aggregator so their stale scores stop contributing.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CollaboratorError;

/// Connection status of a participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

/// One participant in a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub status: ConnectionStatus,
}

impl Participant {
    pub fn connected(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
            status: ConnectionStatus::Connected,
        }
    }
}

/// External source of truth for who is in the meeting
#[async_trait]
pub trait ParticipantDirectory: Send + Sync {
    async fn fetch_participants(
        &self,
        meeting_id: &str,
    ) -> Result<Vec<Participant>, CollaboratorError>;
}

/// Per-session participant set
#[derive(Debug, Default)]
pub struct Roster {
    participants: HashMap<String, Participant>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a participant as connected, creating it if unknown
    pub fn mark_connected(&mut self, participant_id: &str) {
        self.participants
            .entry(participant_id.to_string())
            .and_modify(|p| p.status = ConnectionStatus::Connected)
            .or_insert_with(|| Participant::connected(participant_id));
    }

    pub fn mark_disconnected(&mut self, participant_id: &str) {
        if let Some(participant) = self.participants.get_mut(participant_id) {
            participant.status = ConnectionStatus::Disconnected;
        }
    }

    pub fn is_connected(&self, participant_id: &str) -> bool {
        self.participants
            .get(participant_id)
            .is_some_and(|p| p.status == ConnectionStatus::Connected)
    }

    pub fn connected_count(&self) -> usize {
        self.participants
            .values()
            .filter(|p| p.status == ConnectionStatus::Connected)
            .count()
    }

    /// Replace the connected set with the directory's view
    ///
    /// Returns the ids that were connected but are no longer present, so the
    /// caller can purge them from the aggregator.
    pub fn reconcile(&mut self, current: &[Participant]) -> Vec<String> {
        let mut departed = Vec::new();
        for (id, participant) in self.participants.iter_mut() {
            if participant.status == ConnectionStatus::Connected
                && !current.iter().any(|c| &c.id == id)
            {
                participant.status = ConnectionStatus::Disconnected;
                departed.push(id.clone());
            }
        }
        for participant in current {
            self.participants
                .entry(participant.id.clone())
                .and_modify(|p| {
                    p.status = ConnectionStatus::Connected;
                    if p.display_name.is_none() {
                        p.display_name = participant.display_name.clone();
                    }
                })
                .or_insert_with(|| Participant {
                    status: ConnectionStatus::Connected,
                    ..participant.clone()
                });
        }
        departed
    }
}

/// Directory backed by a fixed participant list, for tests and for sessions
/// without an external meeting
#[derive(Debug, Default)]
pub struct StaticDirectory {
    participants: Vec<Participant>,
}

impl StaticDirectory {
    pub fn new(participants: Vec<Participant>) -> Self {
        Self { participants }
    }
}

#[async_trait]
impl ParticipantDirectory for StaticDirectory {
    async fn fetch_participants(
        &self,
        _meeting_id: &str,
    ) -> Result<Vec<Participant>, CollaboratorError> {
        Ok(self.participants.clone())
    }
}
