//! Session events and the per-session event log

mod log;
mod types;

pub use log::EventLog;
pub use types::{EventSeq, OrderedEvent, SessionEvent};
