//! The recording/archive subsystem, consumed as a capability only. Owns
//! the durable append-only ledger of `(recordingId, termId, logPosition,
//! timestamp)` entries this crate appends to on every leadership
//! transition and on completing follower catch-up.

use crate::messages::{LeadershipTermId, LogPosition};
use std::time::SystemTime;

/// Identifies a single archived recording of the log. `None` marks an
/// intermediate term that was skipped over without ever becoming leader
/// (a placeholder entry).
pub type RecordingId = Option<i64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordingLogEntry {
    pub recording_id: RecordingId,
    pub term_id: LeadershipTermId,
    pub log_position: LogPosition,
    pub timestamp: SystemTime,
}

/// Capability the FSM depends on to make term transitions durable.
pub trait RecordingLog {
    /// Appends one entry. Must be durable by the time this returns -- the
    /// FSM relies on append-then-announce ordering and never retries a
    /// recording-log append.
    fn append(&mut self, entry: RecordingLogEntry);
}
