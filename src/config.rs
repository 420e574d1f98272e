//! Tunables, grouped into one `serde`-derived struct so a caller can load
//! them from disk or over the wire and this crate stays agnostic to
//! whatever configuration format the embedding application prefers.

use crate::messages::MemberId;
use std::time::Duration;

/// Timing knobs for the election FSM, stored as nanosecond fields so they
/// round-trip exactly through serialization regardless of the
/// `Duration` representation the embedding application favors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionConfig {
    /// How often `CANVASS` re-broadcasts `CanvassPosition` and
    /// `LEADER_READY` resends `NewLeadershipTerm` when a stale peer is
    /// spotted.
    pub status_interval_ns: u64,

    /// How often a leader in `LEADER_READY` broadcasts
    /// `NewLeadershipTerm`.
    pub leader_heartbeat_interval_ns: u64,

    /// Deadline for `CANVASS` (steady state), `CANDIDATE_BALLOT`, and
    /// `FOLLOWER_BALLOT`/`FOLLOWER_READY`.
    pub election_timeout_ns: u64,

    /// Deadline for `CANVASS` on the very first election after process
    /// start (`is_startup`), typically longer than `election_timeout_ns`
    /// to give a larger fraction of the cluster time to come up.
    pub startup_status_timeout_ns: u64,

    /// If set, the one member allowed to nominate itself without waiting
    /// for canvass consensus; every other member defers to it.
    pub appointed_leader_id: Option<MemberId>,
}

impl ElectionConfig {
    pub fn status_interval(&self) -> Duration {
        Duration::from_nanos(self.status_interval_ns)
    }

    pub fn leader_heartbeat_interval(&self) -> Duration {
        Duration::from_nanos(self.leader_heartbeat_interval_ns)
    }

    pub fn election_timeout(&self) -> Duration {
        Duration::from_nanos(self.election_timeout_ns)
    }

    pub fn startup_status_timeout(&self) -> Duration {
        Duration::from_nanos(self.startup_status_timeout_ns)
    }

    /// The canvass deadline appropriate for `is_startup`: the longer
    /// startup timeout on the first election, the regular election
    /// timeout on every subsequent one.
    pub fn canvass_deadline(&self, is_startup: bool) -> Duration {
        if is_startup {
            self.startup_status_timeout()
        } else {
            self.election_timeout()
        }
    }
}

impl Default for ElectionConfig {
    /// A few hundred milliseconds for the election timeout, with the
    /// heartbeat/status interval a small fraction of it.
    fn default() -> Self {
        ElectionConfig {
            status_interval_ns: Duration::from_millis(200).as_nanos() as u64,
            leader_heartbeat_interval_ns: Duration::from_millis(150).as_nanos() as u64,
            election_timeout_ns: Duration::from_millis(600).as_nanos() as u64,
            startup_status_timeout_ns: Duration::from_secs(5).as_nanos() as u64,
            appointed_leader_id: None,
        }
    }
}
