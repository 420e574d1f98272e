//! Log catch-up: replaying a leader's archived log range up to a target
//! position before a follower may participate in live replication.
//!
//! Ownership is exclusive to the FSM: it is constructed on entry to
//! `FOLLOWER_CATCHUP_TRANSITION` and released on exit from
//! `FOLLOWER_CATCHUP` or on `close`. No shared references -- `Election`
//! holds it as a plain `Option<LogCatchup>`.
//!
//! The actual replay mechanics live in the recording/archive subsystem
//! behind the `ClusterAgent` capability: this engine only remembers
//! *where it is replaying from* and *how far it needs to get*. Progress
//! itself is reported back into the owning `Election` through
//! `on_replay_new_leadership_term_event` as the archive yields term
//! boundaries, which is why `is_done` takes the election's current log
//! position as an argument rather than tracking a second copy of it
//! here.

use crate::agent::SubscriptionHandle;
use crate::messages::{LeadershipTermId, LogPosition, LogSessionId, MemberId};

pub struct LogCatchup {
    leader_id: MemberId,
    log_session_id: LogSessionId,
    leadership_term_id: LeadershipTermId,
    target_position: LogPosition,
    subscription: Option<SubscriptionHandle>,
}

impl LogCatchup {
    pub fn new(
        leader_id: MemberId,
        log_session_id: LogSessionId,
        leadership_term_id: LeadershipTermId,
        target_position: LogPosition,
    ) -> Self {
        LogCatchup {
            leader_id,
            log_session_id,
            leadership_term_id,
            target_position,
            subscription: None,
        }
    }

    pub fn leader_id(&self) -> MemberId {
        self.leader_id
    }

    pub fn log_session_id(&self) -> LogSessionId {
        self.log_session_id
    }

    pub fn leadership_term_id(&self) -> LeadershipTermId {
        self.leadership_term_id
    }

    pub fn target_position(&self) -> LogPosition {
        self.target_position
    }

    pub fn is_done(&self, current_log_position: LogPosition) -> bool {
        current_log_position >= self.target_position
    }

    /// Attaches the subscription created for this catch-up
    /// (`FOLLOWER_CATCHUP_TRANSITION`'s one-shot action).
    pub fn attach_subscription(&mut self, subscription: SubscriptionHandle) {
        self.subscription = Some(subscription);
    }

    pub fn subscription(&self) -> Option<SubscriptionHandle> {
        self.subscription
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_done_once_target_reached() {
        let catchup = LogCatchup::new(2, 42, 6, 1500);
        assert!(!catchup.is_done(1000));
        assert!(!catchup.is_done(1499));
        assert!(catchup.is_done(1500));
        assert!(catchup.is_done(1600));
    }

    #[test]
    fn subscription_starts_unattached() {
        let mut catchup = LogCatchup::new(2, 42, 6, 1500);
        assert!(catchup.subscription().is_none());
        catchup.attach_subscription(SubscriptionHandle(7));
        assert_eq!(catchup.subscription(), Some(SubscriptionHandle(7)));
    }
}
