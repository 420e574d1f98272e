//! The consensus agent, consumed as a capability only. Owns the
//! long-lived log subscription, service plumbing, and role advertisement;
//! the election FSM drives it through one-shot transition actions and
//! otherwise leaves it alone.

use crate::messages::{LeadershipTermId, LogPosition, LogSessionId, Role};

/// An opaque handle to a log subscription created by the agent. The FSM
/// never inspects a subscription's contents -- it only threads the handle
/// it got back from `create_and_record_log_subscription_as_follower`
/// through to `await_image_and_create_follower_log_adapter` and to the
/// catch-up engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionHandle(pub u64);

/// A channel URI as consumed by the agent's subscription/destination
/// calls. Construction rules live in `channel.rs`; this crate treats the
/// value itself as opaque text once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelUri(pub String);

/// Capability the FSM depends on for everything outside the election
/// protocol proper: local log truncation, role advertisement, and
/// standing up the follower-side log plumbing.
pub trait ClusterAgent {
    /// Truncates/rolls back to a safe local position and returns it.
    /// Called exactly once, on non-startup entry to `INIT`.
    fn prepare_for_election(&mut self, log_position: LogPosition) -> LogPosition;

    /// Advertises the current role. Called on every `CANVASS` entry
    /// (demoted to follower) and on entering `NOMINATE` (candidate) and
    /// `LEADER_TRANSITION` (leader, via `become_leader`).
    fn set_role(&mut self, role: Role);

    /// Promotes this member locally and (re)publishes the log. Called
    /// once, from `LEADER_TRANSITION`.
    fn become_leader(&mut self);

    /// Identifier of the local log's archive recording, used for the
    /// real (non-placeholder) recording-log entry appended on becoming
    /// leader.
    fn log_recording_id(&self) -> i64;

    /// Creates the subscription a follower uses to replay/ingest the
    /// leader's log starting at `from_position`.
    fn create_and_record_log_subscription_as_follower(
        &mut self,
        channel: &ChannelUri,
        from_position: LogPosition,
    ) -> SubscriptionHandle;

    /// Blocks (cooperatively; must eventually complete or report failure)
    /// until the services behind `channel`/`session_id` are ready to
    /// accept the new term.
    fn await_services_ready(&mut self, channel: &ChannelUri, session_id: LogSessionId);

    /// Blocks until an image is available on `subscription` and wires up
    /// the follower-side log adapter from it.
    fn await_image_and_create_follower_log_adapter(
        &mut self,
        subscription: SubscriptionHandle,
        session_id: LogSessionId,
    );

    /// Adds the live log destination described by `channel` so this
    /// member starts receiving newly-appended entries. Used both by
    /// `FOLLOWER_TRANSITION` (immediately followed by
    /// `await_image_and_create_follower_log_adapter`) and by the
    /// completion of `FOLLOWER_CATCHUP`, which adds the destination
    /// without waiting for an image.
    fn add_live_log_destination(&mut self, channel: &ChannelUri);

    /// Drives one step of replaying the leader's log towards
    /// `target_position` while in `FOLLOWER_CATCHUP`. `Err` means the
    /// archive replay can not make further progress (e.g. the leader's
    /// recording has been truncated or purged past the position we need);
    /// the election treats this as fatal to the current attempt rather
    /// than retrying indefinitely.
    fn catchup_log_poll(&mut self, target_position: LogPosition) -> Result<(), String>;

    /// Refreshes the agent's view of member details (endpoints etc.)
    /// after a role or membership-relevant change.
    fn update_member_details(&mut self);

    /// Returns true once post-election plumbing (service startup,
    /// snapshot loading, whatever the agent needs) is complete. The FSM
    /// polls this from `LEADER_READY`/`FOLLOWER_READY` and closes once it
    /// returns true.
    fn election_complete(&mut self, now: std::time::Instant) -> bool;
}
