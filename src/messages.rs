//! Wire-level vocabulary exchanged between election participants.
//!
//! Only the semantic fields of each message matter to this crate — actual
//! framing, retries below the transport's try-send boundary, and
//! encoding are the transport adapter's job. We still derive
//! `Serialize`/`Deserialize` on everything here so a caller's transport
//! can trivially hand these to whatever encoder it likes.

use std::collections::HashSet;

/// Uniquely identifies a member of the cluster. Assigned out of band;
/// this crate never allocates one itself.
pub type MemberId = i32;

/// A leadership epoch. Monotonically increasing and restored from
/// durable storage across restarts.
pub type LeadershipTermId = i64;

/// An offset into the replicated log.
pub type LogPosition = i64;

/// Identifies a single log subscription/session.
pub type LogSessionId = i32;

/// The role this member is currently advertising to the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Follower,
    Candidate,
    Leader,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvassPosition {
    pub log_leadership_term_id: LeadershipTermId,
    pub log_position: LogPosition,
    pub follower_id: MemberId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestVote {
    pub log_leadership_term_id: LeadershipTermId,
    pub log_position: LogPosition,
    pub candidate_term_id: LeadershipTermId,
    pub candidate_id: MemberId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub candidate_term_id: LeadershipTermId,
    pub log_leadership_term_id: LeadershipTermId,
    pub log_position: LogPosition,
    pub candidate_id: MemberId,
    pub follower_id: MemberId,
    pub vote_granted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLeadershipTerm {
    pub log_leadership_term_id: LeadershipTermId,
    pub log_position: LogPosition,
    pub leadership_term_id: LeadershipTermId,
    pub leader_id: MemberId,
    pub log_session_id: LogSessionId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendedPosition {
    pub leadership_term_id: LeadershipTermId,
    pub log_position: LogPosition,
    pub follower_id: MemberId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitPosition {
    pub leadership_term_id: LeadershipTermId,
    pub log_position: LogPosition,
    pub leader_id: MemberId,
}

/// All messages this crate may be asked to send or may receive.
///
/// Election messages are always addressed point to point — the FSM
/// already knows which peer a given `RequestVote`/`Vote`/etc. is destined
/// for, so the transport trait takes the destination member id as a
/// separate argument (see `transport.rs`) rather than embedding it in the
/// message itself except where the protocol's own fields already carry it
/// (`follower_id`, `candidate_id`, `leader_id`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    CanvassPosition(CanvassPosition),
    RequestVote(RequestVote),
    Vote(Vote),
    NewLeadershipTerm(NewLeadershipTerm),
    AppendedPosition(AppendedPosition),
    CommitPosition(CommitPosition),
}

/// A fixed cluster membership list as a set of ids, used only to size the
/// member table and to sanity check that an incoming message references a
/// known peer.
pub type Membership = HashSet<MemberId>;
