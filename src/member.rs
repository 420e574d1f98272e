//! Per-peer bookkeeping and the quorum/freshness predicates the FSM
//! consults to decide whether to nominate, grant a vote, or declare
//! victory.
//!
//! Because this table is read and mutated from nearly every FSM state
//! rather than owned by leader-only code, it is kept as one small,
//! fixed-size arena alive for the whole election, indexed by position
//! rather than linked by id — membership is static for the lifetime of
//! an `Election`.

use crate::messages::{LeadershipTermId, LogPosition, MemberId};
use std::cmp::Ordering;

/// A vote this member recorded for some other candidate, as last reported
/// over the wire or defaulted at reset time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteState {
    Granted,
    Denied,
    Unknown,
}

impl Default for VoteState {
    fn default() -> Self {
        VoteState::Unknown
    }
}

/// This node's view of one peer (or of itself — self is also a row in the
/// table, since quorum math counts self among `members` when sizing a
/// majority).
#[derive(Debug, Clone, Copy)]
pub struct Member {
    pub id: MemberId,

    /// Last term this peer reported to us, via `CanvassPosition`,
    /// `RequestVote`, `Vote`, `NewLeadershipTerm`, or `AppendedPosition`.
    pub leadership_term_id: LeadershipTermId,

    /// Last log position this peer reported.
    pub log_position: LogPosition,

    /// Term in which this peer last solicited a vote from us (or, for our
    /// own row, the term we are currently canvassing/canvassed in).
    pub candidate_term_id: LeadershipTermId,

    /// How this peer voted the last time we asked, for the in-flight
    /// candidacy.
    pub vote: VoteState,

    /// Whether we have successfully handed a `RequestVote` to the
    /// transport for this peer during the current candidacy.
    pub is_ballot_sent: bool,

    /// Whether we have heard from this peer at all during the current
    /// canvass/candidacy round. Distinguishes "reported a position of
    /// zero" from "never reported", which `leadership_term_id`/
    /// `log_position` alone can't (both default to zero).
    pub has_reported: bool,
}

impl Member {
    fn new(id: MemberId) -> Self {
        Member {
            id,
            leadership_term_id: 0,
            log_position: 0,
            candidate_term_id: 0,
            vote: VoteState::Unknown,
            is_ballot_sent: false,
            has_reported: false,
        }
    }

    /// Clears every election-scoped field. Run on every member as part of
    /// a `CANVASS` transition and again when a new candidacy begins in
    /// `NOMINATE`.
    fn reset_election_fields(&mut self) {
        self.candidate_term_id = 0;
        self.vote = VoteState::Unknown;
        self.is_ballot_sent = false;
        self.has_reported = false;
    }
}

/// Returns the sign of the lexicographic comparison `(a_term, a_pos)` vs
/// `(b_term, b_pos)`: term first, then position. A tie (`Ordering::Equal`)
/// is a legitimate outcome and permits voting.
pub fn compare_log(
    a_term: LeadershipTermId,
    a_pos: LogPosition,
    b_term: LeadershipTermId,
    b_pos: LogPosition,
) -> Ordering {
    a_term.cmp(&b_term).then(a_pos.cmp(&b_pos))
}

/// The fixed-size arena of member rows for one election, indexed by
/// position rather than by id (peers are cluster-static for the
/// lifetime of an election).
pub struct MemberTable {
    members: Vec<Member>,
    self_index: usize,
}

impl MemberTable {
    /// `ids` must include `self_id` exactly once; order is otherwise
    /// insignificant. Panics if `self_id` is missing — that would mean
    /// this node isn't part of its own cluster membership, which the
    /// election has no sane way to proceed from.
    pub fn new(ids: impl IntoIterator<Item = MemberId>, self_id: MemberId) -> Self {
        let members: Vec<Member> = ids.into_iter().map(Member::new).collect();
        let self_index = members
            .iter()
            .position(|m| m.id == self_id)
            .expect("self_id must be present in the cluster membership");

        MemberTable {
            members,
            self_index,
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn self_id(&self) -> MemberId {
        self.members[self.self_index].id
    }

    pub fn self_member(&self) -> &Member {
        &self.members[self.self_index]
    }

    pub fn self_member_mut(&mut self) -> &mut Member {
        &mut self.members[self.self_index]
    }

    pub fn get(&self, id: MemberId) -> Option<&Member> {
        self.members.iter().find(|m| m.id == id)
    }

    pub fn get_mut(&mut self, id: MemberId) -> Option<&mut Member> {
        self.members.iter_mut().find(|m| m.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Member> {
        self.members.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Member> {
        self.members.iter_mut()
    }

    /// Every member other than self.
    pub fn others(&self) -> impl Iterator<Item = &Member> {
        let self_id = self.self_id();
        self.members.iter().filter(move |m| m.id != self_id)
    }

    pub fn others_mut(&mut self) -> impl Iterator<Item = &mut Member> {
        let self_index = self.self_index;
        self.members
            .iter_mut()
            .enumerate()
            .filter_map(move |(i, m)| if i == self_index { None } else { Some(m) })
    }

    /// Resets every member's election-scoped fields. Called on the
    /// `CANVASS` entry action -- see `Election::enter_canvass`.
    pub fn reset_all_election_fields(&mut self) {
        for m in self.members.iter_mut() {
            m.reset_election_fields();
        }
    }

    /// Resets only the peers' election-scoped fields ahead of a fresh
    /// candidacy (`NOMINATE`'s "mark all members as becoming candidate").
    pub fn reset_peers_for_candidacy(&mut self) {
        let self_index = self.self_index;
        for (i, m) in self.members.iter_mut().enumerate() {
            if i != self_index {
                m.reset_election_fields();
            }
        }
    }

    /// More than half of all members (self included), the minimum count
    /// of granted votes or reported positions needed to call something a
    /// majority.
    pub fn quorum_size(&self) -> usize {
        (self.members.len() / 2) + 1
    }

    /// True iff every peer other than self has *reported* a
    /// `(leadership_term_id, log_position)` not strictly ahead of ours.
    /// A peer that has never reported does not count, regardless of what
    /// its row defaults to. Enables the canvass fast path.
    pub fn is_unanimous_candidate(&self) -> bool {
        let (self_term, self_pos) = {
            let s = self.self_member();
            (s.leadership_term_id, s.log_position)
        };

        self.others().all(|m| {
            m.has_reported
                && compare_log(m.leadership_term_id, m.log_position, self_term, self_pos)
                    != Ordering::Greater
        })
    }

    /// True iff a majority of members (self included) have reported and
    /// none of the reporters is strictly ahead of self. Enables the
    /// canvass slow path after the deadline.
    pub fn is_quorum_candidate(&self) -> bool {
        let (self_term, self_pos) = {
            let s = self.self_member();
            (s.leadership_term_id, s.log_position)
        };

        let mut reported = 1; // self
        for m in self.others() {
            if m.has_reported {
                if compare_log(m.leadership_term_id, m.log_position, self_term, self_pos)
                    == Ordering::Greater
                {
                    return false;
                }
                reported += 1;
            }
        }

        reported >= self.quorum_size()
    }

    /// True iff every member has a recorded vote for `term` and all are
    /// granted (including self, who always grants itself a vote upon
    /// nominating). Fast path out of `CANDIDATE_BALLOT`.
    pub fn has_won_vote_on_full_count(&self, term: LeadershipTermId) -> bool {
        self.members.iter().all(|m| {
            m.candidate_term_id == term && m.vote == VoteState::Granted
        })
    }

    /// True iff strictly more than half of all members voted granted for
    /// `term`. Slow path after election timeout.
    pub fn has_majority_vote(&self, term: LeadershipTermId) -> bool {
        let granted = self
            .members
            .iter()
            .filter(|m| m.candidate_term_id == term && m.vote == VoteState::Granted)
            .count();

        granted >= self.quorum_size()
    }

    /// True iff a majority of members report `log_position >= p` at
    /// `leadership_term_id >= term`. Gates the leader from `LEADER_READY`
    /// to completion.
    pub fn have_voters_reached_position(&self, p: LogPosition, term: LeadershipTermId) -> bool {
        let reached = self
            .members
            .iter()
            .filter(|m| m.leadership_term_id >= term && m.log_position >= p)
            .count();

        reached >= self.quorum_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(ids: &[MemberId], self_id: MemberId) -> MemberTable {
        MemberTable::new(ids.iter().copied(), self_id)
    }

    #[test]
    fn compare_log_orders_term_before_position() {
        assert_eq!(compare_log(5, 1000, 5, 1000), Ordering::Equal);
        assert_eq!(compare_log(5, 1200, 5, 1000), Ordering::Greater);
        assert_eq!(compare_log(4, 9999, 5, 0), Ordering::Less);
    }

    #[test]
    fn solo_cluster_is_trivially_unanimous() {
        let mut t = table(&[1], 1);
        t.self_member_mut().log_position = 100;
        assert!(t.is_unanimous_candidate());
    }

    #[test]
    fn unanimous_requires_no_peer_strictly_ahead() {
        let mut t = table(&[1, 2, 3], 1);
        t.self_member_mut().leadership_term_id = 5;
        t.self_member_mut().log_position = 1000;
        t.get_mut(2).unwrap().leadership_term_id = 5;
        t.get_mut(2).unwrap().log_position = 1000;
        t.get_mut(2).unwrap().has_reported = true;
        t.get_mut(3).unwrap().leadership_term_id = 5;
        t.get_mut(3).unwrap().log_position = 1000;
        t.get_mut(3).unwrap().has_reported = true;
        assert!(t.is_unanimous_candidate());

        t.get_mut(3).unwrap().log_position = 1200;
        assert!(!t.is_unanimous_candidate());
    }

    #[test]
    fn unanimous_requires_every_peer_to_have_actually_reported() {
        let mut t = table(&[1, 2, 3], 1);
        t.self_member_mut().leadership_term_id = 5;
        t.self_member_mut().log_position = 1000;
        t.get_mut(2).unwrap().leadership_term_id = 5;
        t.get_mut(2).unwrap().log_position = 1000;
        t.get_mut(2).unwrap().has_reported = true;
        // member 3 never reported -- its default (0, 0) would trivially
        // look "not ahead", but that must not count as unanimous.
        assert!(!t.is_unanimous_candidate());
    }

    #[test]
    fn quorum_size_rounds_up() {
        assert_eq!(table(&[1], 1).quorum_size(), 1);
        assert_eq!(table(&[1, 2], 1).quorum_size(), 2);
        assert_eq!(table(&[1, 2, 3], 1).quorum_size(), 2);
        assert_eq!(table(&[1, 2, 3, 4], 1).quorum_size(), 3);
    }

    #[test]
    fn won_vote_on_full_count_requires_every_member_granted() {
        let mut t = table(&[1, 2, 3], 1);
        for m in t.iter_mut() {
            m.candidate_term_id = 6;
            m.vote = VoteState::Granted;
        }
        assert!(t.has_won_vote_on_full_count(6));

        t.get_mut(3).unwrap().vote = VoteState::Unknown;
        assert!(!t.has_won_vote_on_full_count(6));
    }

    #[test]
    fn majority_vote_tolerates_one_missing_or_denied() {
        let mut t = table(&[1, 2, 3], 1);
        t.get_mut(1).unwrap().candidate_term_id = 6;
        t.get_mut(1).unwrap().vote = VoteState::Granted;
        t.get_mut(2).unwrap().candidate_term_id = 6;
        t.get_mut(2).unwrap().vote = VoteState::Granted;
        // 3 never responded.
        assert!(t.has_majority_vote(6));
        assert!(!t.has_won_vote_on_full_count(6));
    }

    #[test]
    fn have_voters_reached_position_counts_self() {
        let mut t = table(&[1, 2, 3], 1);
        t.self_member_mut().leadership_term_id = 6;
        t.self_member_mut().log_position = 1500;
        t.get_mut(2).unwrap().leadership_term_id = 6;
        t.get_mut(2).unwrap().log_position = 1500;
        assert!(t.have_voters_reached_position(1500, 6));
    }
}
