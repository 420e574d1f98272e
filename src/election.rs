//! The election state machine itself: this is the heart of the crate, an
//! eleven-state FSM driven by a single cooperative `tick(now)` and by
//! inbound message callbacks.
//!
//! One struct holds all durable-ish election state; side effects (sends,
//! recording-log appends, role changes) happen as direct calls into the
//! injected collaborator traits rather than through a buffered
//! side-effect value, since every one of those calls is already
//! individually idempotent or at-least-once safe. The `on_*`/`tick_*`
//! methods below mirror the protocol's own state and message
//! vocabulary one for one.

use std::cmp::Ordering;
use std::time::Instant;

use crate::agent::ClusterAgent;
use crate::clock::Clock;
use crate::catchup::LogCatchup;
use crate::channel;
use crate::config::ElectionConfig;
use crate::errors::{Error, ErrorKind, Result};
use crate::mark_file::MarkFile;
use crate::member::{self, MemberTable, VoteState};
use crate::messages::{
    AppendedPosition, CanvassPosition, CommitPosition, LeadershipTermId, LogPosition,
    LogSessionId, MemberId, Message, NewLeadershipTerm, RequestVote, Role, Vote,
};
use crate::random::RandomSource;
use crate::recording_log::{RecordingLog, RecordingLogEntry};
use crate::state_counter::StateCounter;
use crate::transport::{Inbound, Transport};

/// The election's current position in the FSM. Codes are the stable part
/// of the "Election State" observability contract and must never be
/// renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Init,
    Canvass,
    Nominate,
    CandidateBallot,
    FollowerBallot,
    LeaderTransition,
    LeaderReady,
    FollowerCatchupTransition,
    FollowerCatchup,
    FollowerTransition,
    FollowerReady,
}

impl State {
    pub fn code(self) -> u32 {
        match self {
            State::Init => 0,
            State::Canvass => 1,
            State::Nominate => 2,
            State::CandidateBallot => 3,
            State::FollowerBallot => 4,
            State::LeaderTransition => 5,
            State::LeaderReady => 6,
            State::FollowerCatchupTransition => 7,
            State::FollowerCatchup => 8,
            State::FollowerTransition => 9,
            State::FollowerReady => 10,
        }
    }
}

/// Owns one member's participation in one election. Created at cluster
/// start or when a follower detects a higher-term leader or a leader
/// loses quorum; destroyed once `electionComplete` is acknowledged from
/// `LEADER_READY` or `FOLLOWER_READY`.
pub struct Election {
    state: State,
    is_startup: bool,

    leadership_term_id: LeadershipTermId,
    log_leadership_term_id: LeadershipTermId,
    log_position: LogPosition,
    candidate_term_id: Option<LeadershipTermId>,
    leader_member: Option<MemberId>,
    log_session_id: LogSessionId,

    time_of_last_state_change: Instant,
    time_of_last_update: Instant,
    nomination_deadline: Option<Instant>,
    next_broadcast: Instant,

    members: MemberTable,
    catchup: Option<LogCatchup>,
    config: ElectionConfig,

    base_log_channel: String,
    member_endpoint: String,

    /// A plain counter, not part of the stable state-counter contract, so
    /// a test harness can assert on dropped votes instead of only
    /// inferring them from an unchanged vote tally.
    stale_votes_dropped: u64,

    closed: bool,

    transport: Box<dyn Transport>,
    agent: Box<dyn ClusterAgent>,
    mark_file: Box<dyn MarkFile>,
    recording_log: Box<dyn RecordingLog>,
    state_counter: Box<dyn StateCounter>,
    random: Box<dyn RandomSource>,
    clock: Box<dyn Clock>,
}

impl Election {
    /// `membership` must include `self_id`. `log_leadership_term_id` and
    /// `log_position` describe this node's durable log state as of
    /// process start; `leadership_term_id` is the last term this node
    /// considered current (restored from durable storage, monotonic
    /// across restarts).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        self_id: MemberId,
        membership: impl IntoIterator<Item = MemberId>,
        is_startup: bool,
        leadership_term_id: LeadershipTermId,
        log_leadership_term_id: LeadershipTermId,
        log_position: LogPosition,
        base_log_channel: impl Into<String>,
        member_endpoint: impl Into<String>,
        config: ElectionConfig,
        transport: Box<dyn Transport>,
        agent: Box<dyn ClusterAgent>,
        mark_file: Box<dyn MarkFile>,
        recording_log: Box<dyn RecordingLog>,
        mut state_counter: Box<dyn StateCounter>,
        random: Box<dyn RandomSource>,
        clock: Box<dyn Clock>,
        now: Instant,
    ) -> Self {
        let mut members = MemberTable::new(membership, self_id);
        {
            let self_member = members.self_member_mut();
            self_member.leadership_term_id = log_leadership_term_id;
            self_member.log_position = log_position;
            self_member.has_reported = true;
        }

        state_counter.set(State::Init.code());

        Election {
            state: State::Init,
            is_startup,
            leadership_term_id,
            log_leadership_term_id,
            log_position,
            candidate_term_id: None,
            leader_member: None,
            log_session_id: 0,
            time_of_last_state_change: now,
            time_of_last_update: now,
            nomination_deadline: None,
            next_broadcast: now,
            members,
            catchup: None,
            config,
            base_log_channel: base_log_channel.into(),
            member_endpoint: member_endpoint.into(),
            stale_votes_dropped: 0,
            closed: false,
            transport,
            agent,
            mark_file,
            recording_log,
            state_counter,
            random,
            clock,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn leadership_term_id(&self) -> LeadershipTermId {
        self.leadership_term_id
    }

    pub fn log_position(&self) -> LogPosition {
        self.log_position
    }

    pub fn candidate_term_id(&self) -> Option<LeadershipTermId> {
        self.candidate_term_id
    }

    pub fn leader_member(&self) -> Option<MemberId> {
        self.leader_member
    }

    pub fn stale_votes_dropped(&self) -> u64 {
        self.stale_votes_dropped
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Releases the catch-up engine (if any) and marks this election
    /// closed. Idempotent: safe to call repeatedly, from any state.
    pub fn close(&mut self) {
        self.catchup = None;
        self.closed = true;
    }

    /// Drives the FSM forward by one step. Polls the transport first,
    /// then runs the current state's tick action. A no-op once
    /// `is_closed()`.
    pub fn tick(&mut self, now: Instant) -> Result<()> {
        if self.closed {
            return Ok(());
        }

        self.poll_transport(now)?;

        // A single external tick cascades through every transition that is
        // immediately ready to fire -- e.g. a solo cluster runs
        // INIT -> LEADER_TRANSITION -> LEADER_READY without waiting for a
        // separate call -- and only stops once a state's action leaves the
        // state unchanged (typically because it is now waiting on a timer
        // or on further messages).
        loop {
            let before = self.state;

            match self.state {
                State::Init => self.tick_init(now)?,
                State::Canvass => self.tick_canvass(now)?,
                State::Nominate => self.tick_nominate(now)?,
                State::CandidateBallot => self.tick_candidate_ballot(now)?,
                State::FollowerBallot => self.tick_follower_ballot(now)?,
                State::LeaderTransition => self.tick_leader_transition(now)?,
                State::LeaderReady => self.tick_leader_ready(now)?,
                State::FollowerCatchupTransition => self.tick_follower_catchup_transition(now)?,
                State::FollowerCatchup => self.tick_follower_catchup(now)?,
                State::FollowerTransition => self.tick_follower_transition(now)?,
                State::FollowerReady => self.tick_follower_ready(now)?,
            }

            if self.state == before {
                break;
            }
        }

        self.time_of_last_update = now;
        Ok(())
    }

    /// Called by the archive/recording subsystem while replaying a term
    /// boundary during `FOLLOWER_CATCHUP`. Advances our durable log view
    /// and records the term, the same way `LEADER_TRANSITION` records
    /// intermediate terms it skipped over -- here the terms were skipped
    /// by whoever was leader before us, and we are simply catching our
    /// own bookkeeping up to the archive.
    pub fn on_replay_new_leadership_term_event(
        &mut self,
        term: LeadershipTermId,
        position: LogPosition,
    ) {
        self.log_leadership_term_id = term;
        self.log_position = position;

        self.recording_log.append(RecordingLogEntry {
            recording_id: None,
            term_id: term,
            log_position: position,
            timestamp: self.clock.now(),
        });
    }

    // ---- transport plumbing -------------------------------------------------

    fn poll_transport(&mut self, now: Instant) -> Result<()> {
        let inbound = self.transport.poll_inbound();
        for msg in inbound {
            self.dispatch(msg, now)?;
        }
        Ok(())
    }

    fn dispatch(&mut self, inbound: Inbound, now: Instant) -> Result<()> {
        match inbound.message {
            Message::CanvassPosition(m) => self.on_canvass_position(m, now),
            Message::RequestVote(m) => self.on_request_vote(m, now),
            Message::Vote(m) => self.on_vote(m),
            Message::NewLeadershipTerm(m) => self.on_new_leadership_term(m, now)?,
            Message::AppendedPosition(m) => self.on_appended_position(m),
            Message::CommitPosition(m) => self.on_commit_position(m),
        }
        Ok(())
    }

    // ---- message handlers ---------------------------------------------------

    fn on_canvass_position(&mut self, m: CanvassPosition, now: Instant) {
        if let Some(member) = self.members.get_mut(m.follower_id) {
            member.leadership_term_id = m.log_leadership_term_id;
            member.log_position = m.log_position;
            member.has_reported = true;
        }

        if self.state == State::LeaderReady && m.log_leadership_term_id < self.leadership_term_id {
            self.send_new_leadership_term(m.follower_id);
        }

        if self.state != State::Canvass && m.log_leadership_term_id > self.leadership_term_id {
            self.transition(State::Canvass, now);
        }
    }

    fn on_request_vote(&mut self, m: RequestVote, now: Instant) {
        log::debug!(
            "received request_vote from member {} for term {}",
            m.candidate_id,
            m.candidate_term_id
        );

        let already_committed_past_this_term = m.candidate_term_id <= self.leadership_term_id
            || self
                .candidate_term_id
                .map_or(false, |c| m.candidate_term_id <= c);

        if already_committed_past_this_term {
            self.send_vote(&m, false);
            return;
        }

        let ours_fresher = member::compare_log(
            self.log_leadership_term_id,
            self.log_position,
            m.log_leadership_term_id,
            m.log_position,
        ) == Ordering::Greater;

        // Persist the candidate term before granting, before transitioning
        // into a ballot state, and before replying at all in the
        // fresher-log case -- otherwise a crash between the reply and the
        // mark-file write could let us vote twice for the same term.
        self.mark_file.set_candidate_term_id(m.candidate_term_id);
        self.candidate_term_id = Some(m.candidate_term_id);

        if ours_fresher {
            self.send_vote(&m, false);
            self.transition(State::Canvass, now);
        } else {
            self.send_vote(&m, true);
            log::info!("granted vote to member {} for term {}", m.candidate_id, m.candidate_term_id);
            self.transition(State::FollowerBallot, now);
        }
    }

    fn on_vote(&mut self, m: Vote) {
        let is_our_candidacy =
            self.state == State::CandidateBallot && self.candidate_term_id == Some(m.candidate_term_id);
        let addressed_to_us = m.candidate_id == self.members.self_id();

        if !is_our_candidacy || !addressed_to_us {
            self.stale_votes_dropped += 1;
            log::debug!(
                "dropped stale vote from member {} for term {} (candidacy={:?}, addressed_to_us={})",
                m.follower_id,
                m.candidate_term_id,
                self.candidate_term_id,
                addressed_to_us
            );
            return;
        }

        if let Some(member) = self.members.get_mut(m.follower_id) {
            member.candidate_term_id = m.candidate_term_id;
            member.leadership_term_id = m.log_leadership_term_id;
            member.log_position = m.log_position;
            member.vote = if m.vote_granted {
                VoteState::Granted
            } else {
                VoteState::Denied
            };
        }
    }

    fn on_new_leadership_term(&mut self, m: NewLeadershipTerm, now: Instant) -> Result<()> {
        let in_matching_ballot = matches!(self.state, State::FollowerBallot | State::CandidateBallot)
            && self.candidate_term_id == Some(m.leadership_term_id);

        if in_matching_ballot {
            self.adopt_leader(&m);
            if m.log_position > self.log_position {
                self.begin_catchup(&m, now);
            } else {
                self.transition(State::FollowerTransition, now);
            }
            return Ok(());
        }

        let position_differs = m.log_leadership_term_id != self.log_leadership_term_id
            || m.log_position != self.log_position;

        if position_differs {
            if self.log_leadership_term_id < m.log_leadership_term_id {
                self.adopt_leader(&m);
                self.begin_catchup(&m, now);
            } else if self.log_leadership_term_id > m.log_leadership_term_id {
                // Recovering from this divergence means truncating our own
                // log, which belongs to the recording/archive subsystem --
                // this crate has no handle on it here. Surfacing it as a
                // protocol violation beats silently ignoring a leader whose
                // log is behind ours.
                return Err(Error::from(ErrorKind::ProtocolViolation(format!(
                    "observed NewLeadershipTerm at log term {} from member {} while our own log term {} is newer",
                    m.log_leadership_term_id, m.leader_id, self.log_leadership_term_id
                ))));
            }
            // Equal log term, differing position, outside any matching
            // ballot: nothing in the base protocol defines an action
            // here, so it is treated as a stale/duplicate announcement.
        }

        Ok(())
    }

    fn on_appended_position(&mut self, m: AppendedPosition) {
        if let Some(member) = self.members.get_mut(m.follower_id) {
            member.leadership_term_id = m.leadership_term_id;
            member.log_position = m.log_position;
            member.has_reported = true;
        }
    }

    fn on_commit_position(&mut self, m: CommitPosition) {
        // Kept as a documented no-op: starting catch-up here would race
        // the independent path already triggered by `onNewLeadershipTerm`
        // and duplicate it.
        if m.leadership_term_id > self.leadership_term_id {
            log::debug!(
                "observed CommitPosition at term {} from leader {} while we are at term {}; not triggering catch-up from here",
                m.leadership_term_id,
                m.leader_id,
                self.leadership_term_id
            );
        }
    }

    fn adopt_leader(&mut self, m: &NewLeadershipTerm) {
        // A leader is never accepted before its term is durable, even on
        // the divergence path where we never cast an explicit vote for
        // it.
        self.mark_file.set_candidate_term_id(m.leadership_term_id);
        self.leadership_term_id = m.leadership_term_id;
        self.leader_member = Some(m.leader_id);
        self.log_session_id = m.log_session_id;
        self.candidate_term_id = None;
        log::info!(
            "adopted member {} as leader for term {}",
            m.leader_id,
            m.leadership_term_id
        );
    }

    fn begin_catchup(&mut self, m: &NewLeadershipTerm, now: Instant) {
        self.catchup = Some(LogCatchup::new(
            m.leader_id,
            m.log_session_id,
            m.leadership_term_id,
            m.log_position,
        ));
        self.transition(State::FollowerCatchupTransition, now);
    }

    fn send_vote(&mut self, req: &RequestVote, granted: bool) {
        let vote = Vote {
            candidate_term_id: req.candidate_term_id,
            log_leadership_term_id: self.log_leadership_term_id,
            log_position: self.log_position,
            candidate_id: req.candidate_id,
            follower_id: self.members.self_id(),
            vote_granted: granted,
        };
        self.transport.send(req.candidate_id, Message::Vote(vote));
    }

    fn send_new_leadership_term(&mut self, to: MemberId) {
        let msg = NewLeadershipTerm {
            log_leadership_term_id: self.log_leadership_term_id,
            log_position: self.log_position,
            leadership_term_id: self.leadership_term_id,
            leader_id: self.members.self_id(),
            log_session_id: self.log_session_id,
        };
        self.transport.send(to, Message::NewLeadershipTerm(msg));
    }

    fn broadcast_canvass_position(&mut self) {
        let msg = CanvassPosition {
            log_leadership_term_id: self.log_leadership_term_id,
            log_position: self.log_position,
            follower_id: self.members.self_id(),
        };
        let targets: Vec<MemberId> = self.members.others().map(|m| m.id).collect();
        self.transport.broadcast(&targets, Message::CanvassPosition(msg));
    }

    // ---- tick actions per state ---------------------------------------------

    fn tick_init(&mut self, now: Instant) -> Result<()> {
        if !self.is_startup {
            self.log_position = self.agent.prepare_for_election(self.log_position);
        }

        if self.members.len() == 1 {
            self.candidate_term_id = Some(self.leadership_term_id + 1);
            self.transition(State::LeaderTransition, now);
            return Ok(());
        }

        if self.config.appointed_leader_id == Some(self.members.self_id()) {
            self.nomination_deadline = Some(now);
            self.transition(State::Nominate, now);
            return Ok(());
        }

        self.candidate_term_id = self.mark_file.candidate_term_id();
        self.transition(State::Canvass, now);
        Ok(())
    }

    fn tick_canvass(&mut self, now: Instant) -> Result<()> {
        if now >= self.next_broadcast {
            self.broadcast_canvass_position();
            self.next_broadcast = now + self.config.status_interval();
        }

        if self.config.appointed_leader_id.is_some() {
            // Deferring to the appointed leader: wait for its
            // NewLeadershipTerm rather than self-nominating.
            return Ok(());
        }

        let deadline = self.config.canvass_deadline(self.is_startup);
        let timed_out = now >= self.time_of_last_state_change + deadline;

        let should_nominate = self.members.is_unanimous_candidate()
            || (timed_out && self.members.is_quorum_candidate());

        if should_nominate {
            let jitter = self.random.jitter(self.config.status_interval());
            self.nomination_deadline = Some(now + jitter);
            self.transition(State::Nominate, now);
        }

        Ok(())
    }

    fn tick_nominate(&mut self, now: Instant) -> Result<()> {
        let deadline = self
            .nomination_deadline
            .ok_or_else(|| Error::from(ErrorKind::ProtocolViolation(
                "NOMINATE entered without a nomination deadline".into(),
            )))?;

        if now < deadline {
            return Ok(());
        }

        // Consult the mark-file rather than the in-memory candidate_term_id
        // (cleared on every CANVASS entry) so a repeated nomination after a
        // lost ballot still strictly increases the term, even across a
        // restart between the two attempts.
        let last_attempted = self.mark_file.candidate_term_id().unwrap_or(0);
        let next_term = (last_attempted + 1).max(self.leadership_term_id + 1);
        self.candidate_term_id = Some(next_term);

        self.members.reset_peers_for_candidacy();
        {
            let self_member = self.members.self_member_mut();
            self_member.candidate_term_id = next_term;
            self_member.vote = VoteState::Granted;
            self_member.is_ballot_sent = true;
        }

        self.mark_file.set_candidate_term_id(next_term);
        self.agent.set_role(Role::Candidate);
        log::info!("nominating self for term {}", next_term);

        self.transition(State::CandidateBallot, now);
        Ok(())
    }

    fn tick_candidate_ballot(&mut self, now: Instant) -> Result<()> {
        let term = self.candidate_term_id.ok_or_else(|| {
            Error::from(ErrorKind::ProtocolViolation(
                "CANDIDATE_BALLOT entered without a candidate_term_id".into(),
            ))
        })?;

        let pending: Vec<MemberId> = self
            .members
            .others()
            .filter(|m| !m.is_ballot_sent)
            .map(|m| m.id)
            .collect();

        for id in pending {
            let req = RequestVote {
                log_leadership_term_id: self.log_leadership_term_id,
                log_position: self.log_position,
                candidate_term_id: term,
                candidate_id: self.members.self_id(),
            };
            if self.transport.send(id, Message::RequestVote(req)) {
                if let Some(m) = self.members.get_mut(id) {
                    m.is_ballot_sent = true;
                }
            }
        }

        if self.members.has_won_vote_on_full_count(term) {
            log::info!("won vote on full count for term {}", term);
            self.transition(State::LeaderTransition, now);
            return Ok(());
        }

        if now >= self.time_of_last_state_change + self.config.election_timeout() {
            if self.members.has_majority_vote(term) {
                log::info!("won majority vote for term {} at ballot timeout", term);
                self.transition(State::LeaderTransition, now);
            } else {
                log::info!("ballot timed out without a majority for term {}", term);
                self.transition(State::Canvass, now);
            }
        }

        Ok(())
    }

    fn tick_follower_ballot(&mut self, now: Instant) -> Result<()> {
        if now >= self.time_of_last_state_change + self.config.election_timeout() {
            self.transition(State::Canvass, now);
        }
        Ok(())
    }

    fn tick_leader_transition(&mut self, now: Instant) -> Result<()> {
        let new_term = self.candidate_term_id.ok_or_else(|| {
            Error::from(ErrorKind::ProtocolViolation(
                "LEADER_TRANSITION entered without a candidate_term_id".into(),
            ))
        })?;

        // Every intermediate term is recorded with a NULL recording id
        // before the real record for the term we are actually becoming
        // leader of, so a later reader of the recording log can see that
        // those terms passed without anyone completing an election.
        for term in (self.leadership_term_id + 1)..new_term {
            self.recording_log.append(RecordingLogEntry {
                recording_id: None,
                term_id: term,
                log_position: self.log_position,
                timestamp: self.clock.now(),
            });
        }

        self.leadership_term_id = new_term;
        self.candidate_term_id = None;

        self.agent.become_leader();
        self.agent.set_role(Role::Leader);
        self.agent.update_member_details();

        self.recording_log.append(RecordingLogEntry {
            recording_id: Some(self.agent.log_recording_id()),
            term_id: self.leadership_term_id,
            log_position: self.log_position,
            timestamp: self.clock.now(),
        });

        self.mark_file.clear_candidate_term_id();

        for m in self.members.others_mut() {
            m.leadership_term_id = 0;
            m.log_position = 0;
            m.has_reported = false;
        }
        {
            let term = self.leadership_term_id;
            let pos = self.log_position;
            let self_member = self.members.self_member_mut();
            self_member.leadership_term_id = term;
            self_member.log_position = pos;
            self_member.has_reported = true;
        }

        self.leader_member = Some(self.members.self_id());
        self.next_broadcast = now;

        log::info!("became leader for term {}", self.leadership_term_id);

        self.transition(State::LeaderReady, now);
        Ok(())
    }

    fn tick_leader_ready(&mut self, now: Instant) -> Result<()> {
        if now >= self.next_broadcast {
            let targets: Vec<MemberId> = self.members.others().map(|m| m.id).collect();
            for id in targets {
                self.send_new_leadership_term(id);
            }
            self.next_broadcast = now + self.config.leader_heartbeat_interval();
        }

        if self
            .members
            .have_voters_reached_position(self.log_position, self.leadership_term_id)
            && self.agent.election_complete(now)
        {
            self.close();
        }

        Ok(())
    }

    fn tick_follower_catchup_transition(&mut self, now: Instant) -> Result<()> {
        let session_id = self
            .catchup
            .as_ref()
            .ok_or_else(|| {
                Error::from(ErrorKind::ProtocolViolation(
                    "FOLLOWER_CATCHUP_TRANSITION entered without a LogCatchup".into(),
                ))
            })?
            .log_session_id();

        let subscription_channel =
            channel::follower_subscription_channel(&self.base_log_channel, session_id);
        let subscription = self
            .agent
            .create_and_record_log_subscription_as_follower(&subscription_channel, self.log_position);
        self.agent.await_services_ready(&subscription_channel, session_id);

        if let Some(c) = self.catchup.as_mut() {
            c.attach_subscription(subscription);
        }

        self.transition(State::FollowerCatchup, now);
        Ok(())
    }

    fn tick_follower_catchup(&mut self, now: Instant) -> Result<()> {
        let target = {
            let catchup = self.catchup.as_ref().ok_or_else(|| {
                Error::from(ErrorKind::ProtocolViolation(
                    "FOLLOWER_CATCHUP entered without a LogCatchup".into(),
                ))
            })?;

            if !catchup.is_done(self.log_position) {
                Some(catchup.target_position())
            } else {
                None
            }
        };

        if let Some(target_position) = target {
            self.agent.catchup_log_poll(target_position).map_err(|msg| {
                Error::from(ErrorKind::CatchupFailed(msg))
            })?;
            return Ok(());
        }

        let (term, target_position) = {
            let c = self.catchup.as_ref().unwrap();
            (c.leadership_term_id(), c.target_position())
        };

        self.log_position = target_position;
        self.log_leadership_term_id = term;

        let destination = channel::live_destination_channel(&self.base_log_channel, &self.member_endpoint);
        self.agent.add_live_log_destination(&destination);

        self.recording_log.append(RecordingLogEntry {
            recording_id: Some(self.agent.log_recording_id()),
            term_id: term,
            log_position: target_position,
            timestamp: self.clock.now(),
        });

        log::info!("caught up to position {} at term {}", target_position, term);

        self.transition(State::FollowerReady, now);
        Ok(())
    }

    fn tick_follower_transition(&mut self, now: Instant) -> Result<()> {
        let subscription_channel =
            channel::follower_subscription_channel(&self.base_log_channel, self.log_session_id);
        let subscription = self
            .agent
            .create_and_record_log_subscription_as_follower(&subscription_channel, self.log_position);
        self.agent
            .await_services_ready(&subscription_channel, self.log_session_id);

        let destination = channel::live_destination_channel(&self.base_log_channel, &self.member_endpoint);
        self.agent.add_live_log_destination(&destination);
        self.agent
            .await_image_and_create_follower_log_adapter(subscription, self.log_session_id);

        self.recording_log.append(RecordingLogEntry {
            recording_id: Some(self.agent.log_recording_id()),
            term_id: self.leadership_term_id,
            log_position: self.log_position,
            timestamp: self.clock.now(),
        });

        self.transition(State::FollowerReady, now);
        Ok(())
    }

    fn tick_follower_ready(&mut self, now: Instant) -> Result<()> {
        let sent = match self.leader_member {
            Some(id) => self.transport.send(
                id,
                Message::AppendedPosition(AppendedPosition {
                    leadership_term_id: self.leadership_term_id,
                    log_position: self.log_position,
                    follower_id: self.members.self_id(),
                }),
            ),
            None => false,
        };

        if sent {
            if self.agent.election_complete(now) {
                self.close();
            }
            return Ok(());
        }

        if now >= self.time_of_last_state_change + self.config.election_timeout() {
            self.transition(State::Canvass, now);
        }

        Ok(())
    }

    // ---- transition machinery ------------------------------------------------

    fn transition(&mut self, to: State, now: Instant) {
        self.run_exit_action();

        log::info!("{:?} -> {:?}", self.state, to);

        self.state = to;
        self.time_of_last_state_change = now;
        self.state_counter.set(to.code());

        if to == State::Canvass {
            self.enter_canvass(now);
        }
    }

    /// The only two states with non-trivial exit bodies: `CANVASS`
    /// clears `is_startup`, `FOLLOWER_CATCHUP` releases the catch-up
    /// engine.
    fn run_exit_action(&mut self) {
        match self.state {
            State::Canvass => {
                self.is_startup = false;
            }
            State::FollowerCatchup => {
                self.catchup = None;
            }
            _ => {}
        }
    }

    /// `CANVASS`'s entry action: reset peers' election-scoped fields, copy
    /// self's latest log view into the member table, and demote role to
    /// follower.
    fn enter_canvass(&mut self, now: Instant) {
        self.members.reset_all_election_fields();
        self.candidate_term_id = None;
        self.leader_member = None;
        self.next_broadcast = now;
        self.agent.set_role(Role::Follower);
        self.agent.update_member_details();

        let term = self.log_leadership_term_id;
        let pos = self.log_position;
        let self_member = self.members.self_member_mut();
        self_member.leadership_term_id = term;
        self_member.log_position = pos;
        self_member.has_reported = true;
    }
}
