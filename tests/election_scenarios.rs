//! End-to-end scenario tests driving a single `Election` instance through
//! concrete message sequences, with every external collaborator replaced
//! by a small in-memory fake. Fakes are shared with the test via
//! `Rc<RefCell<_>>` so assertions can inspect what the FSM sent/recorded
//! after the fact.

extern crate cluster_election;

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant, SystemTime};

use cluster_election::{
    AppendedPosition, CanvassPosition, ChannelUri, ClusterAgent, Election, ElectionConfig,
    FixedClock, FixedRandomSource, Inbound, LeadershipTermId, LogPosition, LogSessionId,
    MarkFile, MemberId, Message, NewLeadershipTerm, RecordingLog, RecordingLogEntry, RequestVote,
    Role, State, StateCounter, SubscriptionHandle, Transport, Vote,
};

#[derive(Default)]
struct TransportState {
    sent: Vec<(MemberId, Message)>,
    inbound: Vec<Inbound>,
}

struct SharedTransport(Rc<RefCell<TransportState>>);

impl Transport for SharedTransport {
    fn send(&mut self, to: MemberId, message: Message) -> bool {
        self.0.borrow_mut().sent.push((to, message));
        true
    }

    fn poll_inbound(&mut self) -> Vec<Inbound> {
        std::mem::take(&mut self.0.borrow_mut().inbound)
    }
}

#[derive(Default)]
struct AgentState {
    role: Option<Role>,
    became_leader: bool,
    live_destinations: Vec<ChannelUri>,
    election_complete: bool,
}

struct SharedAgent(Rc<RefCell<AgentState>>);

impl ClusterAgent for SharedAgent {
    fn prepare_for_election(&mut self, log_position: LogPosition) -> LogPosition {
        log_position
    }

    fn set_role(&mut self, role: Role) {
        self.0.borrow_mut().role = Some(role);
    }

    fn become_leader(&mut self) {
        self.0.borrow_mut().became_leader = true;
    }

    fn log_recording_id(&self) -> i64 {
        900
    }

    fn create_and_record_log_subscription_as_follower(
        &mut self,
        _channel: &ChannelUri,
        _from_position: LogPosition,
    ) -> SubscriptionHandle {
        SubscriptionHandle(1)
    }

    fn await_services_ready(&mut self, _channel: &ChannelUri, _session_id: LogSessionId) {}

    fn await_image_and_create_follower_log_adapter(
        &mut self,
        _subscription: SubscriptionHandle,
        _session_id: LogSessionId,
    ) {
    }

    fn add_live_log_destination(&mut self, channel: &ChannelUri) {
        self.0.borrow_mut().live_destinations.push(channel.clone());
    }

    fn catchup_log_poll(&mut self, _target_position: LogPosition) -> Result<(), String> {
        Ok(())
    }

    fn update_member_details(&mut self) {}

    fn election_complete(&mut self, _now: Instant) -> bool {
        self.0.borrow().election_complete
    }
}

#[derive(Default)]
struct FakeMarkFile {
    term: Option<LeadershipTermId>,
}

impl MarkFile for FakeMarkFile {
    fn candidate_term_id(&self) -> Option<LeadershipTermId> {
        self.term
    }

    fn set_candidate_term_id(&mut self, term: LeadershipTermId) {
        self.term = Some(term);
    }

    fn clear_candidate_term_id(&mut self) {
        self.term = None;
    }
}

#[derive(Default)]
struct RecordingLogState {
    entries: Vec<RecordingLogEntry>,
}

struct SharedRecordingLog(Rc<RefCell<RecordingLogState>>);

impl RecordingLog for SharedRecordingLog {
    fn append(&mut self, entry: RecordingLogEntry) {
        self.0.borrow_mut().entries.push(entry);
    }
}

#[derive(Default)]
struct FakeStateCounter {
    code: u32,
}

impl StateCounter for FakeStateCounter {
    fn set(&mut self, code: u32) {
        self.code = code;
    }

    fn get(&self) -> u32 {
        self.code
    }
}

struct Harness {
    election: Election,
    transport: Rc<RefCell<TransportState>>,
    agent: Rc<RefCell<AgentState>>,
    recording_log: Rc<RefCell<RecordingLogState>>,
}

impl Harness {
    fn sent_to(&self, to: MemberId) -> Vec<Message> {
        self.transport
            .borrow()
            .sent
            .iter()
            .filter(|(id, _)| *id == to)
            .map(|(_, m)| *m)
            .collect()
    }

    fn push_inbound(&self, from: MemberId, message: Message) {
        self.transport
            .borrow_mut()
            .inbound
            .push(Inbound { from, message });
    }

    fn recorded_terms(&self) -> Vec<(Option<i64>, LeadershipTermId)> {
        self.recording_log
            .borrow()
            .entries
            .iter()
            .map(|e| (e.recording_id, e.term_id))
            .collect()
    }
}

#[allow(clippy::too_many_arguments)]
fn harness(
    self_id: MemberId,
    members: &[MemberId],
    is_startup: bool,
    leadership_term_id: LeadershipTermId,
    log_leadership_term_id: LeadershipTermId,
    log_position: LogPosition,
    config: ElectionConfig,
    now: Instant,
) -> Harness {
    let transport_state = Rc::new(RefCell::new(TransportState::default()));
    let agent_state = Rc::new(RefCell::new(AgentState {
        election_complete: true,
        ..Default::default()
    }));
    let recording_log_state = Rc::new(RefCell::new(RecordingLogState::default()));

    let election = Election::new(
        self_id,
        members.iter().copied(),
        is_startup,
        leadership_term_id,
        log_leadership_term_id,
        log_position,
        "aeron:udp|endpoint=127.0.0.1:9000",
        "127.0.0.1:9000",
        config,
        Box::new(SharedTransport(transport_state.clone())),
        Box::new(SharedAgent(agent_state.clone())),
        Box::new(FakeMarkFile::default()),
        Box::new(SharedRecordingLog(recording_log_state.clone())),
        Box::new(FakeStateCounter::default()),
        Box::new(FixedRandomSource(0)),
        Box::new(FixedClock(SystemTime::UNIX_EPOCH)),
        now,
    );

    Harness {
        election,
        transport: transport_state,
        agent: agent_state,
        recording_log: recording_log_state,
    }
}

fn fast_config() -> ElectionConfig {
    ElectionConfig {
        status_interval_ns: Duration::from_millis(1).as_nanos() as u64,
        leader_heartbeat_interval_ns: Duration::from_millis(1).as_nanos() as u64,
        election_timeout_ns: Duration::from_millis(5).as_nanos() as u64,
        startup_status_timeout_ns: Duration::from_millis(5).as_nanos() as u64,
        appointed_leader_id: None,
    }
}

// Scenario 1: solo cluster.
#[test]
fn solo_cluster_becomes_leader_on_first_tick() {
    let now = Instant::now();
    let mut h = harness(1, &[1], true, 0, 0, 100, fast_config(), now);

    h.election.tick(now).unwrap();

    assert_eq!(h.election.state(), State::LeaderReady);
    assert_eq!(h.election.leadership_term_id(), 1);
    assert_eq!(h.election.candidate_term_id(), None);
    assert_eq!(h.election.leader_member(), Some(1));
    assert_eq!(
        h.recorded_terms(),
        vec![(Some(900), 1)],
        "the real recording-log entry should carry the agent's recording id, not a placeholder"
    );
    assert!(h.agent.borrow().became_leader);
}

// Scenario 2: three-node unanimous canvass.
#[test]
fn three_node_unanimous_canvass_elects_candidate_and_wins_on_full_count() {
    let now = Instant::now();
    let mut h = harness(1, &[1, 2, 3], false, 5, 5, 1000, fast_config(), now);

    // Everyone, including self, is already at (5, 1000): tick once to
    // seed self's own row, then report B and C at the same position.
    h.election.tick(now).unwrap();
    assert_eq!(h.election.state(), State::Canvass);

    h.push_inbound(2, Message::CanvassPosition(CanvassPosition {
        log_leadership_term_id: 5,
        log_position: 1000,
        follower_id: 2,
    }));
    h.push_inbound(3, Message::CanvassPosition(CanvassPosition {
        log_leadership_term_id: 5,
        log_position: 1000,
        follower_id: 3,
    }));

    h.election.tick(now).unwrap();
    assert_eq!(h.election.state(), State::Nominate);

    let deadline = now + Duration::from_millis(2);
    h.election.tick(deadline).unwrap();
    assert_eq!(h.election.state(), State::CandidateBallot);
    let term = h.election.candidate_term_id().unwrap();
    assert_eq!(term, 6);

    let sent_to_b = h.sent_to(2);
    assert!(matches!(sent_to_b.last(), Some(Message::RequestVote(_))));

    h.push_inbound(2, Message::Vote(Vote {
        candidate_term_id: term,
        log_leadership_term_id: 5,
        log_position: 1000,
        candidate_id: 1,
        follower_id: 2,
        vote_granted: true,
    }));
    h.push_inbound(3, Message::Vote(Vote {
        candidate_term_id: term,
        log_leadership_term_id: 5,
        log_position: 1000,
        candidate_id: 1,
        follower_id: 3,
        vote_granted: true,
    }));

    h.election.tick(deadline).unwrap();

    assert_eq!(h.election.state(), State::LeaderReady);
    assert_eq!(h.election.leadership_term_id(), 6);
}

// Scenario 3 & 4: a fresher candidate is granted a vote; a staler one is
// denied and pushes the voter back into CANVASS.
#[test]
fn fresher_candidate_is_granted_vote_and_staler_one_is_denied() {
    let now = Instant::now();

    let mut granter = harness(1, &[1, 2, 3], false, 5, 5, 1000, fast_config(), now);
    granter.election.tick(now).unwrap();
    granter.push_inbound(2, Message::RequestVote(RequestVote {
        log_leadership_term_id: 5,
        log_position: 1200,
        candidate_term_id: 6,
        candidate_id: 2,
    }));
    granter.election.tick(now).unwrap();

    assert_eq!(granter.election.state(), State::FollowerBallot);
    let reply = granter.sent_to(2);
    match reply.last() {
        Some(Message::Vote(v)) => assert!(v.vote_granted),
        other => panic!("expected a granted Vote, got {:?}", other),
    }

    let mut denier = harness(1, &[1, 2, 3], false, 5, 5, 1500, fast_config(), now);
    denier.election.tick(now).unwrap();
    denier.push_inbound(2, Message::RequestVote(RequestVote {
        log_leadership_term_id: 5,
        log_position: 1000,
        candidate_term_id: 6,
        candidate_id: 2,
    }));
    denier.election.tick(now).unwrap();

    assert_eq!(denier.election.state(), State::Canvass);
    let reply = denier.sent_to(2);
    match reply.last() {
        Some(Message::Vote(v)) => assert!(!v.vote_granted),
        other => panic!("expected a denied Vote, got {:?}", other),
    }
}

// Scenario 5: follower catch-up.
#[test]
fn follower_catches_up_to_leader_log_position_and_reports_appended() {
    let now = Instant::now();
    let mut h = harness(1, &[1, 2, 3], false, 5, 5, 1000, fast_config(), now);

    h.election.tick(now).unwrap();
    h.push_inbound(2, Message::RequestVote(RequestVote {
        log_leadership_term_id: 5,
        log_position: 1000,
        candidate_term_id: 6,
        candidate_id: 2,
    }));
    h.election.tick(now).unwrap();
    assert_eq!(h.election.state(), State::FollowerBallot);

    h.push_inbound(2, Message::NewLeadershipTerm(NewLeadershipTerm {
        log_leadership_term_id: 5,
        log_position: 1500,
        leadership_term_id: 6,
        leader_id: 2,
        log_session_id: 42,
    }));
    h.election.tick(now).unwrap();

    assert_eq!(h.election.state(), State::FollowerCatchupTransition);

    h.election.tick(now).unwrap();
    assert_eq!(h.election.state(), State::FollowerCatchup);

    // Catch-up reports done once the archive replay reaches the target.
    h.election.on_replay_new_leadership_term_event(5, 1500);
    h.election.tick(now).unwrap();

    assert_eq!(h.election.state(), State::FollowerReady);
    assert_eq!(h.election.log_position(), 1500);

    let destinations = h.agent.borrow().live_destinations.clone();
    assert_eq!(
        destinations.last(),
        Some(&ChannelUri("aeron:udp|endpoint=127.0.0.1:9000".to_string())),
        "the live destination channel must keep the scheme prefix intact, not fold it into a bogus key=value pair"
    );

    h.election.tick(now).unwrap();
    let sent = h.sent_to(2);
    match sent.last() {
        Some(Message::AppendedPosition(AppendedPosition { leadership_term_id, log_position, follower_id })) => {
            assert_eq!(*leadership_term_id, 6);
            assert_eq!(*log_position, 1500);
            assert_eq!(*follower_id, 1);
        }
        other => panic!("expected AppendedPosition, got {:?}", other),
    }
}

// Scenario 6: ballot timeout with majority but not full count.
#[test]
fn ballot_timeout_with_majority_wins_without_full_count() {
    let now = Instant::now();
    let mut h = harness(1, &[1, 2, 3], false, 5, 5, 1000, fast_config(), now);

    h.election.tick(now).unwrap();
    h.push_inbound(2, Message::CanvassPosition(CanvassPosition {
        log_leadership_term_id: 5,
        log_position: 1000,
        follower_id: 2,
    }));
    h.push_inbound(3, Message::CanvassPosition(CanvassPosition {
        log_leadership_term_id: 5,
        log_position: 1000,
        follower_id: 3,
    }));
    h.election.tick(now).unwrap();
    assert_eq!(h.election.state(), State::Nominate);

    let nominated = now + Duration::from_millis(2);
    h.election.tick(nominated).unwrap();
    assert_eq!(h.election.state(), State::CandidateBallot);
    let term = h.election.candidate_term_id().unwrap();

    h.push_inbound(2, Message::Vote(Vote {
        candidate_term_id: term,
        log_leadership_term_id: 5,
        log_position: 1000,
        candidate_id: 1,
        follower_id: 2,
        vote_granted: true,
    }));
    // Member 3 never responds.

    let past_timeout = nominated + Duration::from_millis(10);
    h.election.tick(past_timeout).unwrap();

    assert_eq!(h.election.state(), State::LeaderTransition);
    h.election.tick(past_timeout).unwrap();
    assert_eq!(h.election.state(), State::LeaderReady);
}

#[test]
fn stale_vote_outside_any_matching_candidacy_is_dropped_and_counted() {
    let now = Instant::now();
    let mut h = harness(1, &[1, 2, 3], false, 5, 5, 1000, fast_config(), now);
    h.election.tick(now).unwrap();

    assert_eq!(h.election.stale_votes_dropped(), 0);

    h.push_inbound(2, Message::Vote(Vote {
        candidate_term_id: 99,
        log_leadership_term_id: 5,
        log_position: 1000,
        candidate_id: 1,
        follower_id: 2,
        vote_granted: true,
    }));
    h.election.tick(now).unwrap();

    assert_eq!(h.election.stale_votes_dropped(), 1);
}

#[test]
fn close_is_idempotent_and_freezes_further_ticks() {
    let now = Instant::now();
    let mut h = harness(1, &[1, 2, 3], false, 5, 5, 1000, fast_config(), now);

    h.election.close();
    assert!(h.election.is_closed());
    h.election.close();
    assert!(h.election.is_closed());

    h.election.tick(now).unwrap();
    assert_eq!(h.election.state(), State::Init);
}

#[test]
fn leader_transition_records_placeholder_entries_for_skipped_terms() {
    let now = Instant::now();
    let mut h = harness(1, &[1, 2, 3], false, 5, 5, 1000, fast_config(), now);

    // Round one: nominate to term 6, only self votes, ballot times out
    // without a majority and falls back to CANVASS. The next nomination
    // must still move strictly past term 6.
    h.election.tick(now).unwrap();
    h.push_inbound(2, Message::CanvassPosition(CanvassPosition {
        log_leadership_term_id: 5,
        log_position: 1000,
        follower_id: 2,
    }));
    h.push_inbound(3, Message::CanvassPosition(CanvassPosition {
        log_leadership_term_id: 5,
        log_position: 1000,
        follower_id: 3,
    }));
    h.election.tick(now).unwrap();
    assert_eq!(h.election.state(), State::Nominate);

    let t1 = now + Duration::from_millis(2);
    h.election.tick(t1).unwrap();
    assert_eq!(h.election.state(), State::CandidateBallot);
    assert_eq!(h.election.candidate_term_id(), Some(6));

    let t1_timeout = t1 + Duration::from_millis(10);
    h.election.tick(t1_timeout).unwrap();
    assert_eq!(h.election.state(), State::Canvass);

    // Round two: both peers are still fresh enough to be unanimous, so
    // CANVASS immediately re-nominates at a strictly higher term.
    h.push_inbound(2, Message::CanvassPosition(CanvassPosition {
        log_leadership_term_id: 5,
        log_position: 1000,
        follower_id: 2,
    }));
    h.push_inbound(3, Message::CanvassPosition(CanvassPosition {
        log_leadership_term_id: 5,
        log_position: 1000,
        follower_id: 3,
    }));
    h.election.tick(t1_timeout).unwrap();
    assert_eq!(h.election.state(), State::Nominate);

    let t2 = t1_timeout + Duration::from_millis(2);
    h.election.tick(t2).unwrap();
    assert_eq!(h.election.state(), State::CandidateBallot);
    let term = h.election.candidate_term_id().unwrap();
    assert_eq!(term, 7, "the second nomination must skip past the abandoned term 6");

    h.push_inbound(2, Message::Vote(Vote {
        candidate_term_id: term,
        log_leadership_term_id: 5,
        log_position: 1000,
        candidate_id: 1,
        follower_id: 2,
        vote_granted: true,
    }));
    h.push_inbound(3, Message::Vote(Vote {
        candidate_term_id: term,
        log_leadership_term_id: 5,
        log_position: 1000,
        candidate_id: 1,
        follower_id: 3,
        vote_granted: true,
    }));
    h.election.tick(t2).unwrap();

    assert_eq!(h.election.state(), State::LeaderReady);
    assert_eq!(h.election.leadership_term_id(), 7);
    assert_eq!(
        h.recorded_terms(),
        vec![(None, 6), (Some(900), 7)],
        "term 6 was abandoned without becoming leader and must be recorded as a placeholder"
    );
}
