//! A single-threaded, non-blocking leader-election state machine for a
//! replicated-log cluster.
//!
//! The crate exposes one thing a host process drives: an [`Election`]
//! advanced by calling [`Election::tick`] on a cooperative schedule and by
//! feeding it inbound messages through an injected [`Transport`]. Every
//! other collaborator -- the log itself, the archive/recording subsystem,
//! the mark-file, the member's clock and RNG -- is modeled as a trait so
//! this crate never touches a socket or a disk directly.

#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate error_chain;
extern crate log;
extern crate rand;
extern crate serde;

pub mod agent;
pub mod catchup;
pub mod channel;
pub mod clock;
pub mod config;
pub mod election;
pub mod errors;
pub mod mark_file;
pub mod member;
pub mod messages;
pub mod random;
pub mod recording_log;
pub mod state_counter;
pub mod transport;

pub use agent::{ChannelUri, ClusterAgent, SubscriptionHandle};
pub use catchup::LogCatchup;
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::ElectionConfig;
pub use election::{Election, State};
pub use errors::{Error, ErrorKind, Result};
pub use mark_file::MarkFile;
pub use member::{Member, MemberTable, VoteState};
pub use messages::{
    AppendedPosition, CanvassPosition, CommitPosition, LeadershipTermId, LogPosition,
    LogSessionId, MemberId, Membership, Message, NewLeadershipTerm, RequestVote, Role, Vote,
};
pub use random::{FixedRandomSource, RandomSource, ThreadRandomSource};
pub use recording_log::{RecordingId, RecordingLog, RecordingLogEntry};
pub use state_counter::{AtomicStateCounter, StateCounter};
pub use transport::{Inbound, Transport};
