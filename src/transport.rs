//! The messaging transport, consumed as a capability only. This crate
//! never frames, encodes, or delivers a byte on the wire; it only asks a
//! `Transport` implementation to try to hand a message to a peer, and
//! polls it for inbound messages.

use crate::messages::{MemberId, Message};

/// A single inbound message, tagged with the peer that sent it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inbound {
    pub from: MemberId,
    pub message: Message,
}

/// Capability the FSM depends on to exchange messages with peers.
///
/// All sends are best-effort and back-pressured: `send` returns whether
/// the transport *accepted* the message for eventual delivery, not
/// whether the peer received it. A `false` result is not an error -- the
/// FSM simply retries the same send on a later tick.
pub trait Transport {
    /// Attempt to hand `message` to `to`. Returns `true` if the transport
    /// accepted it.
    fn send(&mut self, to: MemberId, message: Message) -> bool;

    /// Attempt to hand `message` to every other member of the cluster.
    /// Returns the set of recipients that accepted it; a caller counting
    /// broadcast progress should compare this against the full
    /// membership rather than assume every send succeeded.
    fn broadcast(&mut self, to: &[MemberId], message: Message) -> Vec<MemberId> {
        to.iter()
            .copied()
            .filter(|&id| self.send(id, message))
            .collect()
    }

    /// Drain whatever inbound messages have arrived since the last poll.
    /// Must not block; `tick` calls this first on every invocation.
    fn poll_inbound(&mut self) -> Vec<Inbound>;
}
