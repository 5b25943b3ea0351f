//! The coordinator's output queue: rather than performing side effects
//! directly, every coordinator method pushes the effects it wants onto a
//! queue, which the embedding application drains by iterating the
//! coordinator itself.
use std::collections::VecDeque;
use std::net::SocketAddr;

use crate::clock::LocalDuration;
use crate::nonce::Nonce;
use crate::verdict::Reachability;
use crate::wire::Packet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    /// Alice's retransmission/progress timer for her currently-running
    /// test.
    ContinueTest { nonce: Nonce },
    /// One-shot expiry for a Bob- or Charlie-role active-test record.
    RemoveTest { nonce: Nonce },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Io {
    /// Send `Packet` to the given address.
    Send(SocketAddr, Packet),
    /// Ask the embedding application's timer service to fire `TimerEvent`
    /// back in `LocalDuration`.
    Schedule(TimerEvent, LocalDuration),
    /// The final verdict for the just-completed locally-driven test.
    Reachability(Reachability),
}

#[derive(Debug, Default)]
pub struct Reactor {
    outbox: VecDeque<Io>,
}

impl Reactor {
    pub fn send(&mut self, to: SocketAddr, packet: Packet) {
        self.outbox.push_back(Io::Send(to, packet));
    }

    pub fn schedule(&mut self, event: TimerEvent, delay: LocalDuration) {
        self.outbox.push_back(Io::Schedule(event, delay));
    }

    pub fn report(&mut self, status: Reachability) {
        self.outbox.push_back(Io::Reachability(status));
    }

    pub fn is_empty(&self) -> bool {
        self.outbox.is_empty()
    }
}

impl Iterator for Reactor {
    type Item = Io;

    fn next(&mut self) -> Option<Io> {
        self.outbox.pop_front()
    }
}
