//! The coordinator: owns all per-node protocol state and dispatches
//! inbound packets to the Alice driver or the Bob/Charlie responders.
mod alice;
mod responder;

use std::net::SocketAddr;

use crate::clock::LocalTime;
use crate::config::Config;
use crate::nonce::Nonce;
use crate::reactor::{Io, Reactor, TimerEvent};
use crate::record::{Role, TestRecord};
use crate::ring::RecentNonces;
use crate::stats::Stats;
use crate::table::ActiveTests;
use crate::throttle::Throttle;
use crate::transport::{PacketBuilder, Transport};
use crate::wire::{self, TestPayload};
use crate::Rng;

pub struct Coordinator<T, P> {
    config: Config,
    transport: T,
    packets: P,
    rng: Rng,

    /// The test this node is currently driving as Alice, if any. A node
    /// drives at most one local test at a time.
    current_test: Option<TestRecord>,
    current_test_complete: bool,

    active: ActiveTests,
    recent: RecentNonces,
    throttle: Throttle,
    stats: Stats,
    reactor: Reactor,
}

impl<T: Transport, P: PacketBuilder> Coordinator<T, P> {
    pub fn new(config: Config, transport: T, packets: P, rng: Rng) -> Self {
        Self {
            active: ActiveTests::new(config.max_active_tests),
            recent: RecentNonces::new(config.max_recent_tests),
            throttle: Throttle::new(config.max_per_ip, config.throttle_clean_time),
            stats: Stats::default(),
            reactor: Reactor::default(),
            current_test: None,
            current_test_complete: false,
            config,
            transport,
            packets,
            rng,
        }
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn is_testing(&self) -> bool {
        self.current_test.is_some()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Entry point for every inbound UDP datagram addressed to the
    /// reachability-test port. Validates the source, decodes the envelope,
    /// applies the shared "is this test IP actually us?" guard, then
    /// dispatches by role.
    pub fn receive_test(&mut self, now: LocalTime, from: SocketAddr, data: &[u8]) {
        if !wire::validate_source(&self.transport, from) {
            self.stats.test_bad_ip += 1;
            log::warn!(target: "reach", "rejecting test packet from invalid source {from}");
            return;
        }

        let payload = match TestPayload::decode(data) {
            Ok(payload) => payload,
            Err(err) => {
                self.stats.test_bad_ip += 1;
                log::warn!(target: "reach", "dropping malformed test packet from {from}: {err}");
                return;
            }
        };

        if payload.port > 0 && !(1024..=65535).contains(&payload.port) {
            self.stats.test_bad_ip += 1;
            log::warn!(target: "reach", "dropping test packet from {from}: reflected port {} out of range", payload.port);
            return;
        }
        if let Some(ip) = payload.ip {
            if !self.transport.is_valid(ip) || self.transport.is_blocklisted(ip) {
                self.stats.test_bad_ip += 1;
                log::warn!(target: "reach", "dropping test packet from {from}: reflected ip {ip} invalid or blocklisted");
                return;
            }
        }

        // A reply to the test we're driving as Alice legitimately reflects
        // our own address back at us — that's the whole point of the
        // protocol — so it must bypass the self-IP guard below, which
        // exists to catch a *new* test improperly claiming our own /16,
        // not an expected reflection of it.
        if self.current_test.as_ref().map(|record| record.nonce) == Some(payload.nonce) {
            self.receive_test_reply(now, from, &payload);
            return;
        }

        if let Some(test_ip) = payload.ip {
            if wire::same_slash16(test_ip, self.transport.external_ip()) {
                if self.recent.contains(payload.nonce) {
                    log::info!(
                        target: "reach",
                        "dropping straggler for our own recently-finished test {} from {from}",
                        payload.nonce
                    );
                } else {
                    self.stats.test_bad_ip += 1;
                    log::warn!(
                        target: "reach",
                        "dropping test packet from {from} claiming our own address for nonce {}",
                        payload.nonce
                    );
                }
                return;
            }
        }

        match self.active.get(payload.nonce).map(|record| record.role) {
            None => self.receive_new_test(now, from, &payload),
            Some(Role::Bob) => self.dispatch_as_bob(now, from, &payload),
            Some(Role::Charlie) => self.dispatch_as_charlie(now, from, &payload),
            Some(Role::Alice) => {
                debug_assert!(false, "the active-test table never holds Alice-role records");
            }
        }
    }

    /// A packet for a nonce we've never seen: decide whether it looks like
    /// Alice's opening packet (no reflected endpoint) or Bob recruiting us
    /// as Charlie (a reflected Alice endpoint attached).
    fn receive_new_test(&mut self, now: LocalTime, from: SocketAddr, payload: &TestPayload) {
        if payload.ip.is_none() || payload.port == 0 {
            self.receive_from_alice_as_bob(now, from, payload);
        } else {
            if self.recent.contains(payload.nonce) {
                log::debug!(
                    target: "reach::charlie",
                    "ignoring straggler for our own completed test {}",
                    payload.nonce
                );
                return;
            }
            self.receive_from_bob_as_charlie(now, from, payload);
        }
    }

    fn dispatch_as_bob(&mut self, now: LocalTime, from: SocketAddr, payload: &TestPayload) {
        let record = self
            .active
            .get(payload.nonce)
            .expect("presence just checked by the caller");
        if Some(from) == record.alice {
            self.receive_from_alice_as_bob(now, from, payload);
        } else if Some(from) == record.charlie {
            self.receive_from_charlie_as_bob(now, from, payload);
        } else {
            self.stats.fourth_party += 1;
            log::warn!(
                target: "reach::bob",
                "dropping packet from {from}, not a party to test {}",
                payload.nonce
            );
        }
    }

    fn dispatch_as_charlie(&mut self, now: LocalTime, from: SocketAddr, payload: &TestPayload) {
        if payload.ip.is_none() || payload.port == 0 {
            self.receive_from_alice_as_charlie(now, from, payload);
        } else {
            self.receive_from_bob_as_charlie(now, from, payload);
        }
    }

    /// Checks, and counts against, the per-IP throttle for both the packet's
    /// source and (if present) the reflected test IP it's relaying — either
    /// hit drops the packet.
    fn new_test_throttled(&mut self, now: LocalTime, from: SocketAddr, payload: &TestPayload) -> bool {
        let source_hit = self.throttle.should_throttle(from.ip(), now);
        let test_ip_hit = payload
            .ip
            .map(|ip| self.throttle.should_throttle(ip, now))
            .unwrap_or(false);
        source_hit || test_ip_hit
    }

    /// Fired by the embedding application's timer service when a
    /// previously-scheduled `ContinueTest` event comes due.
    pub fn on_continue_test(&mut self, now: LocalTime, nonce: Nonce) {
        self.alice_continue_test(now, nonce);
    }

    /// Fired by the embedding application's timer service when a
    /// previously-scheduled `RemoveTest` event comes due. Tolerant of the
    /// record already being gone.
    pub fn on_remove_test(&mut self, nonce: Nonce) {
        if self.active.remove(nonce).is_some() {
            log::trace!(target: "reach", "expired active-test record {nonce}");
        }
    }

    /// Ages out per-IP throttle buckets that haven't been touched recently.
    /// Expected to be called periodically by the embedding application;
    /// not driven internally.
    pub fn sweep(&mut self, now: LocalTime) {
        self.throttle.sweep(now);
    }
}

impl<T: Transport, P: PacketBuilder> Iterator for Coordinator<T, P> {
    type Item = Io;

    fn next(&mut self) -> Option<Io> {
        self.reactor.next()
    }
}
