//! The Alice driver — the state machine for a test this node is itself
//! running.
use std::net::SocketAddr;

use super::Coordinator;
use crate::clock::LocalTime;
use crate::nonce::{random_nonce, Nonce};
use crate::reactor::TimerEvent;
use crate::record::TestRecord;
use crate::transport::{PacketBuilder, SessionKey, Transport};
use crate::verdict::Reachability;
use crate::wire::{same_slash16, TestPayload};

#[derive(Debug, Clone, Copy)]
enum Retransmit {
    ToBob(SocketAddr),
    ToCharlie(SocketAddr),
}

impl<T: Transport, P: PacketBuilder> Coordinator<T, P> {
    /// Starts a fresh test through `bob`, refusing if one is already
    /// running or `bob` is implausibly close to our own address.
    pub fn run_test(
        &mut self,
        now: LocalTime,
        bob: SocketAddr,
        bob_cipher_key: SessionKey,
        bob_mac_key: SessionKey,
    ) {
        if self.current_test.is_some() {
            log::warn!(target: "reach::alice", "refusing to start a test: one is already running");
            return;
        }
        if same_slash16(bob.ip(), self.transport.external_ip()) {
            log::warn!(target: "reach::alice", "refusing to test through {bob}: too close to our own address");
            return;
        }

        let nonce = random_nonce(&mut self.rng);
        let mut record = TestRecord::new_alice(nonce, now, bob, bob_cipher_key, bob_mac_key);
        record.packets_relayed = 1;
        record.last_send_time = now;

        self.recent.push(nonce);
        self.current_test_complete = false;

        let intro_key = self.transport.intro_key();
        let packet = self.packets.alice_to_bob(nonce, &intro_key);
        self.reactor.send(bob, packet);
        self.reactor
            .schedule(TimerEvent::ContinueTest { nonce }, self.config.resend_timeout);

        self.current_test = Some(record);
    }

    /// Dispatches a reply that matches the currently-running test's nonce,
    /// by whether it came from the Bob endpoint or anyone else (Charlie).
    pub(super) fn receive_test_reply(&mut self, now: LocalTime, from: SocketAddr, payload: &TestPayload) {
        let is_bob = self
            .current_test
            .as_ref()
            .and_then(|record| record.bob)
            == Some(from);

        if is_bob {
            self.receive_from_bob(now, payload);
        } else {
            self.receive_from_charlie(now, from, payload);
        }
    }

    fn receive_from_bob(&mut self, now: LocalTime, payload: &TestPayload) {
        let Some(ip) = payload.ip else {
            self.stats.test_bad_ip += 1;
            log::debug!(target: "reach::alice", "dropping Bob reply with no reflected endpoint");
            return;
        };
        if payload.port == 0 {
            self.stats.test_bad_ip += 1;
            log::debug!(target: "reach::alice", "dropping Bob reply with an invalid reflected port");
            return;
        }

        let already_has_charlie_confirmation = {
            let record = self
                .current_test
                .as_mut()
                .expect("caller only reaches here with a current test");
            record.alice = Some(SocketAddr::new(ip, payload.port));
            record.receive_bob_time = Some(now);
            record.alice_from_charlie.is_some()
        };

        if already_has_charlie_confirmation {
            self.test_complete(false);
        }
    }

    fn receive_from_charlie(&mut self, now: LocalTime, from: SocketAddr, payload: &TestPayload) {
        if let Some(session) = self.transport.peer_session(from) {
            let recent = |t: LocalTime| now >= t && now - t < self.config.charlie_recent_period;
            if recent(session.last_ack) || recent(session.last_send) {
                self.stats.status_known_charlie += 1;
                log::debug!(target: "reach::alice", "aborting test: Charlie {from} is a known peer");
                self.current_test_complete = true;
                self.current_test = None;
                self.reactor.report(Reachability::Unknown);
                return;
            }
        }

        let is_second_charlie_packet = self
            .current_test
            .as_ref()
            .expect("caller only reaches here with a current test")
            .receive_charlie_time
            .is_some();

        if is_second_charlie_packet {
            self.receive_second_charlie_packet(now, payload);
        } else {
            self.receive_first_charlie_packet(now, from, payload);
        }
    }

    fn receive_second_charlie_packet(&mut self, now: LocalTime, payload: &TestPayload) {
        let Some(ip) = payload.ip else {
            self.stats.test_bad_ip += 1;
            log::debug!(target: "reach::alice", "dropping Charlie's second packet with no reflected endpoint");
            return;
        };
        if payload.port == 0 {
            self.stats.test_bad_ip += 1;
            log::debug!(target: "reach::alice", "dropping Charlie's second packet with an invalid reflected port");
            return;
        }

        let has_bob_confirmation = {
            let record = self
                .current_test
                .as_mut()
                .expect("caller only reaches here with a current test");
            record.alice_from_charlie = Some(SocketAddr::new(ip, payload.port));
            record.receive_bob_time.is_some()
        };

        if has_bob_confirmation {
            self.test_complete(true);
        }
    }

    fn receive_first_charlie_packet(&mut self, now: LocalTime, from: SocketAddr, payload: &TestPayload) {
        let over_cap = {
            let record = self
                .current_test
                .as_mut()
                .expect("caller only reaches here with a current test");
            record.packets_relayed += 1;
            record.packets_relayed > self.config.max_relayed_per_test_alice
        };
        if over_cap {
            log::debug!(target: "reach::alice", "dropping first Charlie packet: relay cap exceeded");
            return;
        }

        let nonce = {
            let record = self
                .current_test
                .as_mut()
                .expect("caller only reaches here with a current test");
            record.charlie = Some(from);
            record.charlie_intro_key = Some(payload.intro_key);
            record.receive_charlie_time = Some(now);
            record.nonce
        };

        let intro_key = self.transport.intro_key();
        let packet = self.packets.alice_to_charlie(nonce, &intro_key);
        self.reactor.send(from, packet);
    }

    /// Fired by `Coordinator::on_continue_test`.
    pub(super) fn alice_continue_test(&mut self, now: LocalTime, nonce: Nonce) {
        if self.current_test.as_ref().map(|record| record.nonce) != Some(nonce) {
            return;
        }

        let expired = self
            .current_test
            .as_ref()
            .expect("just checked")
            .is_expired(now, self.config.max_test_time);
        if expired {
            self.test_complete(true);
            return;
        }

        let due = {
            let record = self.current_test.as_ref().expect("just checked");
            now - record.last_send_time >= self.config.resend_timeout
        };
        if !due {
            log::trace!(target: "reach::alice", "continue-test fired early for {nonce}");
            return;
        }

        let (packets_relayed, over_cap, target) = {
            let record = self.current_test.as_mut().expect("just checked");
            record.packets_relayed += 1;
            let over_cap = record.packets_relayed > self.config.max_relayed_per_test_alice;
            let target = if over_cap {
                None
            } else if record.receive_bob_time.is_none() || record.receive_charlie_time.is_none() {
                record.bob.map(Retransmit::ToBob)
            } else {
                record.charlie.map(Retransmit::ToCharlie)
            };
            if !over_cap {
                record.last_send_time = now;
            }
            (record.packets_relayed, over_cap, target)
        };

        if over_cap {
            self.test_complete(false);
            return;
        }

        match target {
            Some(Retransmit::ToBob(bob)) => {
                let intro_key = self.transport.intro_key();
                let packet = self.packets.alice_to_bob(nonce, &intro_key);
                self.reactor.send(bob, packet);
            }
            Some(Retransmit::ToCharlie(charlie)) => {
                let intro_key = self.transport.intro_key();
                let packet = self.packets.alice_to_charlie(nonce, &intro_key);
                self.reactor.send(charlie, packet);
            }
            None => {
                log::warn!(target: "reach::alice", "no endpoint to retransmit test {nonce} to");
            }
        }

        self.reactor.schedule(
            TimerEvent::ContinueTest { nonce },
            self.config.resend_timeout + retransmit_backoff(packets_relayed),
        );
    }

    /// Classifies and reports the currently-running test's verdict, and
    /// either drops it (`forget = true`) or leaves it in place so a
    /// straggler reply can still be folded in (`forget = false`).
    fn test_complete(&mut self, forget: bool) {
        if self.current_test_complete {
            return;
        }
        let Some(record) = self.current_test.as_ref() else {
            return;
        };
        let verdict = classify(record);

        self.current_test_complete = true;
        self.reactor.report(verdict);
        if forget {
            self.current_test = None;
        }
    }
}

fn classify(record: &TestRecord) -> Reachability {
    if let Some(from_charlie) = record.alice_from_charlie {
        return match record.alice {
            Some(from_bob) if from_bob == from_charlie => Reachability::Ok,
            _ => Reachability::Different,
        };
    }
    if record.receive_charlie_time.is_some() {
        return Reachability::Unknown;
    }
    if record.receive_bob_time.is_some() {
        return Reachability::RejectUnsolicited;
    }
    Reachability::Unknown
}

fn retransmit_backoff(packets_relayed: u32) -> crate::clock::LocalDuration {
    crate::clock::LocalDuration::from_secs(u64::from(packets_relayed))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Config;
    use crate::nonce::random_nonce;
    use crate::record::Role;
    use crate::reactor::Io;
    use crate::test::mock::{MockPacketBuilder, MockTransport};
    use crate::Rng;

    fn addr(port: u16) -> SocketAddr {
        use std::net::{Ipv4Addr, SocketAddrV4};
        SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(198, 51, 100, 1), port))
    }

    /// Once the Alice-role relay count would exceed
    /// `max_relayed_per_test_alice`, `alice_continue_test` stops
    /// retransmitting and finalises the test instead.
    #[test]
    fn alice_relay_cap_suppresses_further_retransmits() {
        let mut config = Config::default();
        config.max_relayed_per_test_alice = 2;
        let resend = config.resend_timeout;

        let mut seed_rng = Rng::with_seed(1);
        let nonce = random_nonce(&mut seed_rng);

        let mut coordinator = Coordinator::new(config, MockTransport::default(), MockPacketBuilder, Rng::with_seed(1));
        let now = LocalTime::default();
        let bob = addr(4000);

        coordinator.run_test(now, bob, [1; 32], [2; 32]);
        assert_eq!(coordinator.current_test.as_ref().unwrap().packets_relayed, 1);
        let _ = coordinator.next(); // the initial Send to Bob
        let _ = coordinator.next(); // the initial Schedule

        // Second retransmit: still within the cap.
        coordinator.on_continue_test(now + resend, nonce);
        assert_eq!(coordinator.current_test.as_ref().unwrap().packets_relayed, 2);
        let events: Vec<Io> = std::iter::from_fn(|| coordinator.next()).collect();
        assert!(
            events.iter().any(|io| matches!(io, Io::Send(to, _) if *to == bob)),
            "still under the cap, so this retransmit must go out"
        );

        // Third retransmit would exceed the cap: must finalise instead of
        // sending anything further.
        coordinator.on_continue_test(now + resend + resend, nonce);
        let events: Vec<Io> = std::iter::from_fn(|| coordinator.next()).collect();
        assert!(
            !events.iter().any(|io| matches!(io, Io::Send(..))),
            "a delivery that would exceed the cap must not retransmit"
        );
        assert!(
            events.iter().any(|io| matches!(io, Io::Reachability(_))),
            "the over-cap test must still be finalised with a verdict"
        );
    }

    #[test]
    fn classify_ok_when_bob_and_charlie_agree() {
        let now = LocalTime::default();
        let mut record = TestRecord::new_alice(1, now, addr(4000), [0; 32], [0; 32]);
        record.alice = Some(addr(9000));
        record.alice_from_charlie = Some(addr(9000));
        assert_eq!(classify(&record), Reachability::Ok);
        assert_eq!(record.role, Role::Alice);
    }

    #[test]
    fn classify_different_when_bob_and_charlie_disagree() {
        let now = LocalTime::default();
        let mut record = TestRecord::new_alice(1, now, addr(4000), [0; 32], [0; 32]);
        record.alice = Some(addr(9000));
        record.alice_from_charlie = Some(addr(9001));
        assert_eq!(classify(&record), Reachability::Different);
    }

    #[test]
    fn classify_reject_unsolicited_when_only_bob_replied() {
        let now = LocalTime::default();
        let mut record = TestRecord::new_alice(1, now, addr(4000), [0; 32], [0; 32]);
        record.alice = Some(addr(9000));
        record.receive_bob_time = Some(now);
        assert_eq!(classify(&record), Reachability::RejectUnsolicited);
    }

    #[test]
    fn classify_unknown_when_nobody_replied() {
        let now = LocalTime::default();
        let record = TestRecord::new_alice(1, now, addr(4000), [0; 32], [0; 32]);
        assert_eq!(classify(&record), Reachability::Unknown);
    }

    #[test]
    fn classify_unknown_when_only_charlies_first_packet_arrived() {
        let now = LocalTime::default();
        let mut record = TestRecord::new_alice(1, now, addr(4000), [0; 32], [0; 32]);
        record.receive_charlie_time = Some(now);
        assert_eq!(classify(&record), Reachability::Unknown);
    }
}
