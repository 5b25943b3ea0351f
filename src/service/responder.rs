//! The Bob and Charlie responders — the duties this node performs on
//! behalf of a remote Alice.
use std::net::SocketAddr;

use super::Coordinator;
use crate::clock::LocalTime;
use crate::record::TestRecord;
use crate::reactor::TimerEvent;
use crate::transport::{PacketBuilder, Transport};
use crate::wire::TestPayload;

impl<T: Transport, P: PacketBuilder> Coordinator<T, P> {
    /// A packet that looks like it came from a remote Alice, addressed to
    /// us acting as her Bob: pick (or reuse) a Charlie, and relay to her.
    pub(super) fn receive_from_alice_as_bob(&mut self, now: LocalTime, from: SocketAddr, payload: &TestPayload) {
        let nonce = payload.nonce;
        let existing = self.active.get(nonce).cloned();
        let is_new = existing.is_none();

        if is_new && self.new_test_throttled(now, from, payload) {
            self.stats.throttled += 1;
            log::debug!(target: "reach::bob", "throttling new test {nonce} from {from}");
            return;
        }

        if let Some(record) = &existing {
            if let Some(last) = record.receive_alice_time {
                if now - last < self.config.resend_timeout / 2 {
                    log::trace!(target: "reach::bob", "dropping duplicate Alice packet for {nonce} (too soon)");
                    return;
                }
            }
        }

        let charlie = match &existing {
            Some(record) => record.charlie.zip(record.charlie_intro_key),
            None => self
                .transport
                .pick_test_peer(from)
                .and_then(|router_info| self.transport.target_address(&router_info))
                .map(|udp| (udp.addr, udp.intro_key)),
        };
        let Some((charlie_addr, charlie_intro_key)) = charlie else {
            log::warn!(target: "reach::bob", "no Charlie available to help with test {nonce}");
            return;
        };

        let Some(charlie_session) = self.transport.peer_session(charlie_addr) else {
            log::warn!(target: "reach::bob", "no session with Charlie {charlie_addr}; dropping test {nonce}");
            return;
        };

        let mut record = existing.unwrap_or_else(|| TestRecord::new_bob(nonce, now));
        record.alice = Some(from);
        record.alice_intro_key = Some(payload.intro_key);
        record.charlie = Some(charlie_addr);
        record.charlie_intro_key = Some(charlie_intro_key);
        record.receive_alice_time = Some(now);
        record.packets_relayed += 1;

        if record.packets_relayed > self.config.max_relayed_per_test_bob {
            log::debug!(target: "reach::bob", "dropping test {nonce}: Bob relay cap exceeded");
            return;
        }

        if !self.active.insert(record.clone()) {
            self.stats.table_full += 1;
            log::warn!(target: "reach::bob", "dropping test {nonce}: active-test table full");
            return;
        }
        if is_new {
            self.reactor
                .schedule(TimerEvent::RemoveTest { nonce }, self.config.max_charlie_lifetime);
        }

        let packet = self.packets.bob_charlie(
            nonce,
            &charlie_session.cipher_key,
            &charlie_session.mac_key,
            from,
            payload.intro_key,
        );
        self.reactor.send(charlie_addr, packet);
    }

    /// Charlie's reply arrives at Bob: pass her intro-key on to Alice.
    pub(super) fn receive_from_charlie_as_bob(&mut self, now: LocalTime, _from: SocketAddr, payload: &TestPayload) {
        let nonce = payload.nonce;
        let Some(mut record) = self.active.get(nonce).cloned() else {
            return;
        };

        if let Some(last) = record.receive_charlie_time {
            if now - last < self.config.resend_timeout / 2 {
                log::trace!(target: "reach::bob", "dropping duplicate Charlie packet for {nonce} (too soon)");
                return;
            }
        }

        record.packets_relayed += 1;
        if record.packets_relayed > self.config.max_relayed_per_test_bob {
            log::debug!(target: "reach::bob", "dropping test {nonce}: Bob relay cap exceeded");
            return;
        }
        record.receive_charlie_time = Some(now);

        let Some(alice_addr) = record.alice else {
            log::warn!(target: "reach::bob", "Charlie reply for test {nonce} with no known Alice endpoint");
            return;
        };

        self.active.insert(record);

        let packet = self.packets.to_alice(nonce, alice_addr, &payload.intro_key);
        self.reactor.send(alice_addr, packet);
    }

    /// A remote Bob recruits us to confirm his Alice's endpoint: ack Bob
    /// and contact Alice directly.
    pub(super) fn receive_from_bob_as_charlie(&mut self, now: LocalTime, from: SocketAddr, payload: &TestPayload) {
        let nonce = payload.nonce;
        let existing = self.active.get(nonce).cloned();
        let is_new = existing.is_none();

        if is_new && self.new_test_throttled(now, from, payload) {
            self.stats.throttled += 1;
            log::debug!(target: "reach::charlie", "throttling new test {nonce} from Bob {from}");
            return;
        }

        if let Some(record) = &existing {
            if let Some(last) = record.receive_bob_time {
                if now - last < self.config.resend_timeout / 2 {
                    log::trace!(target: "reach::charlie", "dropping duplicate Bob packet for {nonce} (too soon)");
                    return;
                }
            }
        }

        let Some(alice_ip) = payload.ip else {
            self.stats.test_bad_ip += 1;
            log::warn!(target: "reach::charlie", "Bob relay for test {nonce} missing Alice's endpoint");
            return;
        };
        if payload.port == 0 {
            self.stats.test_bad_ip += 1;
            log::warn!(target: "reach::charlie", "Bob relay for test {nonce} has an invalid Alice port");
            return;
        }
        let alice_addr = SocketAddr::new(alice_ip, payload.port);

        let Some(bob_session) = self.transport.peer_session(from) else {
            log::warn!(target: "reach::charlie", "refusing to help unauthenticated Bob {from}");
            return;
        };

        let mut record = existing.unwrap_or_else(|| TestRecord::new_charlie(nonce, now));
        record.bob = Some(from);
        record.bob_cipher_key = Some(bob_session.cipher_key);
        record.bob_mac_key = Some(bob_session.mac_key);
        record.alice = Some(alice_addr);
        record.alice_intro_key = Some(payload.intro_key);
        record.receive_bob_time = Some(now);
        record.last_send_time = now;
        record.packets_relayed += 1;

        if record.packets_relayed > self.config.max_relayed_per_test_charlie {
            log::debug!(target: "reach::charlie", "dropping test {nonce}: Charlie relay cap exceeded");
            return;
        }

        if !self.active.insert(record.clone()) {
            self.stats.table_full += 1;
            log::warn!(target: "reach::charlie", "dropping test {nonce}: active-test table full");
            return;
        }
        if is_new {
            self.reactor
                .schedule(TimerEvent::RemoveTest { nonce }, self.config.max_charlie_lifetime);
        }

        let ack = self.packets.bob_charlie(
            nonce,
            &record.bob_cipher_key.expect("just set"),
            &record.bob_mac_key.expect("just set"),
            alice_addr,
            payload.intro_key,
        );
        self.reactor.send(from, ack);

        let my_intro_key = self.transport.intro_key();
        let to_alice = self.packets.to_alice(nonce, alice_addr, &my_intro_key);
        self.reactor.send(alice_addr, to_alice);
    }

    /// Alice contacts Charlie directly (her own retransmission, once she
    /// knows Charlie's address): acknowledge with our own intro-key.
    pub(super) fn receive_from_alice_as_charlie(&mut self, now: LocalTime, from: SocketAddr, payload: &TestPayload) {
        let nonce = payload.nonce;
        let Some(mut record) = self.active.get(nonce).cloned() else {
            return;
        };

        if let Some(last) = record.receive_alice_time {
            if now - last < self.config.resend_timeout / 2 {
                log::trace!(target: "reach::charlie", "dropping duplicate Alice packet for {nonce} (too soon)");
                return;
            }
        }

        record.packets_relayed += 1;
        if record.packets_relayed > self.config.max_relayed_per_test_charlie {
            log::debug!(target: "reach::charlie", "dropping test {nonce}: Charlie relay cap exceeded");
            return;
        }
        record.receive_alice_time = Some(now);
        record.alice_intro_key = Some(payload.intro_key);
        self.active.insert(record);

        let my_intro_key = self.transport.intro_key();
        let packet = self.packets.to_alice(nonce, from, &my_intro_key);
        self.reactor.send(from, packet);
    }
}
