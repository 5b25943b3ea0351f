//! In-memory `Transport`/`PacketBuilder`/clock doubles: enough behaviour
//! to drive the coordinator's logic in unit and end-to-end tests, with
//! none of the real networking or cryptography.
use std::cell::Cell;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::clock::{LocalDuration, LocalTime};
use crate::nonce::Nonce;
use crate::transport::{IntroKey, PacketBuilder, PeerSession, RouterInfo, SessionKey, Transport, UdpAddress};
use crate::wire::{Packet, TestPayload};

#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    pub external_ip: Option<IpAddr>,
    pub intro_key: IntroKey,
    pub sessions: HashMap<SocketAddr, PeerSession>,
    pub blocklist: Vec<IpAddr>,
    pub test_peers: Vec<(RouterInfo, UdpAddress)>,
}

impl MockTransport {
    pub fn with_external_ip(mut self, ip: IpAddr) -> Self {
        self.external_ip = Some(ip);
        self
    }

    pub fn with_intro_key(mut self, key: IntroKey) -> Self {
        self.intro_key = key;
        self
    }

    pub fn with_session(mut self, addr: SocketAddr, session: PeerSession) -> Self {
        self.sessions.insert(addr, session);
        self
    }

    pub fn with_test_peer(mut self, addr: SocketAddr, intro_key: IntroKey) -> Self {
        let router_info = RouterInfo(addr.to_string().into_bytes());
        self.test_peers.push((router_info, UdpAddress { addr, intro_key }));
        self
    }

    pub fn blocklisting(mut self, ip: IpAddr) -> Self {
        self.blocklist.push(ip);
        self
    }
}

impl Transport for MockTransport {
    fn external_ip(&self) -> IpAddr {
        self.external_ip
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(93, 184, 216, 34)))
    }

    fn intro_key(&self) -> IntroKey {
        self.intro_key
    }

    fn peer_session(&self, remote: SocketAddr) -> Option<PeerSession> {
        self.sessions.get(&remote).copied()
    }

    fn pick_test_peer(&self, exclude: SocketAddr) -> Option<RouterInfo> {
        self.test_peers
            .iter()
            .find(|(_, udp)| udp.addr != exclude)
            .map(|(router_info, _)| router_info.clone())
    }

    fn target_address(&self, router_info: &RouterInfo) -> Option<UdpAddress> {
        self.test_peers
            .iter()
            .find(|(ri, _)| ri == router_info)
            .map(|(_, udp)| *udp)
    }

    fn is_valid(&self, ip: IpAddr) -> bool {
        !ip.is_unspecified() && !ip.is_loopback()
    }

    fn is_blocklisted(&self, ip: IpAddr) -> bool {
        self.blocklist.contains(&ip)
    }
}

/// Encodes the same envelope every real builder would, minus the actual
/// encryption: a `Packet` is just a `TestPayload` that happens to carry
/// the arguments it was given, so tests can decode it back and assert on
/// intent without standing up real session crypto.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockPacketBuilder;

impl PacketBuilder for MockPacketBuilder {
    fn alice_to_bob(&self, nonce: Nonce, intro_key: &IntroKey) -> Packet {
        Packet(
            TestPayload {
                nonce,
                port: 0,
                ip: None,
                intro_key: *intro_key,
            }
            .encode(),
        )
    }

    fn alice_to_charlie(&self, nonce: Nonce, intro_key: &IntroKey) -> Packet {
        self.alice_to_bob(nonce, intro_key)
    }

    fn to_alice(&self, nonce: Nonce, reflect: SocketAddr, peer_intro_key: &IntroKey) -> Packet {
        Packet(
            TestPayload {
                nonce,
                port: reflect.port(),
                ip: Some(reflect.ip()),
                intro_key: *peer_intro_key,
            }
            .encode(),
        )
    }

    fn bob_charlie(
        &self,
        nonce: Nonce,
        _cipher_key: &SessionKey,
        _mac_key: &SessionKey,
        alice: SocketAddr,
        alice_intro_key: IntroKey,
    ) -> Packet {
        Packet(
            TestPayload {
                nonce,
                port: alice.port(),
                ip: Some(alice.ip()),
                intro_key: alice_intro_key,
            }
            .encode(),
        )
    }
}

/// A manually-advanced clock for deterministic tests.
#[derive(Debug, Default)]
pub struct TestClock(Cell<LocalTime>);

impl TestClock {
    pub fn now(&self) -> LocalTime {
        self.0.get()
    }

    pub fn elapse(&self, duration: LocalDuration) -> LocalTime {
        let next = self.0.get() + duration;
        self.0.set(next);
        next
    }
}
