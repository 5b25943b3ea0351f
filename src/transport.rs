//! Transport and packet-building collaborators. These are the seams: the
//! coordinator only ever reads session state and asks for packets to be
//! built through them, it never touches sockets, the routing table or
//! cryptography directly.
use std::net::{IpAddr, SocketAddr};

use crate::clock::LocalTime;
use crate::nonce::Nonce;
use crate::wire::Packet;

pub type IntroKey = [u8; 32];
pub type SessionKey = [u8; 32];

/// What the transport knows about an established session with a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerSession {
    pub cipher_key: SessionKey,
    pub mac_key: SessionKey,
    pub last_ack: LocalTime,
    pub last_send: LocalTime,
}

/// An opaque reference to a candidate test peer, as handed out by
/// `Transport::pick_test_peer`. Resolving it to an address (and confirming
/// it actually has test capability) is a separate step, since the
/// candidate's router info may be stale or incomplete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterInfo(pub Vec<u8>);

/// A resolved UDP target: where to send, and the intro-key to address the
/// packet to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpAddress {
    pub addr: SocketAddr,
    pub intro_key: IntroKey,
}

/// The node's view of its own external reachability and its peers, as
/// needed by the reachability coordinator. Deliberately narrow: this is
/// not the whole transport/NetDB interface, just the slice this protocol
/// consumes.
pub trait Transport {
    /// Our own believed external IP, used for the "too close to our own
    /// address" and "test IP in our own /16" guards.
    fn external_ip(&self) -> IpAddr;
    /// Our own intro-key, attached to outgoing test packets.
    fn intro_key(&self) -> IntroKey;
    /// Session state for an already-connected peer, if any.
    fn peer_session(&self, remote: SocketAddr) -> Option<PeerSession>;
    /// Ask for a test-capable peer other than `exclude`, to serve as
    /// Charlie for a Bob-role test.
    fn pick_test_peer(&self, exclude: SocketAddr) -> Option<RouterInfo>;
    /// Resolve a candidate's router info to a concrete UDP target.
    fn target_address(&self, router_info: &RouterInfo) -> Option<UdpAddress>;
    /// Whether `ip` is a routable, non-reserved unicast address.
    fn is_valid(&self, ip: IpAddr) -> bool;
    /// Whether `ip` is on the local blocklist.
    fn is_blocklisted(&self, ip: IpAddr) -> bool;
}

/// Builds the four distinct wire payloads the protocol ever sends.
/// Encryption/framing beyond the envelope bytes is this collaborator's
/// business, not the coordinator's.
pub trait PacketBuilder {
    /// Alice's (re)transmission to Bob: just her nonce and intro-key, she
    /// has nothing to reflect yet.
    fn alice_to_bob(&self, nonce: Nonce, intro_key: &IntroKey) -> Packet;
    /// Alice's (re)transmission directly to Charlie, once known.
    fn alice_to_charlie(&self, nonce: Nonce, intro_key: &IntroKey) -> Packet;
    /// A reply to Alice, reflecting the endpoint the sender observed her
    /// at and carrying a peer's intro-key (Bob forwards Charlie's; Charlie
    /// forwards her own).
    fn to_alice(&self, nonce: Nonce, reflect: SocketAddr, peer_intro_key: &IntroKey) -> Packet;
    /// A session-keyed packet between Bob and Charlie (in either
    /// direction), carrying Alice's endpoint and intro-key.
    fn bob_charlie(
        &self,
        nonce: Nonce,
        cipher_key: &SessionKey,
        mac_key: &SessionKey,
        alice: SocketAddr,
        alice_intro_key: IntroKey,
    ) -> Packet;
}
