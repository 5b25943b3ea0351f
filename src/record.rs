//! The test record. One struct, shared across all three roles — which
//! fields are populated, and what they mean, depends on `role`: a tagged
//! struct dispatched on by the caller, not three separate types.
use std::net::SocketAddr;

use crate::clock::{LocalDuration, LocalTime};
use crate::nonce::Nonce;
use crate::transport::{IntroKey, SessionKey};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Display)]
pub enum Role {
    /// We are driving this test: we asked Bob to test us.
    #[display("alice")]
    Alice,
    /// A remote Alice asked us to test her; we're relaying to a Charlie.
    #[display("bob")]
    Bob,
    /// A remote Bob recruited us to confirm a remote Alice's endpoint.
    #[display("charlie")]
    Charlie,
}

#[derive(Debug, Clone)]
pub struct TestRecord {
    pub nonce: Nonce,
    pub role: Role,
    pub begin_time: LocalTime,
    pub last_send_time: LocalTime,
    pub receive_alice_time: Option<LocalTime>,
    pub receive_bob_time: Option<LocalTime>,
    pub receive_charlie_time: Option<LocalTime>,

    /// Alice's endpoint. In an Alice-role record: the endpoint Bob reflected
    /// back to us. In a Bob- or Charlie-role record: the remote Alice's
    /// endpoint, as observed directly (Bob) or as relayed by Bob (Charlie).
    pub alice: Option<SocketAddr>,
    /// Alice's endpoint as reflected by Charlie's second packet. Alice-role
    /// records only.
    pub alice_from_charlie: Option<SocketAddr>,
    /// The remote Alice's intro-key, read off her packet. Bob- and
    /// Charlie-role records only.
    pub alice_intro_key: Option<IntroKey>,

    /// Bob's endpoint and session keys. In an Alice-role record: the Bob
    /// we're testing through. In a Charlie-role record: the Bob who
    /// recruited us, and the session keys to reply to him with.
    pub bob: Option<SocketAddr>,
    pub bob_cipher_key: Option<SessionKey>,
    pub bob_mac_key: Option<SessionKey>,

    /// Charlie's endpoint and intro-key. In an Alice-role record: learned
    /// from her first packet. In a Bob-role record: the Charlie we picked
    /// or reused to help with this test.
    pub charlie: Option<SocketAddr>,
    pub charlie_intro_key: Option<IntroKey>,

    pub packets_relayed: u32,
}

impl TestRecord {
    pub fn new_alice(
        nonce: Nonce,
        now: LocalTime,
        bob: SocketAddr,
        bob_cipher_key: SessionKey,
        bob_mac_key: SessionKey,
    ) -> Self {
        Self {
            nonce,
            role: Role::Alice,
            begin_time: now,
            last_send_time: now,
            receive_alice_time: None,
            receive_bob_time: None,
            receive_charlie_time: None,
            alice: None,
            alice_from_charlie: None,
            alice_intro_key: None,
            bob: Some(bob),
            bob_cipher_key: Some(bob_cipher_key),
            bob_mac_key: Some(bob_mac_key),
            charlie: None,
            charlie_intro_key: None,
            packets_relayed: 0,
        }
    }

    pub fn new_bob(nonce: Nonce, now: LocalTime) -> Self {
        Self::new_responder(nonce, Role::Bob, now)
    }

    pub fn new_charlie(nonce: Nonce, now: LocalTime) -> Self {
        Self::new_responder(nonce, Role::Charlie, now)
    }

    fn new_responder(nonce: Nonce, role: Role, now: LocalTime) -> Self {
        Self {
            nonce,
            role,
            begin_time: now,
            last_send_time: now,
            receive_alice_time: None,
            receive_bob_time: None,
            receive_charlie_time: None,
            alice: None,
            alice_from_charlie: None,
            alice_intro_key: None,
            bob: None,
            bob_cipher_key: None,
            bob_mac_key: None,
            charlie: None,
            charlie_intro_key: None,
            packets_relayed: 0,
        }
    }

    pub fn is_expired(&self, now: LocalTime, max_test_time: LocalDuration) -> bool {
        now >= self.begin_time + max_test_time
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::net::{Ipv4Addr, SocketAddrV4};

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(198, 51, 100, 1), port))
    }

    #[test]
    fn alice_record_has_bob_endpoint_from_creation() {
        let now = LocalTime::default();
        let record = TestRecord::new_alice(1, now, addr(4000), [1; 32], [2; 32]);
        assert_eq!(record.bob, Some(addr(4000)));
        assert_eq!(record.role, Role::Alice);
        assert!(record.charlie.is_none());
    }

    #[test]
    fn responder_records_start_with_everything_unset() {
        let now = LocalTime::default();
        let record = TestRecord::new_bob(7, now);
        assert_eq!(record.role, Role::Bob);
        assert!(record.alice.is_none());
        assert!(record.bob.is_none());
        assert_eq!(record.packets_relayed, 0);
    }

    #[test]
    fn expiry_is_relative_to_begin_time() {
        let now = LocalTime::default();
        let record = TestRecord::new_alice(1, now, addr(4000), [0; 32], [0; 32]);
        let max_test_time = LocalDuration::from_secs(30);

        assert!(!record.is_expired(now + LocalDuration::from_secs(29), max_test_time));
        assert!(record.is_expired(now + LocalDuration::from_secs(30), max_test_time));
    }
}
