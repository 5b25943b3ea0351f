//! Tunable parameters for the reachability coordinator: a plain struct an
//! embedding application builds once and hands to the `Coordinator`, with
//! a `Default` impl giving the production values so tests only need to
//! override what they shrink (typically the timeouts).
use crate::clock::LocalDuration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Cap on packets a locally-driven (Alice) test will relay before
    /// giving up as `Unknown`/`RejectUnsolicited`.
    pub max_relayed_per_test_alice: u32,
    /// Cap on packets a Bob-role record will relay for a single nonce.
    pub max_relayed_per_test_bob: u32,
    /// Cap on packets a Charlie-role record will relay for a single nonce.
    pub max_relayed_per_test_charlie: u32,
    /// How long a Charlie-role (or Bob-role) active-test record survives
    /// before its one-shot `RemoveTest` timer fires.
    pub max_charlie_lifetime: LocalDuration,
    /// Capacity of the active-test table.
    pub max_active_tests: usize,
    /// Capacity of the recent-nonce ring.
    pub max_recent_tests: usize,
    /// Per-IP, per-window new-test budget.
    pub max_per_ip: u32,
    /// Window the per-IP throttle counts against, and the period the
    /// embedding application should call `Coordinator::sweep` at.
    pub throttle_clean_time: LocalDuration,
    /// Interval between an Alice-role test's retransmissions (before the
    /// per-attempt backoff is added).
    pub resend_timeout: LocalDuration,
    /// Absolute ceiling on how long a locally-driven test may run before
    /// it is finalised and forgotten regardless of outcome.
    pub max_test_time: LocalDuration,
    /// How recently a Charlie must have been an authenticated session peer
    /// for the known-Charlie short-circuit to trigger.
    pub charlie_recent_period: LocalDuration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_relayed_per_test_alice: 9,
            max_relayed_per_test_bob: 6,
            max_relayed_per_test_charlie: 6,
            max_charlie_lifetime: LocalDuration::from_secs(15),
            max_active_tests: 20,
            max_recent_tests: 40,
            max_per_ip: 12,
            throttle_clean_time: LocalDuration::from_mins(10),
            resend_timeout: LocalDuration::from_secs(4),
            max_test_time: LocalDuration::from_secs(30),
            charlie_recent_period: LocalDuration::from_mins(10),
        }
    }
}
