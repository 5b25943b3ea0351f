//! Counters the dispatcher bumps alongside its `log::warn!`/`log::debug!`
//! calls. Exposed read-only; nothing in the coordinator branches on these
//! values, they exist purely for observability.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    /// Packets dropped for carrying an invalid, blocklisted or too-close
    /// source/test IP.
    pub test_bad_ip: u64,
    /// Local tests aborted early because the replying Charlie turned out to
    /// be a peer with a recent session.
    pub status_known_charlie: u64,
    /// New-test creations refused by the per-IP throttle.
    pub throttled: u64,
    /// New-test creations refused because the active-test table was full.
    pub table_full: u64,
    /// Packets dropped because they came from a peer not party to the
    /// referenced test (the "fourth party" guard).
    pub fourth_party: u64,
}
