//! Peer reachability test coordinator: a three-party UDP NAT-reachability
//! protocol state machine (Alice/Bob/Charlie) for a P2P overlay node.
//!
//! The coordinator never touches sockets, the clock, the RNG seed, routing
//! tables or cryptography directly — it consumes those through the
//! collaborator traits in [`transport`] and produces its effects (packets
//! to send, timers to schedule, verdicts to report) as an [`Io`] queue the
//! embedding application drains.
#[macro_use]
extern crate amplify;

pub mod clock;
pub mod config;
pub mod logger;
pub mod nonce;
pub mod reactor;
pub mod record;
pub mod ring;
pub mod service;
pub mod stats;
pub mod table;
pub mod throttle;
pub mod transport;
pub mod verdict;
pub mod wire;

#[cfg(any(test, feature = "test"))]
pub mod test;

pub use clock::{LocalDuration, LocalTime};
pub use config::Config;
pub use reactor::{Io, TimerEvent};
pub use record::{Role, TestRecord};
pub use service::Coordinator;
pub use stats::Stats;
pub use transport::{IntroKey, PacketBuilder, PeerSession, RouterInfo, SessionKey, Transport, UdpAddress};
pub use verdict::Reachability;
pub use wire::{DecodeError, Packet, TestPayload};

/// The RNG used for nonce generation: a concrete type, not a trait, same
/// as every other `fastrand`-based component in this codebase.
pub type Rng = fastrand::Rng;

pub mod prelude {
    pub use crate::clock::{LocalDuration, LocalTime};
    pub use crate::config::Config;
    pub use crate::nonce::{Nonce, MAX_NONCE};
    pub use crate::reactor::{Io, TimerEvent};
    pub use crate::record::{Role, TestRecord};
    pub use crate::service::Coordinator;
    pub use crate::stats::Stats;
    pub use crate::transport::{
        IntroKey, PacketBuilder, PeerSession, RouterInfo, SessionKey, Transport, UdpAddress,
    };
    pub use crate::verdict::Reachability;
    pub use crate::Rng;
}
