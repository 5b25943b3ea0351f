//! Test nonce: the correlation id a local test and its replies share.
use crate::Rng;

pub type Nonce = u32;

/// Largest value a nonce can take: drawn uniformly from the full `u32`
/// range.
pub const MAX_NONCE: Nonce = u32::MAX;

pub fn random_nonce(rng: &mut Rng) -> Nonce {
    rng.u32(..)
}
