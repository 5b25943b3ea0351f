//! Test-only doubles for the external collaborators.
pub mod mock;
