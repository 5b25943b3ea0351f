//! Clock collaborator.
//!
//! The coordinator never reads wall-clock time itself: every entry point
//! takes the current time as a `LocalTime` parameter, supplied by the
//! embedding application's own clock. This mirrors how `nakamoto_net`
//! drives a service (`Service::tick(time)`) and keeps the coordinator
//! trivially testable with a fake, manually-advanced clock.
pub use nakamoto_net::{LocalDuration, LocalTime};
