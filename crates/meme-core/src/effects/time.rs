//! Physical time interface
//!
//! Verification code never reads the wall clock directly. Components take a
//! `PhysicalTimeEffects` handler so that challenge windows, access-term
//! expiry and caveat timeouts can be driven by simulated time in tests.
//!
//! Implementations live in `meme-effects`.

use std::sync::Arc;

/// Wall-clock time in whole unix seconds
pub trait PhysicalTimeEffects: Send + Sync {
    /// Current unix timestamp in seconds
    fn now_secs(&self) -> u64;
}

impl<T: PhysicalTimeEffects + ?Sized> PhysicalTimeEffects for Arc<T> {
    fn now_secs(&self) -> u64 {
        (**self).now_secs()
    }
}

impl<T: PhysicalTimeEffects + ?Sized> PhysicalTimeEffects for &T {
    fn now_secs(&self) -> u64 {
        (**self).now_secs()
    }
}
