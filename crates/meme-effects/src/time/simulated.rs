//! Simulated time effect handler for testing

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use meme_core::effects::PhysicalTimeEffects;

/// Manually driven clock for tests and simulation.
///
/// Clones share the same underlying time, so a test can hold one handle
/// while the component under test holds another.
#[derive(Debug, Clone, Default)]
pub struct SimulatedTimeHandler {
    current_secs: Arc<AtomicU64>,
}

impl SimulatedTimeHandler {
    /// Create a simulated clock starting at `start_secs`
    pub fn new(start_secs: u64) -> Self {
        Self {
            current_secs: Arc::new(AtomicU64::new(start_secs)),
        }
    }

    /// Advance simulated time by `secs`
    pub fn advance(&self, secs: u64) {
        self.current_secs.fetch_add(secs, Ordering::SeqCst);
    }

    /// Set the absolute simulated time
    pub fn set_time(&self, secs: u64) {
        self.current_secs.store(secs, Ordering::SeqCst);
    }
}

impl PhysicalTimeEffects for SimulatedTimeHandler {
    fn now_secs(&self) -> u64 {
        self.current_secs.load(Ordering::SeqCst)
    }
}
