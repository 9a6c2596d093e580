//! Real time effect handler for production use

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use meme_core::effects::PhysicalTimeEffects;

/// Wall-clock handler backed by `SystemTime`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeHandler;

impl SystemTimeHandler {
    /// Create a new system time handler
    pub fn new() -> Self {
        Self
    }
}

impl PhysicalTimeEffects for SystemTimeHandler {
    fn now_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs()
    }
}
