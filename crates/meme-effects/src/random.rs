//! Random byte handlers
//!
//! The OS handler is the only place in the workspace that touches the
//! process CSPRNG; everything else receives bytes through `RandomEffects`.
#![allow(clippy::disallowed_methods)]

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use meme_core::effects::RandomEffects;
use rand::rngs::OsRng;
use rand::RngCore;

/// Cryptographically secure randomness from the operating system
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandomHandler;

impl OsRandomHandler {
    /// Create a new OS random handler
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RandomEffects for OsRandomHandler {
    async fn random_bytes_32(&self) -> [u8; 32] {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        bytes
    }
}

/// Deterministic counter-based bytes for tests.
///
/// Each call yields a distinct value derived from `seed` and an internal
/// counter. Never use outside tests.
#[derive(Debug, Default)]
pub struct MockRandomHandler {
    seed: u64,
    counter: AtomicU64,
}

impl MockRandomHandler {
    /// Create a mock handler with the given seed
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            counter: AtomicU64::new(0),
        }
    }

    fn next_block(&self) -> [u8; 8] {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        self.seed.wrapping_mul(0x9E37_79B9_7F4A_7C15).wrapping_add(n).to_be_bytes()
    }
}

#[async_trait]
impl RandomEffects for MockRandomHandler {
    async fn random_bytes_32(&self) -> [u8; 32] {
        let block = self.next_block();
        let mut bytes = [0u8; 32];
        for chunk in bytes.chunks_mut(8) {
            chunk.copy_from_slice(&block);
        }
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_os_random_is_not_constant() {
        let rng = OsRandomHandler::new();
        assert_ne!(rng.random_bytes_32().await, rng.random_bytes_32().await);
    }

    #[tokio::test]
    async fn test_mock_random_is_deterministic() {
        let a = MockRandomHandler::new(7);
        let b = MockRandomHandler::new(7);
        let first = a.random_bytes_32().await;
        assert_eq!(first, b.random_bytes_32().await);
        assert_ne!(first, a.random_bytes_32().await);
    }
}
