//! Randomness interface

use async_trait::async_trait;

/// Source of cryptographically secure random bytes
#[async_trait]
pub trait RandomEffects: Send + Sync {
    /// Fill a fresh 32-byte array
    async fn random_bytes_32(&self) -> [u8; 32];
}
