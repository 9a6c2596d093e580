//! Encrypted store over an in-memory backend

use std::sync::Arc;

use meme_core::MasterKey;
use meme_effects::{MemoryBlobStore, MockRandomHandler};
use meme_store::EncryptedObjectStore;

/// Master key used by store fixtures
pub const TEST_MASTER_KEY: [u8; 32] = [0x5a; 32];

/// Store plus a handle on the raw backend for corruption tests
#[derive(Debug, Clone)]
pub struct MemoryStoreFixture {
    /// Store under test
    pub store: EncryptedObjectStore,
    /// Backend holding the ciphertext
    pub backend: MemoryBlobStore,
}

/// Encrypted store with deterministic nonces over fresh memory
pub fn memory_store(seed: u64) -> MemoryStoreFixture {
    let backend = MemoryBlobStore::new();
    let store = EncryptedObjectStore::new(
        Arc::new(backend.clone()),
        Arc::new(MockRandomHandler::new(seed)),
        MasterKey::from_bytes(TEST_MASTER_KEY),
    )
    .expect("default chunk size is valid");
    MemoryStoreFixture { store, backend }
}
