//! Effect interfaces (no implementations)
//!
//! Handlers for these traits live in `meme-effects` and are chosen once at
//! startup, then injected into each component.

pub mod random;
pub mod storage;
pub mod time;

pub use random::RandomEffects;
pub use storage::{BlobStorageEffects, StorageError};
pub use time::PhysicalTimeEffects;
