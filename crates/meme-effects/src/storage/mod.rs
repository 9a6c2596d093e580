//! Blob storage handlers and backend selection

pub mod filesystem;
pub mod memory;
pub mod object;

use std::sync::Arc;

use meme_core::config::{StorageConfig, StorageMode};
use meme_core::effects::{BlobStorageEffects, StorageError};

pub use filesystem::FilesystemBlobStore;
pub use memory::MemoryBlobStore;
pub use object::ObjectBlobStore;

/// Build the backend selected by configuration.
///
/// Called once at startup; the encrypted store only ever sees the trait.
pub fn build_storage(config: &StorageConfig) -> Result<Arc<dyn BlobStorageEffects>, StorageError> {
    let backend: Arc<dyn BlobStorageEffects> = match config.mode {
        StorageMode::Local => Arc::new(FilesystemBlobStore::new(&config.local_dir)?),
        StorageMode::Memory => Arc::new(MemoryBlobStore::new()),
        StorageMode::S3 => Arc::new(ObjectBlobStore::s3(&config.s3)?),
    };
    tracing::info!(backend = backend.backend_type(), "selected blob storage backend");
    Ok(backend)
}
