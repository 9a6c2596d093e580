//! Blob storage interface
//!
//! The backing store only ever sees ciphertext. It exposes the narrow
//! put/get/delete/list contract so that the local filesystem and an object
//! storage service can be swapped at startup without touching the encrypted
//! store above it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::MemeError;

/// Errors raised by storage handlers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum StorageError {
    /// No blob stored under the id
    #[error("Blob not found: {id}")]
    NotFound {
        /// Requested id
        id: String,
    },

    /// Id is empty, too long, or would escape the storage root
    #[error("Invalid blob id: {reason}")]
    InvalidId {
        /// Why the id was rejected
        reason: String,
    },

    /// A blob is already stored under the id
    #[error("Blob already exists: {id}")]
    AlreadyExists {
        /// Conflicting id
        id: String,
    },

    /// Write failed
    #[error("Write failed: {0}")]
    WriteFailed(String),

    /// Read failed
    #[error("Read failed: {0}")]
    ReadFailed(String),

    /// Delete failed
    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    /// Listing failed
    #[error("List failed: {0}")]
    ListFailed(String),

    /// Handler could not be configured
    #[error("Configuration error: {reason}")]
    ConfigurationError {
        /// What was wrong with the configuration
        reason: String,
    },
}

impl From<StorageError> for MemeError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { id } => MemeError::not_found(format!("object {id}")),
            StorageError::AlreadyExists { id } => MemeError::conflict(format!("object {id}")),
            StorageError::InvalidId { reason } => MemeError::invalid(reason),
            StorageError::ConfigurationError { reason } => MemeError::invalid(reason),
            other => MemeError::transport(other.to_string()),
        }
    }
}

/// Narrow blob store contract used by the encrypted object store
#[async_trait]
pub trait BlobStorageEffects: Send + Sync {
    /// Store `bytes` under `id`, replacing any previous blob
    async fn put(&self, id: &str, bytes: Vec<u8>) -> Result<(), StorageError>;

    /// Store `bytes` under `id` only if nothing is stored there yet.
    ///
    /// The existence check and the write are one atomic step; of two
    /// concurrent calls for the same id exactly one succeeds and the other
    /// fails with [`StorageError::AlreadyExists`].
    async fn put_new(&self, id: &str, bytes: Vec<u8>) -> Result<(), StorageError>;

    /// Whether a blob is stored under `id`
    async fn exists(&self, id: &str) -> Result<bool, StorageError>;

    /// Fetch the blob stored under `id`
    async fn get(&self, id: &str) -> Result<Vec<u8>, StorageError>;

    /// Remove the blob stored under `id`
    async fn delete(&self, id: &str) -> Result<(), StorageError>;

    /// Ids starting with `prefix`, sorted
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    /// Short backend name for logs
    fn backend_type(&self) -> &'static str;
}
