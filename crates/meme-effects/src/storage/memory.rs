//! In-memory blob storage handler for testing

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use meme_core::effects::{BlobStorageEffects, StorageError};
use tokio::sync::RwLock;

/// In-memory blob storage; clones share contents
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    data: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryBlobStore {
    /// Create an empty memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a stored blob in place, for corruption tests
    pub async fn tamper<F>(&self, id: &str, f: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut Vec<u8>),
    {
        let mut data = self.data.write().await;
        let blob = data.get_mut(id).ok_or_else(|| StorageError::NotFound {
            id: id.to_string(),
        })?;
        f(blob);
        Ok(())
    }
}

#[async_trait]
impl BlobStorageEffects for MemoryBlobStore {
    async fn put(&self, id: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        if id.is_empty() {
            return Err(StorageError::InvalidId {
                reason: "Id cannot be empty".to_string(),
            });
        }
        self.data.write().await.insert(id.to_string(), bytes);
        Ok(())
    }

    async fn put_new(&self, id: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        if id.is_empty() {
            return Err(StorageError::InvalidId {
                reason: "Id cannot be empty".to_string(),
            });
        }
        match self.data.write().await.entry(id.to_string()) {
            Entry::Occupied(_) => Err(StorageError::AlreadyExists { id: id.to_string() }),
            Entry::Vacant(slot) => {
                slot.insert(bytes);
                Ok(())
            }
        }
    }

    async fn exists(&self, id: &str) -> Result<bool, StorageError> {
        Ok(self.data.read().await.contains_key(id))
    }

    async fn get(&self, id: &str) -> Result<Vec<u8>, StorageError> {
        self.data
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound { id: id.to_string() })
    }

    async fn delete(&self, id: &str) -> Result<(), StorageError> {
        self.data
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound { id: id.to_string() })
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let data = self.data.read().await;
        Ok(data
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}
