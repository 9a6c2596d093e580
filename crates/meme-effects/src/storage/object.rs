//! Object storage blob handler
//!
//! Keeps one object per id under an optional key prefix in any
//! [`ObjectStore`]. Production builds an S3 client from [`S3Config`]; tests
//! run the same code against the crate's in-memory store.

use std::sync::Arc;

use async_trait::async_trait;
use futures::TryStreamExt;
use meme_core::config::S3Config;
use meme_core::effects::{BlobStorageEffects, StorageError};
use object_store::aws::{AmazonS3Builder, S3ConditionalPut};
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutMode, PutOptions, PutPayload};
use tracing::{debug, info};

/// Blob storage in an object store bucket
#[derive(Debug, Clone)]
pub struct ObjectBlobStore {
    store: Arc<dyn ObjectStore>,
    root: Option<ObjectPath>,
    name: &'static str,
}

impl ObjectBlobStore {
    /// Wrap `store`, keeping every object under `prefix`
    pub fn new(store: Arc<dyn ObjectStore>, prefix: &str, name: &'static str) -> Self {
        let root = ObjectPath::from(prefix);
        let root = (!root.as_ref().is_empty()).then_some(root);
        Self { store, root, name }
    }

    /// S3 (or S3-compatible) bucket from configuration.
    ///
    /// No request is made here; credentials fall back to the ambient AWS
    /// provider chain when no key pair is configured.
    pub fn s3(config: &S3Config) -> Result<Self, StorageError> {
        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(&config.bucket)
            .with_region(&config.region)
            .with_conditional_put(S3ConditionalPut::ETagMatch);
        if let (Some(key), Some(secret)) = (&config.access_key, &config.secret_key) {
            builder = builder
                .with_access_key_id(key)
                .with_secret_access_key(secret);
        }
        if let Some(endpoint) = &config.endpoint {
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(endpoint.starts_with("http://"));
        }
        let s3 = builder.build().map_err(|e| StorageError::ConfigurationError {
            reason: format!("Failed to configure S3 client: {e}"),
        })?;

        info!(bucket = %config.bucket, region = %config.region, "initialized S3 blob storage");
        Ok(Self::new(Arc::new(s3), &config.prefix, "s3"))
    }

    fn key(&self, id: &str) -> Result<ObjectPath, StorageError> {
        if id.is_empty() || id.contains('/') {
            return Err(StorageError::InvalidId {
                reason: format!("Id must be a single non-empty path segment: {id:?}"),
            });
        }
        Ok(match &self.root {
            Some(root) => root.child(id),
            None => ObjectPath::from_iter([id]),
        })
    }

    /// Id of a listed key directly under the root
    fn id_of(&self, location: &ObjectPath) -> Option<String> {
        let mut parts: Vec<_> = match &self.root {
            Some(root) => location.prefix_match(root)?.collect(),
            None => location.parts().collect(),
        };
        match parts.len() {
            1 => parts.pop().map(|part| part.as_ref().to_string()),
            _ => None,
        }
    }
}

fn not_found_or(id: &str, err: object_store::Error, wrap: fn(String) -> StorageError) -> StorageError {
    match err {
        object_store::Error::NotFound { .. } => StorageError::NotFound { id: id.to_string() },
        other => wrap(other.to_string()),
    }
}

#[async_trait]
impl BlobStorageEffects for ObjectBlobStore {
    async fn put(&self, id: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        let key = self.key(id)?;
        let size = bytes.len();
        self.store
            .put(&key, PutPayload::from(bytes))
            .await
            .map_err(|e| StorageError::WriteFailed(e.to_string()))?;
        debug!(object_id = %id, size, "stored blob");
        Ok(())
    }

    async fn put_new(&self, id: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        let key = self.key(id)?;
        let size = bytes.len();
        let opts = PutOptions {
            mode: PutMode::Create,
            ..PutOptions::default()
        };
        match self.store.put_opts(&key, PutPayload::from(bytes), opts).await {
            Ok(_) => {
                debug!(object_id = %id, size, "stored new blob");
                Ok(())
            }
            Err(object_store::Error::AlreadyExists { .. } | object_store::Error::Precondition { .. }) => {
                Err(StorageError::AlreadyExists { id: id.to_string() })
            }
            Err(e) => Err(StorageError::WriteFailed(e.to_string())),
        }
    }

    async fn exists(&self, id: &str) -> Result<bool, StorageError> {
        let key = self.key(id)?;
        match self.store.head(&key).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::ReadFailed(e.to_string())),
        }
    }

    async fn get(&self, id: &str) -> Result<Vec<u8>, StorageError> {
        let key = self.key(id)?;
        let result = self
            .store
            .get(&key)
            .await
            .map_err(|e| not_found_or(id, e, StorageError::ReadFailed))?;
        let bytes = result
            .bytes()
            .await
            .map_err(|e| not_found_or(id, e, StorageError::ReadFailed))?;
        Ok(bytes.to_vec())
    }

    async fn delete(&self, id: &str) -> Result<(), StorageError> {
        // Object stores delete missing keys silently
        if !self.exists(id).await? {
            return Err(StorageError::NotFound { id: id.to_string() });
        }
        let key = self.key(id)?;
        self.store
            .delete(&key)
            .await
            .map_err(|e| not_found_or(id, e, StorageError::DeleteFailed))?;
        debug!(object_id = %id, "removed blob");
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let metas: Vec<_> = self
            .store
            .list(self.root.as_ref())
            .try_collect()
            .await
            .map_err(|e| StorageError::ListFailed(e.to_string()))?;

        let mut ids: Vec<String> = metas
            .iter()
            .filter_map(|meta| self.id_of(&meta.location))
            .filter(|id| id.starts_with(prefix))
            .collect();
        ids.sort();
        Ok(ids)
    }

    fn backend_type(&self) -> &'static str {
        self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use object_store::memory::InMemory;

    fn bucket(prefix: &str) -> (Arc<InMemory>, ObjectBlobStore) {
        let inner = Arc::new(InMemory::new());
        let store = ObjectBlobStore::new(inner.clone(), prefix, "memory-object");
        (inner, store)
    }

    #[tokio::test]
    async fn test_object_store_contract() {
        let (_inner, store) = bucket("");
        store.put("abc", b"ciphertext".to_vec()).await.unwrap();
        assert_eq!(store.get("abc").await.unwrap(), b"ciphertext");
        assert!(store.exists("abc").await.unwrap());

        store.put("abc", b"replaced".to_vec()).await.unwrap();
        assert_eq!(store.get("abc").await.unwrap(), b"replaced");

        store.delete("abc").await.unwrap();
        assert!(!store.exists("abc").await.unwrap());
        assert_matches!(store.get("abc").await, Err(StorageError::NotFound { .. }));
        assert_matches!(store.delete("abc").await, Err(StorageError::NotFound { .. }));
        assert_matches!(store.put("a/b", vec![1]).await, Err(StorageError::InvalidId { .. }));
    }

    #[tokio::test]
    async fn test_put_new_refuses_existing_key() {
        let (_inner, store) = bucket("");
        store.put_new("once", vec![1]).await.unwrap();
        assert_matches!(
            store.put_new("once", vec![2]).await,
            Err(StorageError::AlreadyExists { .. })
        );
        assert_eq!(store.get("once").await.unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_list_stays_under_prefix() {
        let (inner, store) = bucket("memes");
        store.put("img_b", vec![1]).await.unwrap();
        store.put("img_a", vec![2]).await.unwrap();
        store.put("doc_a", vec![3]).await.unwrap();
        inner
            .put(&ObjectPath::from("other/img_z"), PutPayload::from(vec![4]))
            .await
            .unwrap();
        inner
            .put(&ObjectPath::from("memes/nested/img_y"), PutPayload::from(vec![5]))
            .await
            .unwrap();

        assert_eq!(store.list("img_").await.unwrap(), vec!["img_a", "img_b"]);
        assert_eq!(store.list("").await.unwrap().len(), 3);
        assert!(inner.head(&ObjectPath::from("memes/img_a")).await.is_ok());
    }

    #[test]
    fn test_s3_client_builds_offline() {
        let config = S3Config {
            endpoint: Some("http://127.0.0.1:9000".to_string()),
            access_key: Some("minio".to_string()),
            secret_key: Some("minio-secret".to_string()),
            prefix: "memes".to_string(),
            ..S3Config::default()
        };
        let store = ObjectBlobStore::s3(&config).unwrap();
        assert_eq!(store.backend_type(), "s3");
    }
}
