//! Encrypted object store
//!
//! Wraps a [`BlobStorageEffects`] backend so that it only ever sees
//! ciphertext. Each object gets a fresh 32 byte nonce which the caller keeps
//! with the object's metadata; the nonce and the master key together derive
//! the object key.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::{Stream, TryStreamExt};
use meme_core::config::MemeConfig;
use meme_core::{
    BlobStorageEffects, MasterKey, MemeError, ObjectId, ObjectNonce, RandomEffects, Result,
};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;

use crate::cipher::{ChunkEncryptor, SegmentDecryptor, StreamHeader, DEFAULT_CHUNK_SIZE};
use crate::kdf::derive_object_key;

/// Chunks of ciphertext buffer reserved up front
const PREALLOC_CHUNKS: u64 = 4;

#[derive(Debug, Clone, Copy)]
enum WriteMode {
    Replace,
    CreateNew,
}

/// Outcome of a completed write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Where the ciphertext lives
    pub id: ObjectId,
    /// Plaintext length
    pub plaintext_len: u64,
    /// Bytes handed to the backend
    pub stored_len: u64,
    /// Content type recorded by the caller
    pub content_type: String,
}

/// A content-addressed upload whose encrypted write runs in the background
#[derive(Debug)]
pub struct Ingested {
    /// Content address of the plaintext
    pub id: ObjectId,
    /// Nonce the caller must persist alongside the object
    pub nonce: ObjectNonce,
    /// Background write
    pub write: JoinHandle<Result<StoredObject>>,
}

/// Store that encrypts on the way in and authenticates on the way out
#[derive(Clone)]
pub struct EncryptedObjectStore {
    backend: Arc<dyn BlobStorageEffects>,
    random: Arc<dyn RandomEffects>,
    master_key: Arc<MasterKey>,
    header: StreamHeader,
}

impl std::fmt::Debug for EncryptedObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedObjectStore")
            .field("backend", &self.backend.backend_type())
            .field("chunk_size", &self.header.chunk_size())
            .finish_non_exhaustive()
    }
}

impl EncryptedObjectStore {
    /// Store over `backend` using the default chunk size
    pub fn new(
        backend: Arc<dyn BlobStorageEffects>,
        random: Arc<dyn RandomEffects>,
        master_key: MasterKey,
    ) -> Result<Self> {
        Ok(Self {
            backend,
            random,
            master_key: Arc::new(master_key),
            header: StreamHeader::new(DEFAULT_CHUNK_SIZE)?,
        })
    }

    /// Store built from the `storage` config section
    pub fn from_config(config: &MemeConfig, random: Arc<dyn RandomEffects>) -> Result<Self> {
        let backend = meme_effects::build_storage(&config.storage)?;
        let store = Self::new(backend, random, config.master_key()?)?;
        tracing::info!(backend = store.backend.backend_type(), "encrypted object store ready");
        Ok(store)
    }

    /// Plaintext bytes per stored segment for new writes
    pub fn with_chunk_size(mut self, chunk_size: u32) -> Result<Self> {
        self.header = StreamHeader::new(chunk_size)?;
        Ok(self)
    }

    /// Content address of `content`
    pub fn content_id(content: &[u8]) -> ObjectId {
        ObjectId::for_content(content)
    }

    /// Fresh random nonce for a new object
    pub async fn gen_nonce(&self) -> ObjectNonce {
        ObjectNonce::from_bytes(self.random.random_bytes_32().await)
    }

    /// Encrypt exactly `length` bytes from `reader` and store them under `id`,
    /// replacing any previous object.
    ///
    /// Input shorter or longer than `length` is rejected and nothing is written.
    pub async fn put<R>(
        &self,
        id: &ObjectId,
        reader: R,
        length: u64,
        content_type: &str,
        nonce: &ObjectNonce,
    ) -> Result<StoredObject>
    where
        R: AsyncRead + Unpin,
    {
        self.write(id, reader, length, content_type, nonce, WriteMode::Replace)
            .await
    }

    async fn write<R>(
        &self,
        id: &ObjectId,
        mut reader: R,
        length: u64,
        content_type: &str,
        nonce: &ObjectNonce,
        mode: WriteMode,
    ) -> Result<StoredObject>
    where
        R: AsyncRead + Unpin,
    {
        let stored_len = self.header.ciphertext_len(length)?;
        let key = derive_object_key(&self.master_key, nonce)?;
        let mut encryptor = ChunkEncryptor::new(&key, self.header);

        // `length` comes from the client; let the buffer grow with what is
        // actually read.
        let chunk_size = u64::from(self.header.chunk_size());
        let initial = stored_len.min(chunk_size * PREALLOC_CHUNKS);
        let mut out = Vec::with_capacity(usize::try_from(initial).unwrap_or(0));
        out.extend_from_slice(&encryptor.header());

        let mut buf = vec![0u8; self.header.chunk_size() as usize];
        let mut remaining = length;

        while remaining > chunk_size {
            read_chunk(&mut reader, &mut buf, length - remaining, length).await?;
            out.extend(encryptor.encrypt_chunk(&buf)?);
            remaining -= chunk_size;
        }
        let last = &mut buf[..remaining as usize];
        read_chunk(&mut reader, last, length - remaining, length).await?;
        out.extend(encryptor.finish(last)?);

        let mut extra = [0u8; 1];
        if reader.read(&mut extra).await? != 0 {
            return Err(MemeError::invalid(format!(
                "upload is longer than the declared {length} bytes"
            )));
        }

        match mode {
            WriteMode::Replace => self.backend.put(id.as_str(), out).await?,
            WriteMode::CreateNew => self.backend.put_new(id.as_str(), out).await?,
        }
        tracing::debug!(object_id = %id, length, stored_len, content_type, "object stored");

        Ok(StoredObject {
            id: id.clone(),
            plaintext_len: length,
            stored_len,
            content_type: content_type.to_string(),
        })
    }

    /// [`Self::put`] for an in-memory body
    pub async fn put_bytes(
        &self,
        id: &ObjectId,
        content: &[u8],
        content_type: &str,
        nonce: &ObjectNonce,
    ) -> Result<StoredObject> {
        self.put(id, content, content.len() as u64, content_type, nonce)
            .await
    }

    /// Encrypt and store in a background task
    pub fn spawn_put(
        &self,
        id: ObjectId,
        content: Vec<u8>,
        content_type: String,
        nonce: ObjectNonce,
    ) -> JoinHandle<Result<StoredObject>> {
        let store = self.clone();
        tokio::spawn(async move {
            let result = store.put_bytes(&id, &content, &content_type, &nonce).await;
            if let Err(err) = &result {
                tracing::warn!(object_id = %id, error = %err, "background write failed");
            }
            result
        })
    }

    /// Address `content`, pick its nonce, and write it in the background.
    ///
    /// The id and nonce are final as soon as this returns; the caller can
    /// record them before the write completes. Content that is already stored
    /// is a [`MemeError::Conflict`]: the stored object stays readable under
    /// the nonce it was first written with. When two ingests of the same
    /// content race, the backend keeps the first write and the other's
    /// `write` handle resolves to `Conflict`.
    pub async fn ingest(&self, content: Vec<u8>, content_type: &str) -> Result<Ingested> {
        let id = Self::content_id(&content);
        if self.backend.exists(id.as_str()).await? {
            tracing::debug!(object_id = %id, "content already stored");
            return Err(MemeError::conflict(format!("object {id}")));
        }

        let nonce = self.gen_nonce().await;
        let store = self.clone();
        let content_type = content_type.to_string();
        let write = {
            let id = id.clone();
            tokio::spawn(async move {
                let result = store
                    .write(
                        &id,
                        &content[..],
                        content.len() as u64,
                        &content_type,
                        &nonce,
                        WriteMode::CreateNew,
                    )
                    .await;
                if let Err(err) = &result {
                    tracing::warn!(object_id = %id, error = %err, "background write failed");
                }
                result
            })
        };
        Ok(Ingested { id, nonce, write })
    }

    /// Fetch and start decrypting `id`.
    ///
    /// The first segment is authenticated before this returns, so a wrong
    /// nonce or a corrupt header surfaces here rather than mid-stream.
    pub async fn get(&self, id: &ObjectId, nonce: &ObjectNonce) -> Result<ObjectStream> {
        let stored = self.backend.get(id.as_str()).await?;
        let key = derive_object_key(&self.master_key, nonce)?;

        let mut segments = SegmentDecryptor::new(&key, stored).map_err(|err| {
            tracing::warn!(object_id = %id, "stored object header rejected");
            err
        })?;
        let first = match segments.next_segment() {
            Some(Ok(chunk)) => chunk,
            Some(Err(err)) => {
                tracing::warn!(object_id = %id, "object failed authentication");
                return Err(err);
            }
            None => Vec::new(),
        };

        Ok(ObjectStream {
            id: id.clone(),
            first: Some(first),
            segments,
        })
    }

    /// Fetch and fully decrypt `id`
    pub async fn get_bytes(&self, id: &ObjectId, nonce: &ObjectNonce) -> Result<Vec<u8>> {
        let mut stream = self.get(id, nonce).await?;
        let mut plaintext = Vec::new();
        while let Some(chunk) = stream.try_next().await? {
            plaintext.extend(chunk);
        }
        Ok(plaintext)
    }

    /// Remove `id` from the backend
    pub async fn delete(&self, id: &ObjectId) -> Result<()> {
        self.backend.delete(id.as_str()).await?;
        tracing::debug!(object_id = %id, "object deleted");
        Ok(())
    }

    /// Stored ids starting with `prefix`
    pub async fn list(&self, prefix: &str) -> Result<Vec<ObjectId>> {
        let ids = self.backend.list(prefix).await?;
        Ok(ids.into_iter().map(ObjectId::new).collect())
    }
}

async fn read_chunk<R>(reader: &mut R, buf: &mut [u8], offset: u64, length: u64) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    match reader.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
            Err(MemeError::invalid(format!(
                "upload ended before the declared {length} bytes (at chunk offset {offset})"
            )))
        }
        Err(err) => Err(err.into()),
    }
}

/// Decrypted plaintext of one object, one segment per item.
///
/// Segments after the first are decrypted as the stream is polled. The first
/// failure is yielded as [`MemeError::Integrity`] and ends the stream.
pub struct ObjectStream {
    id: ObjectId,
    first: Option<Vec<u8>>,
    segments: SegmentDecryptor,
}

impl std::fmt::Debug for ObjectStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStream")
            .field("id", &self.id)
            .field("done", &(self.first.is_none() && self.segments.is_done()))
            .finish()
    }
}

impl ObjectStream {
    /// Object being read
    pub fn id(&self) -> &ObjectId {
        &self.id
    }

    fn next_chunk(&mut self) -> Option<Result<Vec<u8>>> {
        if let Some(first) = self.first.take() {
            return Some(Ok(first));
        }
        let next = self.segments.next_segment();
        if let Some(Err(_)) = &next {
            tracing::warn!(object_id = %self.id, "object segment failed authentication");
        }
        next
    }
}

impl Stream for ObjectStream {
    type Item = Result<Vec<u8>>;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Poll::Ready(self.next_chunk())
    }
}
