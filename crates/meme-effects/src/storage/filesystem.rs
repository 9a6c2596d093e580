//! Local filesystem blob storage handler
//!
//! Blobs are stored one file per id directly under the base directory:
//! - ids are validated so they can never escape the base directory
//! - each write goes to its own temp file, is synced, then atomically renamed
//! - files are created owner read/write only
//!
//! The handler stores whatever bytes it is given. Encryption happens in the
//! object store above it.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use meme_core::effects::{BlobStorageEffects, StorageError};
use tokio::fs;
use tracing::{debug, info};

const TEMP_PREFIX: &str = ".meme-";
const TEMP_SUFFIX: &str = ".tmp";
const MAX_ID_LEN: usize = 255;

#[cfg(unix)]
const FILE_MODE: u32 = 0o600;
#[cfg(unix)]
const DIR_MODE: u32 = 0o700;

/// Blob storage rooted at a local directory
#[derive(Debug, Clone)]
pub struct FilesystemBlobStore {
    base_path: PathBuf,
}

impl FilesystemBlobStore {
    /// Open (creating if needed) a blob store rooted at `base_path`
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let base_path = base_path.into();
        std::fs::create_dir_all(&base_path).map_err(|e| StorageError::ConfigurationError {
            reason: format!("Failed to create storage directory: {e}"),
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&base_path, std::fs::Permissions::from_mode(DIR_MODE))
                .map_err(|e| StorageError::ConfigurationError {
                    reason: format!("Failed to set directory permissions: {e}"),
                })?;
        }

        info!(path = ?base_path, "initialized filesystem blob storage");
        Ok(Self { base_path })
    }

    /// Root directory of this store
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn validate_id(id: &str) -> Result<(), StorageError> {
        if id.is_empty() {
            return Err(StorageError::InvalidId {
                reason: "Id cannot be empty".to_string(),
            });
        }
        if id.len() > MAX_ID_LEN {
            return Err(StorageError::InvalidId {
                reason: format!("Id too long (max {MAX_ID_LEN} characters)"),
            });
        }
        if id == "."
            || id.contains("..")
            || id.contains('/')
            || id.contains('\\')
            || id.contains('\0')
            || id.ends_with(TEMP_SUFFIX)
        {
            return Err(StorageError::InvalidId {
                reason: "Id contains invalid characters".to_string(),
            });
        }
        Ok(())
    }

    fn id_to_path(&self, id: &str) -> Result<PathBuf, StorageError> {
        Self::validate_id(id)?;
        Ok(self.base_path.join(id))
    }

    /// Write `data` to a fresh temp file in the base directory, sync it, then
    /// move it over `path`. Every call gets its own temp file, so concurrent
    /// writes to one id never share an inode.
    async fn write_atomic(
        &self,
        path: PathBuf,
        data: Vec<u8>,
        replace: bool,
    ) -> Result<(), StorageError> {
        let base_path = self.base_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut temp = tempfile::Builder::new()
                .prefix(TEMP_PREFIX)
                .suffix(TEMP_SUFFIX)
                .tempfile_in(&base_path)
                .map_err(|e| StorageError::WriteFailed(format!("Failed to create temp file: {e}")))?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                temp.as_file()
                    .set_permissions(std::fs::Permissions::from_mode(FILE_MODE))
                    .map_err(|e| {
                        StorageError::WriteFailed(format!("Failed to set permissions: {e}"))
                    })?;
            }

            temp.write_all(&data)
                .map_err(|e| StorageError::WriteFailed(format!("Failed to write data: {e}")))?;
            temp.as_file()
                .sync_all()
                .map_err(|e| StorageError::WriteFailed(format!("Failed to sync: {e}")))?;

            let persisted = if replace {
                temp.persist(&path)
            } else {
                temp.persist_noclobber(&path)
            };
            match persisted {
                Ok(_) => Ok(()),
                Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
                    Err(StorageError::AlreadyExists {
                        id: path
                            .file_name()
                            .map(|name| name.to_string_lossy().into_owned())
                            .unwrap_or_default(),
                    })
                }
                Err(e) => Err(StorageError::WriteFailed(format!(
                    "Failed to move temp file into place: {}",
                    e.error
                ))),
            }
        })
        .await
        .map_err(|e| StorageError::WriteFailed(format!("Write task failed: {e}")))?
    }
}

#[async_trait]
impl BlobStorageEffects for FilesystemBlobStore {
    async fn put(&self, id: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        let path = self.id_to_path(id)?;
        let size = bytes.len();
        self.write_atomic(path, bytes, true).await?;
        debug!(object_id = %id, size, "stored blob");
        Ok(())
    }

    async fn put_new(&self, id: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        let path = self.id_to_path(id)?;
        let size = bytes.len();
        self.write_atomic(path, bytes, false).await?;
        debug!(object_id = %id, size, "stored new blob");
        Ok(())
    }

    async fn exists(&self, id: &str) -> Result<bool, StorageError> {
        let path = self.id_to_path(id)?;
        fs::try_exists(&path)
            .await
            .map_err(|e| StorageError::ReadFailed(format!("Failed to stat blob: {e}")))
    }

    async fn get(&self, id: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.id_to_path(id)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound {
                id: id.to_string(),
            }),
            Err(e) => Err(StorageError::ReadFailed(format!("Failed to read blob: {e}"))),
        }
    }

    async fn delete(&self, id: &str) -> Result<(), StorageError> {
        let path = self.id_to_path(id)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(object_id = %id, "removed blob");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound {
                id: id.to_string(),
            }),
            Err(e) => Err(StorageError::DeleteFailed(format!("Failed to remove blob: {e}"))),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut ids = Vec::new();
        let mut read_dir = fs::read_dir(&self.base_path)
            .await
            .map_err(|e| StorageError::ListFailed(format!("Failed to read directory: {e}")))?;

        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| StorageError::ListFailed(format!("Failed to read entry: {e}")))?
        {
            let Ok(file_type) = entry.file_type().await else {
                continue;
            };
            if !file_type.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if name.starts_with(prefix) && !name.ends_with(TEMP_SUFFIX) {
                    ids.push(name.to_string());
                }
            }
        }

        ids.sort();
        Ok(ids)
    }

    fn backend_type(&self) -> &'static str {
        "filesystem"
    }
}
