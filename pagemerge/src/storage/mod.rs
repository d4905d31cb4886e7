//! Scratch storage for uploaded files and merge output.
//!
//! Every file lives directly inside one root directory. Uploads are stored
//! under their [`FileId`], so the id of a file doubles as its storage key.
//! Keys handed in from outside (for example the file map of a merge request)
//! are only ever resolved inside the root: anything containing a path
//! separator or a parent-directory component is rejected.
//!
//! Writes are atomic: bytes go to a `.tmp` sibling first and are renamed into
//! place once flushed, so readers never observe a half-written file.

use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::document::FileId;
use crate::error::{PageMergeError, Result};

/// A file that has been written to scratch storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Id assigned to the upload.
    pub file_id: FileId,

    /// Key under which the bytes can be read back.
    pub key: String,

    /// Absolute location on disk.
    pub path: PathBuf,

    /// Number of bytes written.
    pub size: u64,
}

/// Directory-backed scratch storage.
#[derive(Debug, Clone)]
pub struct ScratchStorage {
    root: PathBuf,
}

impl ScratchStorage {
    /// Open scratch storage rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| PageMergeError::FailedToWrite {
                path: root.clone(),
                source: e,
            })?;
        Ok(Self { root })
    }

    /// Root directory of this storage.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store uploaded bytes under a freshly generated file id.
    pub async fn persist(&self, bytes: &[u8]) -> Result<StoredFile> {
        let file_id = FileId::generate();
        let key = file_id.to_string();
        let path = self.root.join(&key);

        self.write_atomic(&path, bytes).await?;
        debug!(file_id = %file_id, size = bytes.len(), "stored upload");

        Ok(StoredFile {
            file_id,
            key,
            path,
            size: bytes.len() as u64,
        })
    }

    /// Write merge output for delivery and return its location.
    ///
    /// The file name is prefixed with a random id so concurrent merges with
    /// the same output name never collide.
    pub async fn write_output(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let key = format!("out-{}-{}", FileId::generate(), file_name);
        let path = self.resolve(&key)?;
        self.write_atomic(&path, bytes).await?;
        Ok(path)
    }

    /// Resolve `key` to a path inside the storage root.
    ///
    /// # Errors
    ///
    /// Returns [`PageMergeError::InvalidStorageKey`] if the key is empty or
    /// could point outside the root.
    pub fn resolve(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key != "."
            && key != ".."
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

        if !valid {
            return Err(PageMergeError::InvalidStorageKey {
                key: key.to_string(),
            });
        }

        Ok(self.root.join(key))
    }

    /// Path of a stored upload.
    pub fn path_of(&self, file_id: &FileId) -> Result<PathBuf> {
        self.resolve(file_id.as_str())
    }

    /// Read the bytes stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`PageMergeError::UnknownFile`] if nothing is stored under the key.
    pub async fn read(&self, key: &str) -> Result<Bytes> {
        let path = self.resolve(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Bytes::from(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(PageMergeError::unknown_file(key))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Read a stored upload by file id.
    pub async fn read_file(&self, file_id: &FileId) -> Result<Bytes> {
        self.read(file_id.as_str()).await
    }

    /// Check whether something is stored under `key`.
    pub async fn exists(&self, key: &str) -> bool {
        match self.resolve(key) {
            Ok(path) => tokio::fs::metadata(path).await.is_ok(),
            Err(_) => false,
        }
    }

    /// Remove the file stored under `key` if it exists.
    ///
    /// Returns whether a file was removed.
    pub async fn remove(&self, key: &str) -> Result<bool> {
        let path = self.resolve(key)?;
        remove_if_exists(&path).await
    }

    /// Remove a file at an absolute path if it exists, logging failures.
    ///
    /// Used on cleanup paths where an error must not mask the original outcome.
    pub async fn discard(&self, path: &Path) {
        if let Err(e) = remove_if_exists(path).await {
            warn!(path = %path.display(), error = %e, "failed to remove scratch file");
        }
    }

    /// Write `bytes` to a sibling temp file and rename it over `path`.
    ///
    /// The temp file is removed again if any step after its creation fails.
    async fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let tmp_path = path.with_extension("tmp");
        let write_err = |source: std::io::Error| PageMergeError::FailedToWrite {
            path: tmp_path.clone(),
            source,
        };

        let mut file = tokio::fs::File::create(&tmp_path).await.map_err(write_err)?;

        let result = async {
            file.write_all(bytes).await.map_err(write_err)?;
            file.flush().await.map_err(write_err)?;
            drop(file);

            tokio::fs::rename(&tmp_path, path)
                .await
                .map_err(|e| PageMergeError::FailedToWrite {
                    path: path.to_path_buf(),
                    source: e,
                })
        }
        .await;

        if result.is_err() {
            self.discard(&tmp_path).await;
        }
        result
    }
}

async fn remove_if_exists(path: &Path) -> Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(PageMergeError::FailedToWrite {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}
