//! Filesystem-backed storage.

use crate::{ContactSource, RecordingStore, StorageError};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncRead, AsyncWriteExt};

/// Whitelist file name, relative to the storage root.
pub const WHITELIST_FILE: &str = "whitelist.csv";

/// Broadcast list file name, relative to the storage root.
pub const BROADCAST_LIST_FILE: &str = "broadcast.csv";

/// Directory holding recordings, relative to the storage root.
pub const RECORDINGS_DIR: &str = "recs";

/// Scratch directory for recordings being written, relative to the storage
/// root. Kept outside `recs/` so it is never served.
pub const INCOMING_DIR: &str = "incoming";

static NEXT_INCOMING: AtomicU64 = AtomicU64::new(0);

/// Stores directories and recordings under a single root directory:
///
/// ```text
/// <root>/whitelist.csv
/// <root>/broadcast.csv
/// <root>/recs/<recording files>
/// <root>/incoming/<recordings being written>
/// ```
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    pub fn new(root_dir: impl AsRef<Path>) -> Self {
        Self {
            root_dir: root_dir.as_ref().to_path_buf(),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Path a recording named `file_name` is stored at.
    pub fn rec_path(&self, file_name: &str) -> Result<PathBuf, StorageError> {
        validate_file_name(file_name)?;
        Ok(self.root_dir.join(RECORDINGS_DIR).join(file_name))
    }

    fn incoming_path(&self, file_name: &str) -> PathBuf {
        let n = NEXT_INCOMING.fetch_add(1, Ordering::Relaxed);
        self.root_dir
            .join(INCOMING_DIR)
            .join(format!("{}.{}.{}.part", file_name, std::process::id(), n))
    }

    async fn read_file(&self, path: PathBuf) -> Result<Vec<u8>, StorageError> {
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound(path)),
            Err(e) => Err(StorageError::io(format!("unable to read {}", path.display()), e)),
        }
    }
}

/// Rejects names that are empty or could walk out of the recordings directory.
fn validate_file_name(file_name: &str) -> Result<(), StorageError> {
    if file_name.is_empty()
        || file_name == "."
        || file_name.contains("..")
        || file_name.contains('/')
        || file_name.contains('\\')
    {
        return Err(StorageError::InvalidName(file_name.to_string()));
    }
    Ok(())
}

#[async_trait]
impl ContactSource for LocalStorage {
    async fn read_whitelist(&self) -> Result<Vec<u8>, StorageError> {
        self.read_file(self.root_dir.join(WHITELIST_FILE)).await
    }

    async fn read_broadcast_list(&self) -> Result<Vec<u8>, StorageError> {
        self.read_file(self.root_dir.join(BROADCAST_LIST_FILE)).await
    }
}

#[async_trait]
impl RecordingStore for LocalStorage {
    async fn write_rec(
        &self,
        src: &mut (dyn AsyncRead + Send + Unpin),
        file_name: &str,
    ) -> Result<PathBuf, StorageError> {
        let path = self.rec_path(file_name)?;
        for dir in [RECORDINGS_DIR, INCOMING_DIR] {
            tokio::fs::create_dir_all(self.root_dir.join(dir))
                .await
                .map_err(|e| StorageError::io(format!("unable to create {} directory", dir), e))?;
        }

        let incoming = self.incoming_path(file_name);
        let written = match copy_to(src, &incoming).await {
            Ok(written) => written,
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_file(&incoming).await {
                    tracing::warn!(
                        path = %incoming.display(),
                        "unable to remove incomplete recording: {}",
                        cleanup
                    );
                }
                return Err(e);
            }
        };
        if let Err(e) = tokio::fs::rename(&incoming, &path).await {
            let _ = tokio::fs::remove_file(&incoming).await;
            return Err(StorageError::io("unable to move recording into place", e));
        }

        tracing::debug!(path = %path.display(), bytes = written, "recording stored");
        Ok(path)
    }

    fn recordings_dir(&self) -> PathBuf {
        self.root_dir.join(RECORDINGS_DIR)
    }
}

async fn copy_to(
    src: &mut (dyn AsyncRead + Send + Unpin),
    path: &Path,
) -> Result<u64, StorageError> {
    let mut dest = tokio::fs::File::create(path)
        .await
        .map_err(|e| StorageError::io("unable to create destination", e))?;
    let written = tokio::io::copy(src, &mut dest)
        .await
        .map_err(|e| StorageError::io("unable to copy recording to destination", e))?;
    dest.flush()
        .await
        .map_err(|e| StorageError::io("unable to flush recording", e))?;
    Ok(written)
}
