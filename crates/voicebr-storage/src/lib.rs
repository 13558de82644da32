//! Storage layer for the voice broadcast server.
//!
//! Holds the two contact directories (the whitelist of numbers allowed to
//! record a broadcast, and the broadcast list that receives it) and the
//! recordings captured from inbound calls.
//!
//! # Design decisions
//!
//! - **Raw bytes out, no decoding**: directories are handed back exactly as
//!   stored. Decoding into contacts happens in `voicebr-nexmo` on every use,
//!   so an edit to a list on disk is visible to the very next request.
//! - **Traits at the seam**: the server and the broadcaster only see
//!   [`ContactSource`] and [`RecordingStore`]. [`LocalStorage`] is the
//!   filesystem implementation used by the binary and by tests.

mod error;
mod local;

pub use error::StorageError;
pub use local::{
    LocalStorage, BROADCAST_LIST_FILE, INCOMING_DIR, RECORDINGS_DIR, WHITELIST_FILE,
};

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::io::AsyncRead;

/// Source of the raw contact directories.
#[async_trait]
pub trait ContactSource: Send + Sync {
    /// Reads the directory of numbers allowed to record a broadcast.
    async fn read_whitelist(&self) -> Result<Vec<u8>, StorageError>;

    /// Reads the directory of numbers that receive the broadcast.
    async fn read_broadcast_list(&self) -> Result<Vec<u8>, StorageError>;
}

/// Persistence for recorded voice messages.
#[async_trait]
pub trait RecordingStore: Send + Sync {
    /// Copies `src` into a recording named `file_name`, replacing any
    /// previous recording with the same name. Returns where it was written.
    ///
    /// Readers never observe a partially written recording: the new content
    /// only appears under `file_name` once it has been copied completely.
    async fn write_rec(
        &self,
        src: &mut (dyn AsyncRead + Send + Unpin),
        file_name: &str,
    ) -> Result<PathBuf, StorageError>;

    /// Directory recordings are served from, one file per recording name.
    fn recordings_dir(&self) -> PathBuf;
}

/// Everything the webhook server needs from storage.
///
/// Handlers hold a single `Arc<dyn Storage>` and borrow the narrower view
/// each collaborator expects.
pub trait Storage: ContactSource + RecordingStore {
    fn as_contact_source(&self) -> &dyn ContactSource;

    fn as_recording_store(&self) -> &dyn RecordingStore;
}

impl<T: ContactSource + RecordingStore> Storage for T {
    fn as_contact_source(&self) -> &dyn ContactSource {
        self
    }

    fn as_recording_store(&self) -> &dyn RecordingStore {
        self
    }
}
