use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The requested file does not exist.
    #[error("storage: {0} not found")]
    NotFound(PathBuf),

    /// The file name would resolve outside the storage root.
    #[error("storage: invalid file name {0:?}")]
    InvalidName(String),

    /// Any other filesystem failure.
    #[error("storage: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}
