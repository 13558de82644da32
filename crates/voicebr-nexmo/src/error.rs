use crate::contacts::Contact;
use std::path::PathBuf;
use thiserror::Error;
use voicebr_storage::StorageError;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitError {
    /// The deadline passed, or would pass, before a token was available.
    #[error("rate limiter: deadline exceeded before a token was available")]
    DeadlineExceeded,
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("no signing key configured")]
    MissingKey,

    #[error("unable to read private key {path}: {source}")]
    KeyRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid private key: {0}")]
    InvalidKey(#[source] jsonwebtoken::errors::Error),

    #[error("unable to create authorization token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),

    #[error(transparent)]
    RateLimited(#[from] RateLimitError),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The platform answered with something other than 200 or 201.
    #[error("request failed: {status}")]
    RequestFailed { status: String },

    #[error("request deadline exceeded")]
    DeadlineExceeded,
}

#[derive(Error, Debug)]
pub enum ContactsError {
    #[error("unable to read contacts: {0}")]
    Source(#[from] StorageError),

    #[error("decode contacts: {0}")]
    Csv(#[from] csv::Error),

    /// Some rows were malformed and dropped. `contacts` holds every row that
    /// did decode, in file order.
    #[error("contacts file contains {discarded} corrupted row(s), the result is partial")]
    Partial {
        contacts: Vec<Contact>,
        discarded: usize,
    },
}

impl ContactsError {
    /// Turns a partial failure into the decoded subset, passing every other
    /// error through.
    pub fn recover_partial(self) -> Result<Vec<Contact>, ContactsError> {
        match self {
            ContactsError::Partial { contacts, .. } => Ok(contacts),
            other => Err(other),
        }
    }
}

#[derive(Error, Debug)]
pub enum CallError {
    #[error("unable to encode call request: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("unable to make call: {0}")]
    Transport(#[from] TransportError),
}
