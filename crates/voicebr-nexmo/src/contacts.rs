//! Contact directory decoding.
//!
//! A directory is a comment-tolerant CSV file with one `number,name` pair
//! per line:
//!
//! ```text
//! # broadcast list
//! +393331234567,Anna
//! +393337654321,Bruno
//! ```
//!
//! Rows with fewer than two fields, or whose number or name is not valid
//! UTF-8, are dropped instead of failing the whole decode, so a single bad
//! line in a hand-edited list cannot block a broadcast. When that happens the decoded subset is returned inside
//! [`ContactsError::Partial`].

use crate::error::ContactsError;
use serde::{Deserialize, Serialize};
use voicebr_storage::ContactSource;

/// Endpoint type tag used by the voice API for phone numbers.
pub const PHONE: &str = "phone";

/// A reachable phone endpoint.
///
/// Only `type` and `number` go over the wire; `name` is local to this
/// server and used for greetings and logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(skip)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub number: String,
}

impl Contact {
    pub fn new(number: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: PHONE.to_string(),
            number: number.into(),
        }
    }

    /// A contact with no name, as used for the caller id of outbound calls.
    pub fn phone(number: impl Into<String>) -> Self {
        Self::new(number, "")
    }
}

/// Decodes a directory.
///
/// # Errors
///
/// - [`ContactsError::Csv`] if the data cannot be read as CSV at all;
///   nothing is returned in that case.
/// - [`ContactsError::Partial`] if some rows had fewer than two fields or
///   were not valid UTF-8.
pub fn decode_contacts(data: &[u8]) -> Result<Vec<Contact>, ContactsError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(data);

    let mut contacts = Vec::new();
    let mut discarded = 0usize;
    for record in reader.byte_records() {
        let record = record?;
        let field = |i| record.get(i).and_then(|f| std::str::from_utf8(f).ok());
        match (field(0), field(1)) {
            (Some(number), Some(name)) => contacts.push(Contact::new(number, name)),
            _ => discarded += 1,
        }
    }

    if discarded > 0 {
        return Err(ContactsError::Partial {
            contacts,
            discarded,
        });
    }
    Ok(contacts)
}

/// Reads and decodes the whitelist. Nothing is cached.
pub async fn load_whitelist(source: &dyn ContactSource) -> Result<Vec<Contact>, ContactsError> {
    let data = source.read_whitelist().await?;
    decode_contacts(&data)
}

/// Reads and decodes the broadcast list. Nothing is cached.
pub async fn load_broadcast_list(
    source: &dyn ContactSource,
) -> Result<Vec<Contact>, ContactsError> {
    let data = source.read_broadcast_list().await?;
    decode_contacts(&data)
}
