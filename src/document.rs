//! Document identity
//!
//! A document is any serde-serializable value that exposes exactly one
//! identity. The identity becomes the record key, so it must be usable as
//! a raw byte key: non-empty, bounded, no NUL bytes. A missing identity is
//! an error, never defaulted.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::collection::{CollectionError, CollectionResult};

/// Largest identity accepted, in bytes
pub const MAX_IDENTITY_LEN: usize = 65_000;

/// Field holding the identity of schema-less JSON documents
pub const ID_FIELD: &str = "_id";

/// Field holding the optional revision of schema-less JSON documents
pub const REV_FIELD: &str = "_rev";

/// A storable document.
pub trait Document: Serialize {
    /// The document identity, `None` when absent.
    fn id(&self) -> Option<&str>;

    /// Optional revision marker carried alongside the identity.
    fn revision(&self) -> Option<&str> {
        None
    }
}

impl Document for Value {
    fn id(&self) -> Option<&str> {
        self.get(ID_FIELD).and_then(Value::as_str)
    }

    fn revision(&self) -> Option<&str> {
        self.get(REV_FIELD).and_then(Value::as_str)
    }
}

impl<D: Document + ?Sized> Document for &D {
    fn id(&self) -> Option<&str> {
        (**self).id()
    }

    fn revision(&self) -> Option<&str> {
        (**self).revision()
    }
}

/// Identity and revision extracted from a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredFields<'a> {
    pub id: &'a str,
    pub revision: Option<&'a str>,
}

/// Extracts and validates the required fields of `doc`.
pub fn required_fields<D: Document + ?Sized>(doc: &D) -> CollectionResult<RequiredFields<'_>> {
    let id = doc
        .id()
        .ok_or_else(|| CollectionError::invalid_identity("identity is missing"))?;
    validate_identity(id)?;

    Ok(RequiredFields {
        id,
        revision: doc.revision(),
    })
}

/// Checks that `id` can be stored as a record key.
pub fn validate_identity(id: &str) -> CollectionResult<()> {
    if id.is_empty() {
        return Err(CollectionError::invalid_identity("identity is empty"));
    }
    if id.len() > MAX_IDENTITY_LEN {
        return Err(CollectionError::invalid_identity(format!(
            "identity is {} bytes, maximum is {}",
            id.len(),
            MAX_IDENTITY_LEN
        )));
    }
    if id.as_bytes().contains(&0) {
        return Err(CollectionError::invalid_identity("identity contains a NUL byte"));
    }
    Ok(())
}

/// Result echoed back by create operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteResult {
    pub id: String,
}
