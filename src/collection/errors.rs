//! Collection error types
//!
//! Error codes:
//! - AERO_INVALID_IDENTITY
//! - AERO_DOCUMENT_NOT_FOUND
//! - AERO_UNSUPPORTED_SELECTOR / AERO_MALFORMED_SELECTOR
//! - AERO_ENCODE_FAILED / AERO_DECODE_FAILED
//! - AERO_ENGINE_FAILURE
//! - AERO_CURSOR_CLOSED / AERO_CURSOR_NOT_POSITIONED
//! - AERO_CANCELLED
//!
//! Every failure is surfaced to the caller as-is; nothing is retried here.

use thiserror::Error;

use crate::codec::CodecError;
use crate::engine::EngineError;
use crate::selector::SelectorError;

#[derive(Debug, Error)]
pub enum CollectionError {
    /// Identity missing, empty or not storable as a key
    #[error("empty or invalid document id: {reason}")]
    InvalidIdentity { reason: String },

    /// Point read of an absent identity
    #[error("document not found: {id}")]
    NotFound { id: String },

    #[error(transparent)]
    Selector(#[from] SelectorError),

    #[error("failed to encode document: {0}")]
    Encode(#[source] CodecError),

    #[error("failed to decode document: {0}")]
    Decode(#[source] CodecError),

    #[error("engine failure: {0}")]
    Engine(#[from] EngineError),

    /// Cursor used after `close()`
    #[error("cursor is closed")]
    CursorClosed,

    /// Cursor read before the first `advance()` or after exhaustion
    #[error("cursor is not positioned on a record")]
    CursorNotPositioned,

    #[error("operation cancelled: {reason}")]
    Cancelled { reason: String },
}

impl CollectionError {
    pub fn invalid_identity(reason: impl Into<String>) -> Self {
        CollectionError::InvalidIdentity {
            reason: reason.into(),
        }
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        CollectionError::NotFound { id: id.into() }
    }

    pub fn cancelled(reason: impl Into<String>) -> Self {
        CollectionError::Cancelled {
            reason: reason.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            CollectionError::InvalidIdentity { .. } => "AERO_INVALID_IDENTITY",
            CollectionError::NotFound { .. } => "AERO_DOCUMENT_NOT_FOUND",
            CollectionError::Selector(e) => e.code(),
            CollectionError::Encode(_) => "AERO_ENCODE_FAILED",
            CollectionError::Decode(_) => "AERO_DECODE_FAILED",
            CollectionError::Engine(_) => "AERO_ENGINE_FAILURE",
            CollectionError::CursorClosed => "AERO_CURSOR_CLOSED",
            CollectionError::CursorNotPositioned => "AERO_CURSOR_NOT_POSITIONED",
            CollectionError::Cancelled { .. } => "AERO_CANCELLED",
        }
    }

    /// True when the underlying engine reported corruption.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CollectionError::Engine(e) if e.is_fatal())
    }
}

pub type CollectionResult<T> = Result<T, CollectionError>;
