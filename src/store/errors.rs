//! Store error types
//!
//! Error codes:
//! - AERO_STORE_INVALID_PATH
//! - AERO_STORE_INVALID_NAME
//! - AERO_STORE_COLLECTION_EXISTS
//! - AERO_STORE_COLLECTION_NOT_FOUND
//! - AERO_STORE_UNKNOWN_BACKEND
//! - AERO_STORE_CLOSED
//! - AERO_STORE_IO_ERROR
//! - AERO_STORE_ENGINE_FAILURE
//! - AERO_STORE_CONFIG_ERROR
//! - AERO_CANCELLED

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::engine::EngineError;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Base path is missing or not a directory
    #[error("invalid store path {path:?}: {reason}")]
    InvalidPath { path: PathBuf, reason: String },

    /// Collection name fails the naming rule
    #[error("invalid collection name '{name}'")]
    InvalidName { name: String },

    #[error("collection '{name}' already exists")]
    CollectionExists { name: String },

    #[error("collection '{name}' not found")]
    CollectionNotFound { name: String },

    /// No factory registered under this backend name
    #[error("unknown store backend '{backend}'")]
    UnknownBackend { backend: String },

    #[error("store is closed")]
    StoreClosed,

    #[error("{message}: {source}")]
    Io {
        message: String,
        #[source]
        source: io::Error,
    },

    #[error("engine failure: {0}")]
    Engine(#[from] EngineError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("operation cancelled: {reason}")]
    Cancelled { reason: String },
}

impl StoreError {
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        StoreError::Io {
            message: message.into(),
            source,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        StoreError::Config(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            StoreError::InvalidPath { .. } => "AERO_STORE_INVALID_PATH",
            StoreError::InvalidName { .. } => "AERO_STORE_INVALID_NAME",
            StoreError::CollectionExists { .. } => "AERO_STORE_COLLECTION_EXISTS",
            StoreError::CollectionNotFound { .. } => "AERO_STORE_COLLECTION_NOT_FOUND",
            StoreError::UnknownBackend { .. } => "AERO_STORE_UNKNOWN_BACKEND",
            StoreError::StoreClosed => "AERO_STORE_CLOSED",
            StoreError::Io { .. } => "AERO_STORE_IO_ERROR",
            StoreError::Engine(_) => "AERO_STORE_ENGINE_FAILURE",
            StoreError::Config(_) => "AERO_STORE_CONFIG_ERROR",
            StoreError::Cancelled { .. } => "AERO_CANCELLED",
        }
    }

    /// True when an engine reported corruption or a failed commit log.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::Engine(e) if e.is_fatal())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
