//! Engine error types
//!
//! Error codes:
//! - AERO_ENGINE_IO_ERROR (ERROR severity)
//! - AERO_ENGINE_CORRUPTION (FATAL severity)
//! - AERO_ENGINE_KEY_NOT_FOUND (ERROR severity)
//! - AERO_ENGINE_READ_ONLY (ERROR severity)
//! - AERO_ENGINE_CLOSED (ERROR severity)
//! - AERO_ENGINE_LOCKED (ERROR severity)
//! - AERO_ENGINE_ENTRY_TOO_LARGE (ERROR severity)
//! - AERO_ENGINE_LOG_FAILED (FATAL severity)

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the ordered key-value engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Disk I/O failure while reading or appending the commit log
    #[error("{message}: {source}")]
    Io {
        message: String,
        #[source]
        source: io::Error,
    },

    /// Commit log failed checksum or framing validation
    #[error("commit log corruption (byte_offset: {offset}): {reason}")]
    Corruption { offset: u64, reason: String },

    /// Point lookup of an absent key
    #[error("key not found")]
    KeyNotFound,

    /// Write issued on a transaction opened with `writable = false`
    #[error("write attempted on a read-only transaction")]
    ReadOnlyTransaction,

    /// Engine handle was closed
    #[error("engine is closed")]
    Closed,

    /// Another engine instance holds the directory lock
    #[error("engine directory {path:?} is locked by another instance")]
    Locked { path: PathBuf },

    /// Commit does not fit the u32 length fields of the log frame
    #[error("commit entry of {size} bytes exceeds the log frame limit")]
    EntryTooLarge { size: u64 },

    /// A failed append could not be rolled back; the log tail is unknown
    #[error("commit log failed: {reason}")]
    LogFailed { reason: String },
}

impl EngineError {
    /// Create an I/O error with context
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        EngineError::Io {
            message: message.into(),
            source,
        }
    }

    /// Create a corruption error at the given commit log offset
    pub fn corruption(offset: u64, reason: impl Into<String>) -> Self {
        EngineError::Corruption {
            offset,
            reason: reason.into(),
        }
    }

    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Io { .. } => "AERO_ENGINE_IO_ERROR",
            EngineError::Corruption { .. } => "AERO_ENGINE_CORRUPTION",
            EngineError::KeyNotFound => "AERO_ENGINE_KEY_NOT_FOUND",
            EngineError::ReadOnlyTransaction => "AERO_ENGINE_READ_ONLY",
            EngineError::Closed => "AERO_ENGINE_CLOSED",
            EngineError::Locked { .. } => "AERO_ENGINE_LOCKED",
            EngineError::EntryTooLarge { .. } => "AERO_ENGINE_ENTRY_TOO_LARGE",
            EngineError::LogFailed { .. } => "AERO_ENGINE_LOG_FAILED",
        }
    }

    /// Corruption and a failed log must halt the caller; everything else
    /// fails the operation only.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::Corruption { .. } | EngineError::LogFailed { .. }
        )
    }
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corruption_is_fatal() {
        let err = EngineError::corruption(128, "checksum mismatch");
        assert!(err.is_fatal());
        assert_eq!(err.code(), "AERO_ENGINE_CORRUPTION");
        let display = err.to_string();
        assert!(display.contains("byte_offset: 128"));
        assert!(display.contains("checksum mismatch"));
    }

    #[test]
    fn test_operational_errors_not_fatal() {
        assert!(!EngineError::KeyNotFound.is_fatal());
        assert!(!EngineError::Closed.is_fatal());
        let err = EngineError::io("append failed", io::Error::new(io::ErrorKind::Other, "disk full"));
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("disk full"));
        assert!(!EngineError::Locked { path: "users".into() }.is_fatal());
        assert!(!EngineError::EntryTooLarge { size: 1 << 33 }.is_fatal());
    }

    #[test]
    fn test_log_failure_is_fatal() {
        let err = EngineError::LogFailed {
            reason: "truncate failed".into(),
        };
        assert!(err.is_fatal());
        assert_eq!(err.code(), "AERO_ENGINE_LOG_FAILED");
    }
}
