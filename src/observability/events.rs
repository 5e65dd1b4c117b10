//! Observable events
//!
//! Events are explicit and typed; the string form is what lands in the
//! `event` field of a log line.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Store lifecycle
    /// Store opened on a base directory
    StoreOpened,
    /// Store closed all collections
    StoreClosed,

    // Collection lifecycle
    /// New collection provisioned
    CollectionCreated,
    /// Existing collection opened
    CollectionOpened,

    // Engine
    /// Commit log replayed on open
    EngineReplayComplete,
    /// Engine close failed during store shutdown
    EngineCloseFailed,
    /// Commit log rewritten down to the live keys
    EngineCompacted,
    /// Log append could not be rolled back; engine refuses further commits
    EngineLogFailed,

    // Writes
    /// Bulk write committed as one batch
    BatchCommitted,
    /// Bulk write rejected before any write was staged
    BatchRejected,

    // Reads
    /// Selector operator is not prefix; scan widened to the whole collection
    SelectorFullScan,
    /// Scan stopped because the operation context was cancelled
    ScanCancelled,

    // Configuration
    /// Configuration loaded
    ConfigLoaded,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::StoreOpened => "STORE_OPENED",
            Event::StoreClosed => "STORE_CLOSED",
            Event::CollectionCreated => "COLLECTION_CREATED",
            Event::CollectionOpened => "COLLECTION_OPENED",
            Event::EngineReplayComplete => "ENGINE_REPLAY_COMPLETE",
            Event::EngineCloseFailed => "ENGINE_CLOSE_FAILED",
            Event::EngineCompacted => "ENGINE_COMPACTED",
            Event::EngineLogFailed => "ENGINE_LOG_FAILED",
            Event::BatchCommitted => "BATCH_COMMITTED",
            Event::BatchRejected => "BATCH_REJECTED",
            Event::SelectorFullScan => "SELECTOR_FULL_SCAN",
            Event::ScanCancelled => "SCAN_CANCELLED",
            Event::ConfigLoaded => "CONFIG_LOADED",
        }
    }

    /// Default severity of the event
    pub fn severity(&self) -> super::Severity {
        use super::Severity;
        match self {
            Event::EngineCloseFailed => Severity::Error,
            Event::EngineLogFailed => Severity::Fatal,
            Event::SelectorFullScan | Event::BatchRejected | Event::ScanCancelled => {
                Severity::Warn
            }
            Event::BatchCommitted => Severity::Trace,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
