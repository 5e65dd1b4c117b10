//! Operation context
//!
//! Carried by every collection call. Clones share one cancellation flag, so
//! a handle kept by another thread can stop a running scan. An optional
//! deadline is treated the same as an explicit cancel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::errors::{CollectionError, CollectionResult};

#[derive(Debug, Clone)]
pub struct OpContext {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl OpContext {
    /// Context that is never cancelled unless `cancel()` is called.
    pub fn background() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: None,
        }
    }

    /// Context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancels this context and every clone of it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
            || self.deadline.map_or(false, |d| Instant::now() >= d)
    }

    /// Fails with `Cancelled` once the context is cancelled or expired.
    pub fn check(&self) -> CollectionResult<()> {
        if self.cancelled.load(Ordering::Acquire) {
            return Err(CollectionError::cancelled("context cancelled"));
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(CollectionError::cancelled("deadline exceeded"));
            }
        }
        Ok(())
    }
}

impl Default for OpContext {
    fn default() -> Self {
        Self::background()
    }
}
