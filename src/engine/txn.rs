//! Snapshot transactions
//!
//! A transaction reads through the view pinned when it began and buffers
//! its own writes. Commit releases the view and appends all buffered writes
//! as a single log entry; discard drops them.

use std::collections::BTreeMap;

use super::errors::{EngineError, EngineResult};
use super::iterator::{EngineIterator, IteratorOptions};
use super::record::LogOp;
use super::versions::ReadView;
use super::Engine;

pub struct Transaction {
    engine: Engine,
    view: ReadView,
    writable: bool,
    /// `None` marks a buffered delete
    pending: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl Transaction {
    pub(crate) fn new(engine: Engine, view: ReadView, writable: bool) -> Self {
        Self {
            engine,
            view,
            writable,
            pending: BTreeMap::new(),
        }
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Commit sequence this transaction reads at.
    pub fn read_sequence(&self) -> u64 {
        self.view.sequence()
    }

    fn ensure_writable(&self) -> EngineResult<()> {
        if !self.writable {
            return Err(EngineError::ReadOnlyTransaction);
        }
        Ok(())
    }

    /// Point lookup. Buffered writes of this transaction are visible.
    pub fn get(&self, key: &[u8]) -> EngineResult<Vec<u8>> {
        if let Some(pending) = self.pending.get(key) {
            return pending.clone().ok_or(EngineError::KeyNotFound);
        }
        self.view.get(key).ok_or(EngineError::KeyNotFound)
    }

    pub fn set(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> EngineResult<()> {
        self.ensure_writable()?;
        self.pending.insert(key.into(), Some(value.into()));
        Ok(())
    }

    /// Deleting an absent key is not an error.
    pub fn delete(&mut self, key: impl Into<Vec<u8>>) -> EngineResult<()> {
        self.ensure_writable()?;
        self.pending.insert(key.into(), None);
        Ok(())
    }

    /// Iterator over the view this transaction began on.
    ///
    /// Buffered writes are not merged into iteration.
    pub fn iter(&self, options: IteratorOptions) -> EngineIterator {
        EngineIterator::new(self.view.clone(), options)
    }

    /// Publishes buffered writes atomically. Read-only commits are no-ops.
    pub fn commit(self) -> EngineResult<()> {
        let Transaction {
            engine,
            view,
            pending,
            ..
        } = self;
        // the committer's own view must not hold back pruning
        drop(view);

        if pending.is_empty() {
            return Ok(());
        }

        let ops = pending
            .into_iter()
            .map(|(key, value)| match value {
                Some(value) => LogOp::Set { key, value },
                None => LogOp::Delete { key },
            })
            .collect();

        engine.commit_ops(ops).map(|_| ())
    }

    /// Drops buffered writes and releases the view.
    pub fn discard(self) {}
}
