//! Write batches for bulk loads
//!
//! Unlike a transaction a batch pins no view and has no op count cap; it
//! just accumulates mutations and publishes them as one commit entry on
//! `flush`. The encoded entry must still fit the log frame, otherwise the
//! flush fails with `EntryTooLarge` and nothing is written.

use super::errors::EngineResult;
use super::record::LogOp;
use super::Engine;

pub struct WriteBatch {
    engine: Engine,
    ops: Vec<LogOp>,
}

impl WriteBatch {
    pub(crate) fn new(engine: Engine) -> Self {
        Self {
            engine,
            ops: Vec::new(),
        }
    }

    pub fn set(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.ops.push(LogOp::Set {
            key: key.into(),
            value: value.into(),
        });
    }

    pub fn delete(&mut self, key: impl Into<Vec<u8>>) {
        self.ops.push(LogOp::Delete { key: key.into() });
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Commits every staged mutation as one atomic unit.
    ///
    /// Returns the commit sequence. Later mutations of the same key win.
    pub fn flush(self) -> EngineResult<u64> {
        self.engine.commit_ops(self.ops)
    }

    /// Drops every staged mutation.
    pub fn cancel(self) {}
}

#[cfg(test)]
mod tests {
    use crate::engine::{Engine, EngineError};

    #[test]
    fn test_nothing_visible_before_flush() {
        let engine = Engine::in_memory();
        let mut batch = engine.new_write_batch().unwrap();
        batch.set("a", "1");
        batch.set("b", "2");
        assert_eq!(batch.len(), 2);

        assert!(matches!(
            engine.begin(false).unwrap().get(b"a"),
            Err(EngineError::KeyNotFound)
        ));

        batch.flush().unwrap();
        let txn = engine.begin(false).unwrap();
        assert_eq!(txn.get(b"a").unwrap(), b"1".to_vec());
        assert_eq!(txn.get(b"b").unwrap(), b"2".to_vec());
    }

    #[test]
    fn test_last_write_wins_within_batch() {
        let engine = Engine::in_memory();
        let mut batch = engine.new_write_batch().unwrap();
        batch.set("a", "1");
        batch.set("a", "2");
        batch.delete("b");
        batch.flush().unwrap();

        assert_eq!(engine.begin(false).unwrap().get(b"a").unwrap(), b"2".to_vec());
    }

    #[test]
    fn test_cancel_discards() {
        let engine = Engine::in_memory();
        let mut batch = engine.new_write_batch().unwrap();
        batch.set("a", "1");
        batch.cancel();
        assert!(engine.begin(false).unwrap().get(b"a").is_err());
    }
}
