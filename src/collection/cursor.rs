//! Document cursor
//!
//! A cursor owns one read transaction and one iterator over its snapshot,
//! optionally bounded to a key prefix. It starts *before* the first record:
//! the first `advance()` lands on the first match, later calls move forward.
//! Records are visited in ascending key order.
//!
//! The read transaction pins a snapshot for as long as the cursor is open,
//! so callers should `close()` cursors promptly. Every operation after
//! `close()` fails with `CursorClosed`; closing twice is a no-op.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;

use crate::codec::{Codec, JsonCodec};
use crate::engine::{Engine, EngineIterator, IteratorOptions, Transaction};
use crate::observability::{log_event, Event};

use super::context::OpContext;
use super::errors::{CollectionError, CollectionResult};

/// Entries buffered per iterator refill unless configured otherwise
pub const DEFAULT_PREFETCH_SIZE: usize = 10;

struct OpenScan {
    txn: Transaction,
    iter: EngineIterator,
}

pub struct Cursor<C: Codec = JsonCodec> {
    scan: Option<OpenScan>,
    prefix: Option<Vec<u8>>,
    before_first: bool,
    codec: C,
    ctx: OpContext,
}

impl<C: Codec> Cursor<C> {
    /// Opens a cursor on the latest snapshot of `engine`.
    ///
    /// An empty prefix is the same as no prefix.
    pub(crate) fn open(
        engine: &Engine,
        prefix: Option<Vec<u8>>,
        codec: C,
        ctx: OpContext,
        prefetch_size: usize,
    ) -> CollectionResult<Self> {
        let prefix = prefix.filter(|p| !p.is_empty());
        let txn = engine.begin(false)?;
        let mut iter = txn.iter(IteratorOptions::default().with_prefetch_size(prefetch_size));

        match &prefix {
            Some(prefix) => iter.seek(prefix),
            None => iter.rewind(),
        }

        Ok(Self {
            scan: Some(OpenScan { txn, iter }),
            prefix,
            before_first: true,
            codec,
            ctx,
        })
    }

    fn in_range(iter: &EngineIterator, prefix: Option<&[u8]>) -> bool {
        match prefix {
            Some(prefix) => iter.valid_for_prefix(prefix),
            None => iter.valid(),
        }
    }

    /// Prefix bounding this cursor, if any.
    pub fn prefix(&self) -> Option<&[u8]> {
        self.prefix.as_deref()
    }

    pub fn is_closed(&self) -> bool {
        self.scan.is_none()
    }

    /// Moves to the next matching record. Returns `false` once exhausted.
    pub fn advance(&mut self) -> CollectionResult<bool> {
        let scan = self.scan.as_mut().ok_or(CollectionError::CursorClosed)?;

        if let Err(e) = self.ctx.check() {
            log_event(Event::ScanCancelled);
            return Err(e);
        }

        if self.before_first {
            self.before_first = false;
        } else {
            scan.iter.next();
        }

        Ok(Self::in_range(&scan.iter, self.prefix.as_deref()))
    }

    /// True when positioned on a matching record.
    pub fn has_current(&self) -> bool {
        match &self.scan {
            Some(scan) => !self.before_first && Self::in_range(&scan.iter, self.prefix.as_deref()),
            None => false,
        }
    }

    /// Key of the current record.
    pub fn current_key(&self) -> Option<&[u8]> {
        if !self.has_current() {
            return None;
        }
        self.scan
            .as_ref()
            .and_then(|scan| scan.iter.item())
            .map(|item| item.key())
    }

    /// Decodes the current record without moving the cursor.
    pub fn decode_current<T: DeserializeOwned>(&self) -> CollectionResult<T> {
        let scan = self.scan.as_ref().ok_or(CollectionError::CursorClosed)?;

        if !self.has_current() {
            return Err(CollectionError::CursorNotPositioned);
        }

        let item = scan.iter.item().ok_or(CollectionError::CursorNotPositioned)?;
        let bytes = item.value_copy()?;
        self.codec.decode(&bytes).map_err(CollectionError::Decode)
    }

    /// Decodes every remaining record in order.
    ///
    /// Leaves the cursor exhausted; it still has to be closed.
    pub fn collect_all<T: DeserializeOwned>(&mut self) -> CollectionResult<Vec<T>> {
        self.documents().collect()
    }

    /// Iterator over the remaining records, decoded as `T`.
    ///
    /// Stops after the first error.
    pub fn documents<T: DeserializeOwned>(&mut self) -> Documents<'_, T, C> {
        Documents {
            cursor: self,
            failed: false,
            _marker: PhantomData,
        }
    }

    /// Releases the iterator and discards the read transaction.
    pub fn close(&mut self) -> CollectionResult<()> {
        if let Some(OpenScan { txn, iter }) = self.scan.take() {
            drop(iter);
            txn.discard();
        }
        Ok(())
    }
}

/// Borrowing document iterator returned by [`Cursor::documents`].
pub struct Documents<'a, T, C: Codec> {
    cursor: &'a mut Cursor<C>,
    failed: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T: DeserializeOwned, C: Codec> Iterator for Documents<'a, T, C> {
    type Item = CollectionResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        let step = match self.cursor.advance() {
            Ok(true) => self.cursor.decode_current(),
            Ok(false) => return None,
            Err(e) => Err(e),
        };

        if step.is_err() {
            self.failed = true;
        }
        Some(step)
    }
}
