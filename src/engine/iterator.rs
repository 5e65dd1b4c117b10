//! Ordered iteration over a pinned view
//!
//! The iterator never observes commits made after its view was pinned.
//! Entries are pulled in chunks of `prefetch_size`, so the keyspace lock is
//! taken once per refill and never held between calls.

use std::collections::VecDeque;
use std::ops::Bound;

use super::errors::{EngineError, EngineResult};
use super::versions::ReadView;

/// Options controlling iterator prefetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IteratorOptions {
    /// Copy values while prefetching; when false only keys are buffered
    /// and values are looked up on demand.
    pub prefetch_values: bool,
    /// Number of entries buffered per refill
    pub prefetch_size: usize,
}

impl Default for IteratorOptions {
    fn default() -> Self {
        Self {
            prefetch_values: true,
            prefetch_size: 100,
        }
    }
}

impl IteratorOptions {
    /// Keys-only iteration, used for counting.
    pub fn keys_only() -> Self {
        Self {
            prefetch_values: false,
            ..Self::default()
        }
    }

    pub fn with_prefetch_size(mut self, prefetch_size: usize) -> Self {
        self.prefetch_size = prefetch_size;
        self
    }
}

/// The entry an iterator is positioned on.
#[derive(Debug)]
pub struct Item<'a> {
    key: &'a [u8],
    value: Option<&'a [u8]>,
    view: &'a ReadView,
}

impl<'a> Item<'a> {
    pub fn key(&self) -> &'a [u8] {
        self.key
    }

    /// Returns an owned copy of the value.
    pub fn value_copy(&self) -> EngineResult<Vec<u8>> {
        match self.value {
            Some(value) => Ok(value.to_vec()),
            None => self.view.get(self.key).ok_or(EngineError::KeyNotFound),
        }
    }

    pub fn value_size(&self) -> usize {
        match self.value {
            Some(value) => value.len(),
            None => self.view.get(self.key).map_or(0, |value| value.len()),
        }
    }
}

/// Forward iterator over one pinned view.
///
/// Freshly created iterators are unpositioned; call `rewind()` or `seek()`
/// before reading.
pub struct EngineIterator {
    view: ReadView,
    options: IteratorOptions,
    buffer: VecDeque<(Vec<u8>, Option<Vec<u8>>)>,
    /// Key of the last buffered entry, used to resume refills
    resume_after: Option<Vec<u8>>,
    exhausted: bool,
}

impl EngineIterator {
    pub(crate) fn new(view: ReadView, options: IteratorOptions) -> Self {
        Self {
            view,
            options,
            buffer: VecDeque::new(),
            resume_after: None,
            exhausted: true,
        }
    }

    /// Positions on the first key.
    pub fn rewind(&mut self) {
        self.buffer.clear();
        self.resume_after = None;
        self.exhausted = false;
        self.fill(Bound::Unbounded);
    }

    /// Positions on the first key greater than or equal to `target`.
    pub fn seek(&mut self, target: &[u8]) {
        self.buffer.clear();
        self.resume_after = None;
        self.exhausted = false;
        self.fill(Bound::Included(target.to_vec()));
    }

    /// Advances to the next key.
    pub fn next(&mut self) {
        self.buffer.pop_front();
        if self.buffer.is_empty() && !self.exhausted {
            match self.resume_after.take() {
                Some(last) => self.fill(Bound::Excluded(last)),
                None => self.exhausted = true,
            }
        }
    }

    /// True while positioned on an entry.
    pub fn valid(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// True while positioned on an entry whose key starts with `prefix`.
    pub fn valid_for_prefix(&self, prefix: &[u8]) -> bool {
        self.buffer
            .front()
            .map_or(false, |(key, _)| key.starts_with(prefix))
    }

    /// Entry at the current position.
    pub fn item(&self) -> Option<Item<'_>> {
        self.buffer.front().map(|(key, value)| Item {
            key: key.as_slice(),
            value: value.as_deref(),
            view: &self.view,
        })
    }

    fn fill(&mut self, start: Bound<Vec<u8>>) {
        let limit = self.options.prefetch_size.max(1);
        let start: Bound<&[u8]> = match &start {
            Bound::Included(key) => Bound::Included(key.as_slice()),
            Bound::Excluded(key) => Bound::Excluded(key.as_slice()),
            Bound::Unbounded => Bound::Unbounded,
        };

        self.buffer
            .extend(self.view.scan(start, limit, self.options.prefetch_values));

        if self.buffer.len() < limit {
            self.exhausted = true;
        }
        self.resume_after = self.buffer.back().map(|(key, _)| key.clone());
    }
}
