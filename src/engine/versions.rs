//! Multi-version keyspace
//!
//! Every key maps to a chain of versions in commit order. A reader pinned at
//! sequence `s` sees, for each key, the newest version with
//! `sequence <= s`; a tombstone hides the key.
//!
//! A commit touches only the chains of the keys it writes, so its cost does
//! not depend on the size of the keyspace or on how many readers are open.
//! Versions below the visibility floor (the oldest pinned sequence) are
//! pruned: a chain keeps the version visible at the floor and everything
//! newer, and a chain whose floor version is a tombstone loses it.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::Bound;

use super::record::LogOp;
use super::Engine;

#[derive(Debug, Clone)]
struct Version {
    sequence: u64,
    /// `None` marks a delete
    value: Option<Vec<u8>>,
}

/// One scanned entry; the value is absent for keys-only scans.
pub(crate) type ScanEntry = (Vec<u8>, Option<Vec<u8>>);

fn visible(chain: &[Version], sequence: u64) -> Option<&Version> {
    chain.iter().rev().find(|v| v.sequence <= sequence)
}

fn prune(chain: &mut Vec<Version>, floor: u64) {
    if let Some(keep_from) = chain.iter().rposition(|v| v.sequence <= floor) {
        chain.drain(..keep_from);
        if chain.first().map_or(false, |v| v.value.is_none()) {
            chain.remove(0);
        }
    }
}

/// True when the chain holds exactly the one live version every reader sees.
fn settled(chain: &[Version]) -> bool {
    matches!(chain, [only] if only.value.is_some())
}

#[derive(Debug, Default)]
pub(crate) struct VersionStore {
    chains: BTreeMap<Vec<u8>, Vec<Version>>,
    /// Keys whose chain is not settled
    stale: BTreeSet<Vec<u8>>,
    /// Keys written since the last `settle`
    touched: Vec<Vec<u8>>,
    /// Floor the whole stale set was last pruned against
    pruned_floor: u64,
}

impl VersionStore {
    /// Adds the versions of one commit. Later ops on the same key win.
    pub(crate) fn apply(&mut self, sequence: u64, ops: Vec<LogOp>) {
        for op in ops {
            let (key, value) = match op {
                LogOp::Set { key, value } => (key, Some(value)),
                LogOp::Delete { key } => (key, None),
            };

            let chain = self.chains.entry(key.clone()).or_default();
            match chain.last_mut() {
                Some(last) if last.sequence == sequence => last.value = value,
                _ => chain.push(Version { sequence, value }),
            }
            self.touched.push(key);
        }
    }

    /// Prunes versions no reader at or above `floor` can see.
    ///
    /// Keys touched since the last call are always pruned; the rest of the
    /// stale set only when the floor moved.
    pub(crate) fn settle(&mut self, floor: u64) {
        let mut keys = std::mem::take(&mut self.touched);
        if floor > self.pruned_floor {
            keys.extend(std::mem::take(&mut self.stale));
            self.pruned_floor = floor;
        }

        for key in keys {
            let Some(chain) = self.chains.get_mut(&key) else {
                self.stale.remove(&key);
                continue;
            };
            prune(chain, floor);

            if chain.is_empty() {
                self.chains.remove(&key);
                self.stale.remove(&key);
            } else if settled(chain) {
                self.stale.remove(&key);
            } else {
                self.stale.insert(key);
            }
        }
    }

    pub(crate) fn get(&self, key: &[u8], sequence: u64) -> Option<&[u8]> {
        self.chains
            .get(key)
            .and_then(|chain| visible(chain, sequence))
            .and_then(|version| version.value.as_deref())
    }

    /// Up to `limit` live entries visible at `sequence`, starting at `start`.
    pub(crate) fn scan(
        &self,
        start: Bound<&[u8]>,
        sequence: u64,
        limit: usize,
        with_values: bool,
    ) -> Vec<ScanEntry> {
        self.chains
            .range::<[u8], _>((start, Bound::Unbounded))
            .filter_map(|(key, chain)| {
                let value = visible(chain, sequence)?.value.as_ref()?;
                Some((key.clone(), with_values.then(|| value.clone())))
            })
            .take(limit)
            .collect()
    }

    /// Newest live value of every key, in key order.
    pub(crate) fn latest(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.chains.iter().filter_map(|(key, chain)| {
            let value = chain.last()?.value.as_deref()?;
            Some((key.as_slice(), value))
        })
    }

    /// Total versions held across all chains.
    pub(crate) fn version_count(&self) -> usize {
        self.chains.values().map(Vec::len).sum()
    }
}

/// A reader pinned at one commit sequence.
///
/// While a view is alive the versions it can see are kept. Dropping the
/// view releases the pin.
pub(crate) struct ReadView {
    engine: Engine,
    sequence: u64,
}

impl ReadView {
    pub(crate) fn new(engine: Engine, sequence: u64) -> Self {
        Self { engine, sequence }
    }

    pub(crate) fn sequence(&self) -> u64 {
        self.sequence
    }

    pub(crate) fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.engine
            .read_versions()
            .get(key, self.sequence)
            .map(<[u8]>::to_vec)
    }

    pub(crate) fn scan(&self, start: Bound<&[u8]>, limit: usize, with_values: bool) -> Vec<ScanEntry> {
        self.engine
            .read_versions()
            .scan(start, self.sequence, limit, with_values)
    }
}

impl Clone for ReadView {
    fn clone(&self) -> Self {
        self.engine.pin_at(self.sequence)
    }
}

impl fmt::Debug for ReadView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadView")
            .field("sequence", &self.sequence)
            .finish()
    }
}

impl Drop for ReadView {
    fn drop(&mut self) {
        self.engine.unpin(self.sequence);
    }
}
