//! Ordered, transactional key-value engine
//!
//! Every collection is backed by one engine instance living in its own
//! directory.
//!
//! # Design Principles
//!
//! - Keys are kept in ascending byte order
//! - Committed state is multi-versioned; a reader pins the commit sequence
//!   it started on and never observes later commits
//! - Committers are serialized behind one commit lock
//! - Every commit is one checksummed log entry, fsynced before it is published
//! - Replay on open validates every entry; corruption aborts the open
//! - One process-wide exclusive lock per directory; a second open fails
//!   with `Locked`
//!
//! # Limits
//!
//! The whole keyspace lives in memory and is rebuilt from the log on open.
//! The log is compacted on open once dead entries outnumber live keys.
//!
//! In-memory engines skip the log and the lock entirely.

mod batch;
mod errors;
mod iterator;
mod log;
mod record;
mod txn;
mod versions;

pub use batch::WriteBatch;
pub use errors::{EngineError, EngineResult};
pub use iterator::{EngineIterator, IteratorOptions, Item};
pub use log::LOG_FILE_NAME;
pub use record::{CommitEntry, LogOp};
pub use txn::Transaction;

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard};

use fs2::FileExt;

use crate::observability::{log_event_with_fields, Event};

use self::log::{LogReader, LogWriter};
use self::versions::{ReadView, VersionStore};

/// Lock file held for as long as an engine is open
pub const LOCK_FILE_NAME: &str = ".lock";

/// Dead log ops tolerated before open compacts the log
const COMPACTION_MIN_DEAD_OPS: u64 = 1024;

/// Ops per entry in a compacted log
const COMPACTION_CHUNK_OPS: usize = 4096;

/// Engine open options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Keep everything in memory, never touch disk
    pub in_memory: bool,
    /// fsync the commit log after every commit
    pub sync_writes: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            in_memory: false,
            sync_writes: true,
        }
    }
}

impl EngineOptions {
    pub fn in_memory() -> Self {
        Self {
            in_memory: true,
            ..Self::default()
        }
    }

    pub fn with_sync_writes(mut self, sync_writes: bool) -> Self {
        self.sync_writes = sync_writes;
        self
    }
}

struct CommitState {
    log: Option<LogWriter>,
    /// Held exclusively; dropping the file releases the lock
    lock: Option<File>,
    sequence: u64,
}

struct Shared {
    path: Option<PathBuf>,
    versions: RwLock<VersionStore>,
    /// Highest sequence visible to new readers
    published: AtomicU64,
    /// Pinned read sequences and how many views hold each
    readers: Mutex<BTreeMap<u64, usize>>,
    commit: Mutex<CommitState>,
    closed: AtomicBool,
}

/// Cheaply clonable handle to one engine instance.
#[derive(Clone)]
pub struct Engine {
    shared: Arc<Shared>,
}

fn lock_directory(path: &Path) -> EngineResult<File> {
    std::fs::create_dir_all(path).map_err(|e| {
        EngineError::io(
            format!("Failed to create engine directory: {}", path.display()),
            e,
        )
    })?;

    let lock_path = path.join(LOCK_FILE_NAME);
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(&lock_path)
        .map_err(|e| EngineError::io(format!("Failed to open {}", lock_path.display()), e))?;

    FileExt::try_lock_exclusive(&file).map_err(|e| {
        if e.kind() == fs2::lock_contended_error().kind() {
            EngineError::Locked {
                path: path.to_path_buf(),
            }
        } else {
            EngineError::io(format!("Failed to lock {}", lock_path.display()), e)
        }
    })?;

    Ok(file)
}

impl Engine {
    /// Opens (or creates) the engine stored in `path`, replaying its commit log.
    pub fn open(path: &Path, options: EngineOptions) -> EngineResult<Self> {
        if options.in_memory {
            return Ok(Self::in_memory());
        }

        let lock = lock_directory(path)?;

        let log_path = path.join(LOG_FILE_NAME);
        let mut versions = VersionStore::default();
        let mut sequence = 0;
        let mut entries = 0u64;
        let mut ops = 0u64;

        if log_path.exists() {
            let mut reader = LogReader::open(&log_path)?;
            while let Some(entry) = reader.read_next()? {
                sequence = sequence.max(entry.sequence);
                ops += entry.ops.len() as u64;
                versions.apply(entry.sequence, entry.ops);
                versions.settle(sequence);
                entries += 1;
            }
        }

        let live = versions.latest().count() as u64;
        let path_str = path.display().to_string();
        let entries_str = entries.to_string();
        let keys_str = live.to_string();
        log_event_with_fields(
            Event::EngineReplayComplete,
            &[
                ("path", path_str.as_str()),
                ("entries", entries_str.as_str()),
                ("keys", keys_str.as_str()),
            ],
        );

        let dead = ops.saturating_sub(live);
        if dead >= COMPACTION_MIN_DEAD_OPS && dead > live {
            compact(path, &versions, sequence)?;
        }

        let log = LogWriter::open(path, options.sync_writes)?;

        Ok(Self::from_parts(
            Some(path.to_path_buf()),
            versions,
            Some(log),
            Some(lock),
            sequence,
        ))
    }

    /// Creates an empty engine that never touches disk.
    pub fn in_memory() -> Self {
        Self::from_parts(None, VersionStore::default(), None, None, 0)
    }

    fn from_parts(
        path: Option<PathBuf>,
        versions: VersionStore,
        log: Option<LogWriter>,
        lock: Option<File>,
        sequence: u64,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                path,
                versions: RwLock::new(versions),
                published: AtomicU64::new(sequence),
                readers: Mutex::new(BTreeMap::new()),
                commit: Mutex::new(CommitState {
                    log,
                    lock,
                    sequence,
                }),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Directory backing this engine; `None` for in-memory engines.
    pub fn path(&self) -> Option<&Path> {
        self.shared.path.as_deref()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> EngineResult<()> {
        if self.is_closed() {
            return Err(EngineError::Closed);
        }
        Ok(())
    }

    fn read_versions(&self) -> RwLockReadGuard<'_, VersionStore> {
        self.shared
            .versions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_readers(&self) -> MutexGuard<'_, BTreeMap<u64, usize>> {
        self.shared
            .readers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Pins the latest published sequence.
    fn pin(&self) -> ReadView {
        let mut readers = self.lock_readers();
        let sequence = self.shared.published.load(Ordering::Acquire);
        *readers.entry(sequence).or_insert(0) += 1;
        ReadView::new(self.clone(), sequence)
    }

    fn pin_at(&self, sequence: u64) -> ReadView {
        *self.lock_readers().entry(sequence).or_insert(0) += 1;
        ReadView::new(self.clone(), sequence)
    }

    fn unpin(&self, sequence: u64) {
        let mut readers = self.lock_readers();
        if let Some(count) = readers.get_mut(&sequence) {
            *count -= 1;
            if *count == 0 {
                readers.remove(&sequence);
            }
        }
    }

    /// Oldest pinned sequence, or `latest` when nothing is pinned.
    fn visibility_floor(&self, latest: u64) -> u64 {
        self.lock_readers()
            .keys()
            .next()
            .copied()
            .unwrap_or(latest)
    }

    /// Number of stored versions across all keys.
    pub fn version_count(&self) -> usize {
        self.read_versions().version_count()
    }

    /// Number of read views currently pinned.
    pub fn pinned_readers(&self) -> usize {
        self.lock_readers().values().sum()
    }

    /// Starts a transaction on the latest committed state.
    pub fn begin(&self, writable: bool) -> EngineResult<Transaction> {
        self.ensure_open()?;
        Ok(Transaction::new(self.clone(), self.pin(), writable))
    }

    pub fn new_write_batch(&self) -> EngineResult<WriteBatch> {
        self.ensure_open()?;
        Ok(WriteBatch::new(self.clone()))
    }

    /// Appends `ops` as one log entry and publishes them.
    ///
    /// The log append happens before publication; if it fails nothing
    /// becomes visible and the sequence is not consumed.
    pub(crate) fn commit_ops(&self, ops: Vec<LogOp>) -> EngineResult<u64> {
        self.ensure_open()?;

        let mut state = self
            .shared
            .commit
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // close() may have won the race for the commit lock
        self.ensure_open()?;

        if ops.is_empty() {
            return Ok(state.sequence);
        }

        let sequence = state.sequence + 1;
        let entry = CommitEntry::new(sequence, ops);
        if let Some(log) = state.log.as_mut() {
            log.append(&entry)?;
        }
        state.sequence = sequence;

        let mut versions = self
            .shared
            .versions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        versions.apply(sequence, entry.ops);
        self.shared.published.store(sequence, Ordering::Release);
        versions.settle(self.visibility_floor(sequence));

        Ok(sequence)
    }

    /// Flushes the log, releases the directory lock and rejects all
    /// further operations.
    ///
    /// Views already pinned by open transactions stay readable.
    pub fn close(&self) -> EngineResult<()> {
        let mut state = self
            .shared
            .commit
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let synced = match state.log.take() {
            Some(mut log) => log.sync(),
            None => Ok(()),
        };
        state.lock = None;
        synced
    }
}

/// Rewrites the log of `path` down to the live keys of `versions`.
///
/// The first entry carries no ops and keeps `sequence` alive across the
/// rewrite.
fn compact(path: &Path, versions: &VersionStore, sequence: u64) -> EngineResult<()> {
    let mut entries = vec![CommitEntry::new(sequence, Vec::new())];
    let mut chunk = Vec::new();
    for (key, value) in versions.latest() {
        chunk.push(LogOp::Set {
            key: key.to_vec(),
            value: value.to_vec(),
        });
        if chunk.len() == COMPACTION_CHUNK_OPS {
            entries.push(CommitEntry::new(sequence, std::mem::take(&mut chunk)));
        }
    }
    if !chunk.is_empty() {
        entries.push(CommitEntry::new(sequence, chunk));
    }

    let size = log::rewrite(path, entries)?;

    let path_str = path.display().to_string();
    let size_str = size.to_string();
    log_event_with_fields(
        Event::EngineCompacted,
        &[("path", path_str.as_str()), ("bytes", size_str.as_str())],
    );
    Ok(())
}
