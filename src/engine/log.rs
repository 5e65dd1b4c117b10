//! Append-only commit log
//!
//! - Every commit is one checksummed entry appended to `commit.log`
//! - Entries are fsynced before the commit is published when `sync_writes` is set
//! - A failed append or fsync truncates the file back to the last good entry;
//!   if that truncation fails too the writer refuses every later append
//! - Replay validates every entry; any corruption aborts the open
//! - `rewrite` replaces the log atomically, used by compaction

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read, Write};
use std::path::Path;

use crate::observability::{log_event_with_fields, Event};

use super::errors::{EngineError, EngineResult};
use super::record::{CommitEntry, MIN_ENTRY_SIZE};

/// File name of the commit log inside an engine directory
pub const LOG_FILE_NAME: &str = "commit.log";

/// Scratch file compaction writes before renaming over the log
const REWRITE_FILE_NAME: &str = "commit.log.rewrite";

/// Storage behind a `LogWriter`.
pub(crate) trait LogFile: Send {
    fn append(&mut self, buf: &[u8]) -> io::Result<()>;

    fn sync(&mut self) -> io::Result<()>;

    /// Cuts the file back to `len` bytes.
    fn truncate(&mut self, len: u64) -> io::Result<()>;
}

impl LogFile for File {
    fn append(&mut self, buf: &[u8]) -> io::Result<()> {
        self.write_all(buf)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_all()
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

/// Appends commit entries to the log file.
pub struct LogWriter {
    file: Box<dyn LogFile>,
    current_offset: u64,
    sync_writes: bool,
    /// Set once the file tail can no longer be trusted
    failed: Option<String>,
}

fn open_append(path: &Path) -> EngineResult<File> {
    OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)
        .map_err(|e| EngineError::io(format!("Failed to open commit log: {}", path.display()), e))
}

impl LogWriter {
    /// Opens or creates `<dir>/commit.log`, creating `dir` if needed.
    pub fn open(dir: &Path, sync_writes: bool) -> EngineResult<Self> {
        if !dir.exists() {
            fs::create_dir_all(dir).map_err(|e| {
                EngineError::io(
                    format!("Failed to create engine directory: {}", dir.display()),
                    e,
                )
            })?;
        }

        let file = open_append(&dir.join(LOG_FILE_NAME))?;
        let current_offset = file
            .metadata()
            .map_err(|e| EngineError::io("Failed to read commit log metadata", e))?
            .len();

        Ok(Self::from_file(Box::new(file), current_offset, sync_writes))
    }

    pub(crate) fn from_file(file: Box<dyn LogFile>, current_offset: u64, sync_writes: bool) -> Self {
        Self {
            file,
            current_offset,
            sync_writes,
            failed: None,
        }
    }

    pub fn current_offset(&self) -> u64 {
        self.current_offset
    }

    pub fn is_failed(&self) -> bool {
        self.failed.is_some()
    }

    fn ensure_usable(&self) -> EngineResult<()> {
        match &self.failed {
            Some(reason) => Err(EngineError::LogFailed {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Appends one entry and returns the offset it was written at.
    ///
    /// On error nothing of the entry remains in the file.
    pub fn append(&mut self, entry: &CommitEntry) -> EngineResult<u64> {
        self.ensure_usable()?;

        let encoded = entry.encode()?;
        let offset = self.current_offset;

        let mut written = self.file.append(&encoded);
        if written.is_ok() && self.sync_writes {
            written = self.file.sync();
        }

        if let Err(e) = written {
            self.roll_back(offset, &e);
            return Err(EngineError::io(
                format!("Failed to append commit {}", entry.sequence),
                e,
            ));
        }

        self.current_offset += encoded.len() as u64;
        Ok(offset)
    }

    fn roll_back(&mut self, offset: u64, cause: &io::Error) {
        let sync_writes = self.sync_writes;
        let file = &mut self.file;
        let restored = file
            .truncate(offset)
            .and_then(|()| if sync_writes { file.sync() } else { Ok(()) });

        if let Err(e) = restored {
            let reason = format!(
                "append failed ({}) and truncating back to offset {} failed ({})",
                cause, offset, e
            );
            log_event_with_fields(Event::EngineLogFailed, &[("reason", reason.as_str())]);
            self.failed = Some(reason);
        }
    }

    /// Forces appended entries to disk.
    pub fn sync(&mut self) -> EngineResult<()> {
        self.ensure_usable()?;
        self.file
            .sync()
            .map_err(|e| EngineError::io("fsync failed on commit log", e))
    }
}

/// Atomically replaces `<dir>/commit.log` with `entries`.
///
/// The new log is written and fsynced under a scratch name, then renamed
/// over the old one. Returns the size of the new log.
pub fn rewrite<I>(dir: &Path, entries: I) -> EngineResult<u64>
where
    I: IntoIterator<Item = CommitEntry>,
{
    let scratch = dir.join(REWRITE_FILE_NAME);
    let mut file = File::create(&scratch).map_err(|e| {
        EngineError::io(format!("Failed to create {}", scratch.display()), e)
    })?;

    let mut size = 0u64;
    for entry in entries {
        let encoded = entry.encode()?;
        file.write_all(&encoded)
            .map_err(|e| EngineError::io("Failed to write compacted log", e))?;
        size += encoded.len() as u64;
    }
    file.sync_all()
        .map_err(|e| EngineError::io("fsync failed on compacted log", e))?;
    drop(file);

    fs::rename(&scratch, dir.join(LOG_FILE_NAME))
        .map_err(|e| EngineError::io("Failed to replace commit log", e))?;
    File::open(dir)
        .and_then(|d| d.sync_all())
        .map_err(|e| EngineError::io("fsync failed on engine directory", e))?;

    Ok(size)
}

/// Sequential reader used to replay the commit log on open.
pub struct LogReader {
    reader: BufReader<File>,
    current_offset: u64,
    file_size: u64,
}

impl LogReader {
    pub fn open(path: &Path) -> EngineResult<Self> {
        let file = File::open(path).map_err(|e| {
            EngineError::io(format!("Failed to open commit log: {}", path.display()), e)
        })?;

        let file_size = file
            .metadata()
            .map_err(|e| EngineError::io("Failed to read commit log metadata", e))?
            .len();

        Ok(Self {
            reader: BufReader::new(file),
            current_offset: 0,
            file_size,
        })
    }

    pub fn current_offset(&self) -> u64 {
        self.current_offset
    }

    /// Reads the next entry.
    ///
    /// - `Ok(Some(entry))` if an entry was read
    /// - `Ok(None)` at end of file
    /// - `Err(Corruption)` on truncation or checksum failure
    pub fn read_next(&mut self) -> EngineResult<Option<CommitEntry>> {
        if self.current_offset >= self.file_size {
            return Ok(None);
        }

        let remaining = self.file_size - self.current_offset;
        if remaining < MIN_ENTRY_SIZE as u64 {
            return Err(EngineError::corruption(
                self.current_offset,
                format!(
                    "Truncated commit log: {} bytes remaining, minimum entry size is {}",
                    remaining, MIN_ENTRY_SIZE
                ),
            ));
        }

        let mut len_buf = [0u8; 4];
        self.reader.read_exact(&mut len_buf).map_err(|e| {
            EngineError::corruption(
                self.current_offset,
                format!("Failed to read entry length: {}", e),
            )
        })?;
        let entry_length = u32::from_le_bytes(len_buf) as u64;

        if entry_length < MIN_ENTRY_SIZE as u64 || entry_length > remaining {
            return Err(EngineError::corruption(
                self.current_offset,
                format!(
                    "Entry length {} invalid for {} remaining bytes",
                    entry_length, remaining
                ),
            ));
        }

        let mut entry_buf = vec![0u8; entry_length as usize];
        entry_buf[0..4].copy_from_slice(&len_buf);
        self.reader.read_exact(&mut entry_buf[4..]).map_err(|e| {
            EngineError::corruption(
                self.current_offset,
                format!("Failed to read entry body: {}", e),
            )
        })?;

        let (entry, consumed) = CommitEntry::decode(&entry_buf)
            .map_err(|e| EngineError::corruption(self.current_offset, e.to_string()))?;

        self.current_offset += consumed as u64;
        Ok(Some(entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::record::LogOp;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// In-memory log file with switchable failures.
    #[derive(Clone, Default)]
    struct FlakyFile {
        data: Arc<Mutex<Vec<u8>>>,
        /// Bytes accepted by the next append before it fails
        torn_append: Arc<Mutex<Option<usize>>>,
        fail_sync: Arc<Mutex<bool>>,
        fail_truncate: Arc<Mutex<bool>>,
    }

    impl FlakyFile {
        fn len(&self) -> usize {
            self.data.lock().unwrap().len()
        }

        fn sequences(&self) -> Vec<u64> {
            let data = self.data.lock().unwrap();
            let mut offset = 0;
            let mut sequences = Vec::new();
            while offset < data.len() {
                let (entry, consumed) = CommitEntry::decode(&data[offset..]).unwrap();
                sequences.push(entry.sequence);
                offset += consumed;
            }
            sequences
        }
    }

    impl LogFile for FlakyFile {
        fn append(&mut self, buf: &[u8]) -> io::Result<()> {
            let mut data = self.data.lock().unwrap();
            match self.torn_append.lock().unwrap().take() {
                Some(accepted) => {
                    data.extend_from_slice(&buf[..accepted]);
                    Err(io::Error::new(io::ErrorKind::Other, "no space left on device"))
                }
                None => {
                    data.extend_from_slice(buf);
                    Ok(())
                }
            }
        }

        fn sync(&mut self) -> io::Result<()> {
            if std::mem::take(&mut *self.fail_sync.lock().unwrap()) {
                return Err(io::Error::new(io::ErrorKind::Other, "EIO"));
            }
            Ok(())
        }

        fn truncate(&mut self, len: u64) -> io::Result<()> {
            if *self.fail_truncate.lock().unwrap() {
                return Err(io::Error::new(io::ErrorKind::Other, "read-only filesystem"));
            }
            self.data.lock().unwrap().truncate(len as usize);
            Ok(())
        }
    }

    fn flaky_writer() -> (FlakyFile, LogWriter) {
        let file = FlakyFile::default();
        let writer = LogWriter::from_file(Box::new(file.clone()), 0, true);
        (file, writer)
    }

    fn set(seq: u64, key: &str, value: &str) -> CommitEntry {
        CommitEntry::new(
            seq,
            vec![LogOp::Set {
                key: key.as_bytes().to_vec(),
                value: value.as_bytes().to_vec(),
            }],
        )
    }

    #[test]
    fn test_writer_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("users");
        assert!(!dir.exists());

        let writer = LogWriter::open(&dir, true).unwrap();
        assert!(dir.join(LOG_FILE_NAME).exists());
        assert_eq!(writer.current_offset(), 0);
    }

    #[test]
    fn test_append_and_replay() {
        let temp_dir = TempDir::new().unwrap();

        let second_offset;
        {
            let mut writer = LogWriter::open(temp_dir.path(), true).unwrap();
            writer.append(&set(1, "a", "1")).unwrap();
            second_offset = writer.append(&set(2, "b", "2")).unwrap();
            assert!(second_offset > 0);
        }

        let mut reader = LogReader::open(&temp_dir.path().join(LOG_FILE_NAME)).unwrap();
        assert_eq!(reader.read_next().unwrap().unwrap().sequence, 1);
        assert_eq!(reader.current_offset(), second_offset);
        assert_eq!(reader.read_next().unwrap().unwrap().sequence, 2);
        assert!(reader.read_next().unwrap().is_none());
    }

    #[test]
    fn test_reopen_appends_after_existing_entries() {
        let temp_dir = TempDir::new().unwrap();

        {
            let mut writer = LogWriter::open(temp_dir.path(), false).unwrap();
            writer.append(&set(1, "a", "1")).unwrap();
            writer.sync().unwrap();
        }

        let mut writer = LogWriter::open(temp_dir.path(), false).unwrap();
        assert!(writer.current_offset() > 0);
        writer.append(&set(2, "b", "2")).unwrap();
        drop(writer);

        let mut reader = LogReader::open(&temp_dir.path().join(LOG_FILE_NAME)).unwrap();
        let mut sequences = Vec::new();
        while let Some(entry) = reader.read_next().unwrap() {
            sequences.push(entry.sequence);
        }
        assert_eq!(sequences, vec![1, 2]);
    }

    #[test]
    fn test_torn_append_is_truncated_away() {
        let (file, mut writer) = flaky_writer();
        writer.append(&set(1, "a", "1")).unwrap();
        let good_len = file.len();

        *file.torn_append.lock().unwrap() = Some(5);
        let err = writer.append(&set(2, "b", "2")).unwrap_err();
        assert_eq!(err.code(), "AERO_ENGINE_IO_ERROR");
        assert_eq!(file.len(), good_len);
        assert_eq!(writer.current_offset(), good_len as u64);

        writer.append(&set(2, "b", "2")).unwrap();
        assert_eq!(file.sequences(), vec![1, 2]);
    }

    #[test]
    fn test_failed_sync_drops_the_entry() {
        let (file, mut writer) = flaky_writer();
        writer.append(&set(1, "a", "1")).unwrap();

        *file.fail_sync.lock().unwrap() = true;
        assert!(writer.append(&set(2, "b", "2")).is_err());
        assert_eq!(file.sequences(), vec![1]);
        assert!(!writer.is_failed());

        writer.append(&set(2, "b", "2")).unwrap();
        assert_eq!(file.sequences(), vec![1, 2]);
    }

    #[test]
    fn test_failed_rollback_poisons_writer() {
        let (file, mut writer) = flaky_writer();
        *file.torn_append.lock().unwrap() = Some(3);
        *file.fail_truncate.lock().unwrap() = true;

        assert!(writer.append(&set(1, "a", "1")).is_err());
        assert!(writer.is_failed());

        let err = writer.append(&set(1, "a", "1")).unwrap_err();
        assert!(matches!(err, EngineError::LogFailed { .. }));
        assert!(err.is_fatal());
        assert!(writer.sync().is_err());
    }

    #[test]
    fn test_rewrite_replaces_log() {
        let temp_dir = TempDir::new().unwrap();
        {
            let mut writer = LogWriter::open(temp_dir.path(), true).unwrap();
            for seq in 1..=5 {
                writer.append(&set(seq, "k", "v")).unwrap();
            }
        }

        let size = rewrite(temp_dir.path(), vec![set(5, "k", "v")]).unwrap();
        let path = temp_dir.path().join(LOG_FILE_NAME);
        assert_eq!(fs::metadata(&path).unwrap().len(), size);
        assert!(!temp_dir.path().join(REWRITE_FILE_NAME).exists());

        let mut reader = LogReader::open(&path).unwrap();
        assert_eq!(reader.read_next().unwrap().unwrap().sequence, 5);
        assert!(reader.read_next().unwrap().is_none());
    }

    #[test]
    fn test_corruption_detected_on_replay() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(LOG_FILE_NAME);

        {
            let mut writer = LogWriter::open(temp_dir.path(), true).unwrap();
            writer.append(&set(1, "doc1", "payload")).unwrap();
        }

        let mut contents = fs::read(&path).unwrap();
        contents[10] ^= 0xFF;
        fs::write(&path, contents).unwrap();

        let mut reader = LogReader::open(&path).unwrap();
        let err = reader.read_next().unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(err.code(), "AERO_ENGINE_CORRUPTION");
    }

    #[test]
    fn test_truncated_tail_is_corruption() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(LOG_FILE_NAME);

        {
            let mut writer = LogWriter::open(temp_dir.path(), true).unwrap();
            writer.append(&set(1, "doc1", "payload")).unwrap();
        }

        let contents = fs::read(&path).unwrap();
        fs::write(&path, &contents[..contents.len() - 2]).unwrap();

        let mut reader = LogReader::open(&path).unwrap();
        assert!(reader.read_next().unwrap_err().is_fatal());
    }
}
