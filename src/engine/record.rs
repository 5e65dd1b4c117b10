//! Commit log entry format
//!
//! One entry is written per committed transaction or flushed batch:
//!
//! ```text
//! +------------------+
//! | Entry Length     | (u32 LE, includes this field and the checksum)
//! +------------------+
//! | Sequence         | (u64 LE)
//! +------------------+
//! | Op Count         | (u32 LE)
//! +------------------+
//! | Ops              | kind (u8: 0 = set, 1 = delete)
//! |                  | key (length-prefixed bytes)
//! |                  | value (length-prefixed bytes, empty for delete)
//! +------------------+
//! | Checksum         | (u32 LE, CRC32 over every preceding byte)
//! +------------------+
//! ```
//!
//! An entry is applied whole or not at all, which is what makes a
//! multi-key commit atomic across restarts. Every length must fit in a u32;
//! larger commits are rejected before anything is written.

use std::io::{self, Read};

use crc32fast::Hasher;

use super::errors::{EngineError, EngineResult};

const OP_SET: u8 = 0;
const OP_DELETE: u8 = 1;

/// Smallest possible entry: length + sequence + op count + checksum
pub const MIN_ENTRY_SIZE: usize = 4 + 8 + 4 + 4;

/// CRC32 (IEEE) over the given bytes.
pub fn compute_checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Converts a length to its u32 frame field.
pub(crate) fn frame_len(len: usize) -> EngineResult<u32> {
    u32::try_from(len).map_err(|_| EngineError::EntryTooLarge { size: len as u64 })
}

/// A single mutation inside a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOp {
    Set { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

impl LogOp {
    pub fn key(&self) -> &[u8] {
        match self {
            LogOp::Set { key, .. } | LogOp::Delete { key } => key,
        }
    }
}

/// All mutations of one commit, tagged with the engine-wide sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitEntry {
    pub sequence: u64,
    pub ops: Vec<LogOp>,
}

impl CommitEntry {
    pub fn new(sequence: u64, ops: Vec<LogOp>) -> Self {
        Self { sequence, ops }
    }

    fn encode_body(&self) -> EngineResult<Vec<u8>> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&self.sequence.to_le_bytes());
        buf.extend_from_slice(&frame_len(self.ops.len())?.to_le_bytes());

        for op in &self.ops {
            let (kind, value): (u8, &[u8]) = match op {
                LogOp::Set { value, .. } => (OP_SET, value.as_slice()),
                LogOp::Delete { .. } => (OP_DELETE, &b""[..]),
            };
            buf.push(kind);
            buf.extend_from_slice(&frame_len(op.key().len())?.to_le_bytes());
            buf.extend_from_slice(op.key());
            buf.extend_from_slice(&frame_len(value.len())?.to_le_bytes());
            buf.extend_from_slice(value);
        }

        Ok(buf)
    }

    /// Serialize the entry including length prefix and trailing checksum.
    ///
    /// Fails with `EntryTooLarge` when the frame would overflow a u32.
    pub fn encode(&self) -> EngineResult<Vec<u8>> {
        let body = self.encode_body()?;
        let total = 4 + body.len() + 4;
        let entry_length = frame_len(total)?;

        let mut entry = Vec::with_capacity(total);
        entry.extend_from_slice(&entry_length.to_le_bytes());
        entry.extend_from_slice(&body);

        let checksum = compute_checksum(&entry);
        entry.extend_from_slice(&checksum.to_le_bytes());

        Ok(entry)
    }

    /// Deserialize an entry, verifying its checksum.
    ///
    /// Returns the entry and the number of bytes consumed.
    pub fn decode(data: &[u8]) -> io::Result<(Self, usize)> {
        if data.len() < MIN_ENTRY_SIZE {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "Entry too short"));
        }

        let entry_length = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;

        if entry_length < MIN_ENTRY_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid entry length: {}", entry_length),
            ));
        }

        if data.len() < entry_length {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "Entry truncated: expected {} bytes, got {}",
                    entry_length,
                    data.len()
                ),
            ));
        }

        let checksum_offset = entry_length - 4;
        let mut stored = [0u8; 4];
        stored.copy_from_slice(&data[checksum_offset..entry_length]);
        let stored_checksum = u32::from_le_bytes(stored);
        let computed_checksum = compute_checksum(&data[..checksum_offset]);

        if computed_checksum != stored_checksum {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Checksum mismatch: computed {:08x}, stored {:08x}",
                    computed_checksum, stored_checksum
                ),
            ));
        }

        let mut body = io::Cursor::new(&data[4..checksum_offset]);

        fn read_u32<R: Read>(reader: &mut R) -> io::Result<u32> {
            let mut buf = [0u8; 4];
            reader.read_exact(&mut buf)?;
            Ok(u32::from_le_bytes(buf))
        }

        fn read_bytes<R: Read>(reader: &mut R) -> io::Result<Vec<u8>> {
            let len = read_u32(reader)? as usize;
            let mut buf = vec![0u8; len];
            reader.read_exact(&mut buf)?;
            Ok(buf)
        }

        let mut seq_buf = [0u8; 8];
        body.read_exact(&mut seq_buf)?;
        let sequence = u64::from_le_bytes(seq_buf);

        let op_count = read_u32(&mut body)?;
        let mut ops = Vec::with_capacity(op_count.min(1024) as usize);

        for _ in 0..op_count {
            let mut kind = [0u8; 1];
            body.read_exact(&mut kind)?;
            let key = read_bytes(&mut body)?;
            let value = read_bytes(&mut body)?;

            ops.push(match kind[0] {
                OP_SET => LogOp::Set { key, value },
                OP_DELETE => LogOp::Delete { key },
                other => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("Unknown op kind: {}", other),
                    ))
                }
            });
        }

        if body.position() as usize != checksum_offset - 4 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Trailing bytes after last op",
            ));
        }

        Ok((Self { sequence, ops }, entry_length))
    }
}
