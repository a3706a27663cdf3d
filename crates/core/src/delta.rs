//! Byte-range edit operations: sequential chunking and patch replay
//!
//! A `Delta` says "at byte `offset`, delete `remove.len()` bytes, then
//! insert `add`". Archived files are encoded as an ordered sequence of
//! pure-append deltas; reconstruction replays the sequence in chain
//! order against an initially empty target. Deltas are only meaningful
//! relative to a target that already reflects every earlier delta in
//! the same chain.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;
use thiserror::Error;

/// Upper bound on a single delta's added bytes (8 MiB), which in turn
/// bounds one ledger record's payload.
pub const MAX_DELTA_LEN: u64 = 8 * 1024 * 1024;

/// One edit operation in a file's history chain
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta {
    /// Byte position the edit applies at
    pub offset: u64,
    /// Bytes deleted at `offset` (carried in full, so the edit is
    /// reversible; the chunker always leaves this empty)
    pub remove: Vec<u8>,
    /// Bytes inserted at `offset`
    pub add: Vec<u8>,
}

impl Delta {
    /// A pure append: insert `add` at `offset`, removing nothing
    pub fn append(offset: u64, add: Vec<u8>) -> Self {
        Self {
            offset,
            remove: Vec::new(),
            add,
        }
    }

    /// Length of the removed range
    pub fn removed_len(&self) -> u64 {
        self.remove.len() as u64
    }
}

/// Patch-engine failures; short reads and writes signal on-disk
/// corruption or a concurrent writer and are never retried.
#[derive(Debug, Error)]
pub enum DeltaError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("short read at offset {offset}: expected {expected} trailing bytes, got {got}")]
    ShortRead {
        offset: u64,
        expected: u64,
        got: u64,
    },
    #[error("short write at offset {offset}: {expected} bytes not fully written")]
    ShortWrite { offset: u64, expected: u64 },
}

/// Scan a reader into an ordered sequence of pure-append deltas.
///
/// Reads sequentially in chunks of at most `max_chunk` bytes; each
/// non-empty chunk is emitted as one delta whose offset is the number
/// of bytes already consumed. An error from `emit` aborts the scan
/// with no partial-progress guarantee for the in-flight delta.
pub fn read_to_deltas<R: Read>(
    reader: &mut R,
    max_chunk: u64,
    mut emit: impl FnMut(Delta) -> Result<()>,
) -> Result<()> {
    anyhow::ensure!(max_chunk > 0, "chunk size must be greater than zero");

    let mut offset = 0u64;
    let mut buffer = vec![0u8; max_chunk as usize];
    loop {
        let count = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        emit(Delta::append(offset, buffer[..count].to_vec()))?;
        offset += count as u64;
    }
    Ok(())
}

/// Scan a file on disk into deltas; see [`read_to_deltas`].
pub fn file_to_deltas(
    path: &Path,
    max_chunk: u64,
    emit: impl FnMut(Delta) -> Result<()>,
) -> Result<()> {
    let mut file = std::fs::File::open(path)?;
    read_to_deltas(&mut file, max_chunk, emit)
}

/// Apply a delta to an in-memory buffer, returning the edited copy.
///
/// Result is `buf[..offset] ++ add ++ buf[offset + remove.len()..]`
/// with both slice bounds clamped to the buffer length, so an append
/// past the end or a removal running past the end never panics.
pub fn apply_to_buffer(delta: &Delta, buffer: &[u8]) -> Vec<u8> {
    let len = buffer.len() as u64;
    let keep = delta.offset.min(len) as usize;
    let tail = delta.offset.saturating_add(delta.removed_len()).min(len) as usize;

    let mut result = Vec::with_capacity(keep + delta.add.len() + (buffer.len() - tail));
    result.extend_from_slice(&buffer[..keep]);
    result.extend_from_slice(&delta.add);
    result.extend_from_slice(&buffer[tail..]);
    result
}

/// Apply a delta to a file in place.
///
/// The file is created if absent. The tail beyond the removed range is
/// read into memory, the added bytes and the saved tail are written
/// back, and only then is the file truncated to its final length —
/// truncation last, so a crash mid-sequence leaves stale trailing
/// bytes rather than discarding data prematurely. Callers must not
/// apply concurrent deltas to the same path.
pub fn apply_to_file(delta: &Delta, path: &Path) -> Result<(), DeltaError> {
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(path)?;
    let size = file.metadata()?.len();

    // Save everything past the removed range.
    let tail_offset = delta.offset + delta.removed_len();
    let expected = size.saturating_sub(tail_offset);
    let mut tail = Vec::with_capacity(expected as usize);
    if expected > 0 {
        file.seek(SeekFrom::Start(tail_offset))?;
        file.read_to_end(&mut tail)?;
    }
    if (tail.len() as u64) != expected {
        return Err(DeltaError::ShortRead {
            offset: tail_offset,
            expected,
            got: tail.len() as u64,
        });
    }

    file.seek(SeekFrom::Start(delta.offset))?;
    write_fully(&mut file, &delta.add, delta.offset)?;

    let tail_start = delta.offset + delta.add.len() as u64;
    file.seek(SeekFrom::Start(tail_start))?;
    write_fully(&mut file, &tail, tail_start)?;

    // Must be last; see above.
    file.set_len(tail_start + tail.len() as u64)?;
    Ok(())
}

fn write_fully(file: &mut std::fs::File, data: &[u8], offset: u64) -> Result<(), DeltaError> {
    file.write_all(data).map_err(|e| match e.kind() {
        ErrorKind::WriteZero => DeltaError::ShortWrite {
            offset,
            expected: data.len() as u64,
        },
        _ => DeltaError::Io(e),
    })
}
