//! Random-access record streams.
//!
//! A [`RecordFile`] is an immutable, randomly addressable sequence of
//! persisted records: because every record encodes to the same number of
//! bytes, index `i` lives at byte offset `i * Record::ENCODED_SIZE` and no
//! length table is needed. [`RecordIter`]s over it are lightweight
//! (stream identity + index) value types.

use anyhow::{anyhow, ensure, Context, Result};
use itrace_core::Record;
use std::fs;
use std::path::Path;

/// An immutable persisted record sequence.
#[derive(Debug, Clone)]
pub struct RecordFile {
    bytes: Vec<u8>,
}

impl RecordFile {
    /// Open a record file from disk.
    ///
    /// # Errors
    /// Fails on I/O errors or if the byte length is not a whole number of
    /// records (a partial trailing record means an interrupted capture).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let bytes = fs::read(path_ref)
            .with_context(|| format!("open {}", path_ref.to_string_lossy()))?;
        Self::from_bytes(bytes)
            .with_context(|| format!("read {}", path_ref.to_string_lossy()))
    }

    /// Wrap an in-memory byte buffer.
    ///
    /// # Errors
    /// Fails if the length is not a multiple of the record size.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        ensure!(
            bytes.len() % Record::ENCODED_SIZE == 0,
            "truncated record file: {} trailing byte(s) after {} whole record(s)",
            bytes.len() % Record::ENCODED_SIZE,
            bytes.len() / Record::ENCODED_SIZE
        );
        Ok(Self { bytes })
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> u64 {
        (self.bytes.len() / Record::ENCODED_SIZE) as u64
    }

    /// Whether the stream holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Fetch the record at `idx`, or `None` out of range.
    #[must_use]
    pub fn get(&self, idx: u64) -> Option<Record> {
        let start = usize::try_from(idx).ok()?.checked_mul(Record::ENCODED_SIZE)?;
        let chunk = self.bytes.get(start..start + Record::ENCODED_SIZE)?;
        let mut arr = [0u8; Record::ENCODED_SIZE];
        arr.copy_from_slice(chunk);
        Some(Record::from_bytes(arr))
    }

    /// Fetch the record at `idx`; out-of-range is an error, not a wraparound.
    ///
    /// # Errors
    /// Fails if `idx` is past the end of the stream.
    pub fn record(&self, idx: u64) -> Result<Record> {
        self.get(idx).ok_or_else(|| {
            anyhow!(
                "record index {idx} out of range (stream has {} records)",
                self.len()
            )
        })
    }

    /// Iterator positioned at the first record.
    #[must_use]
    pub fn iter(&self) -> RecordIter<'_> {
        RecordIter { file: self, idx: 0 }
    }

    /// Iterator positioned at `idx` (may be past the end).
    #[must_use]
    pub fn iter_at(&self, idx: u64) -> RecordIter<'_> {
        RecordIter { file: self, idx }
    }
}

/// Lightweight cursor into a [`RecordFile`]: stream identity + index.
///
/// Two iterators are equal iff they reference the same underlying stream
/// (by identity, not contents) and the same index.
#[derive(Debug, Clone, Copy)]
pub struct RecordIter<'a> {
    file: &'a RecordFile,
    idx: u64,
}

impl<'a> RecordIter<'a> {
    /// Current index into the stream.
    #[must_use]
    pub fn index(&self) -> u64 {
        self.idx
    }

    /// The record at the current position without advancing.
    #[must_use]
    pub fn peek(&self) -> Option<Record> {
        self.file.get(self.idx)
    }

    /// Whether the cursor is at or past the end of the stream.
    #[must_use]
    pub fn at_end(&self) -> bool {
        self.idx >= self.file.len()
    }
}

impl Iterator for RecordIter<'_> {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        let record = self.file.get(self.idx)?;
        self.idx += 1;
        Some(record)
    }
}

impl PartialEq for RecordIter<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.file, other.file) && self.idx == other.idx
    }
}

impl Eq for RecordIter<'_> {}
