//! Dynamic ring buffer of length-prefixed records.
//!
//! The buffer owns a contiguous byte store that holds variable-length records.
//! Each record is a 4-byte native-endian length prefix followed by the payload,
//! wrapped across the end of the store as needed:
//!
//! ```text
//!  read cursor                          write cursor
//!      v                                      v
//! +----+--------+----+--------------+----+---+-----------+
//! |len |payload |len |payload       |len |pay|   free    |
//! +----+--------+----+--------------+----+---+-----------+
//! ```
//!
//! The store starts at `min_size` bytes and grows by `step_size` (up to
//! `max_size`) when a push does not fit. Framing relies entirely on the
//! buffer's own bookkeeping; every length prefix read back from the store is
//! validated before use, so corrupted bookkeeping is reported as
//! [`Error::Corrupt`] instead of reading out of bounds.
//!
//! # Example
//!
//! ```
//! use dlt_core::{RingBuffer, Result};
//!
//! fn main() -> Result<()> {
//!     let mut buffer = RingBuffer::new();
//!     buffer.init_dynamic(64, 256, 64)?;
//!
//!     buffer.push(b"hello")?;
//!     buffer.push3(Some(b"wor"), Some(b"ld"), None)?;
//!
//!     let mut out = [0u8; 16];
//!     let copy = buffer.pull(&mut out)?;
//!     assert_eq!(&out[..copy.copied], b"hello");
//!     assert_eq!(buffer.message_count()?, 1);
//!
//!     buffer.free_dynamic()?;
//!     Ok(())
//! }
//! ```

use alloc::format;
use alloc::vec::Vec;

use log::{debug, trace, warn};

use crate::{Error, Result};

/// Size of the length prefix stored in front of every record.
pub const RECORD_HEADER_SIZE: usize = 4;

/// Sizing parameters of a dynamic ring buffer, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BufferConfig {
    /// Initial and smallest capacity.
    pub min_size: u32,
    /// Largest capacity the buffer may grow to.
    pub max_size: u32,
    /// Amount added or removed by a single resize.
    pub step_size: u32,
}

impl BufferConfig {
    /// Sizes used by the DLT user library for its message buffer.
    pub const USER_DEFAULT: Self = Self {
        min_size: 50_000,
        max_size: 500_000,
        step_size: 50_000,
    };

    /// Create a configuration from explicit sizes.
    pub const fn new(min_size: u32, max_size: u32, step_size: u32) -> Self {
        Self {
            min_size,
            max_size,
            step_size,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.min_size > self.max_size {
            return Err(Error::InvalidConfiguration(format!(
                "minimum size {} exceeds maximum size {}",
                self.min_size, self.max_size
            )));
        }
        if self.step_size > self.max_size {
            return Err(Error::InvalidConfiguration(format!(
                "step size {} exceeds maximum size {}",
                self.step_size, self.max_size
            )));
        }
        Ok(())
    }

    fn validate_resize(&self) -> Result<()> {
        if self.min_size > self.max_size {
            return Err(Error::InvalidConfiguration(format!(
                "minimum size {} exceeds maximum size {}",
                self.min_size, self.max_size
            )));
        }
        if self.step_size == 0 {
            return Err(Error::InvalidConfiguration(
                "step size is zero, buffer cannot be resized".into(),
            ));
        }
        Ok(())
    }
}

/// Outcome of copying a record out of the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordCopy {
    /// Number of bytes written into the output slice.
    pub copied: usize,
    /// Full length of the stored record.
    pub record_len: usize,
}

impl RecordCopy {
    /// Returns true when the output slice was too small for the whole record.
    pub fn is_truncated(&self) -> bool {
        self.copied < self.record_len
    }
}

/// Backing store and cursors of an active buffer.
#[derive(Debug)]
struct Storage {
    data: Vec<u8>,
    write: usize,
    read: usize,
    count: usize,
}

impl Storage {
    fn with_capacity(capacity: usize) -> Result<Self> {
        Ok(Self {
            data: allocate(capacity)?,
            write: 0,
            read: 0,
            count: 0,
        })
    }

    fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Bytes occupied by records, prefixes included.
    ///
    /// Equal cursors mean empty when no record is stored and full otherwise.
    fn used(&self) -> usize {
        if self.count == 0 {
            0
        } else if self.write > self.read {
            self.write - self.read
        } else {
            self.capacity().saturating_sub(self.read) + self.write
        }
    }

    fn free(&self) -> usize {
        self.capacity().saturating_sub(self.used())
    }

    /// Copy `data` into the store starting at `cursor`, wrapping at the end.
    ///
    /// Returns the number of bytes moved and advances `cursor`. Fewer bytes
    /// than requested are moved only if `data` is longer than the store or
    /// the cursor lies outside of it.
    fn write_block(&mut self, cursor: &mut usize, data: &[u8]) -> usize {
        let capacity = self.capacity();
        if capacity == 0 || *cursor >= capacity {
            return 0;
        }
        let size = data.len().min(capacity);
        let tail = capacity - *cursor;
        if size <= tail {
            self.data[*cursor..*cursor + size].copy_from_slice(&data[..size]);
        } else {
            self.data[*cursor..].copy_from_slice(&data[..tail]);
            self.data[..size - tail].copy_from_slice(&data[tail..size]);
        }
        *cursor = (*cursor + size) % capacity;
        size
    }

    /// Copy bytes out of the store starting at `cursor` into `out`, wrapping
    /// at the end. Mirrors [`Storage::write_block`].
    fn read_block(&self, cursor: &mut usize, out: &mut [u8]) -> usize {
        let capacity = self.capacity();
        if capacity == 0 || *cursor >= capacity {
            return 0;
        }
        let size = out.len().min(capacity);
        let tail = capacity - *cursor;
        if size <= tail {
            out[..size].copy_from_slice(&self.data[*cursor..*cursor + size]);
        } else {
            out[..tail].copy_from_slice(&self.data[*cursor..]);
            out[tail..size].copy_from_slice(&self.data[..size - tail]);
        }
        *cursor = (*cursor + size) % capacity;
        size
    }

    /// Check cursors and record count against the store before trusting them.
    fn check_bookkeeping(&self) -> Result<()> {
        let capacity = self.capacity();
        if capacity == 0 {
            if self.write != 0 || self.read != 0 || self.count != 0 {
                return Err(corrupt("cursors set on a zero-capacity buffer"));
            }
            return Ok(());
        }
        if self.write >= capacity || self.read >= capacity {
            return Err(corrupt(format!(
                "cursor out of range (write {}, read {}, capacity {capacity})",
                self.write, self.read
            )));
        }
        if self.count == 0 && self.write != self.read {
            return Err(corrupt(format!(
                "no records stored but cursors differ (write {}, read {})",
                self.write, self.read
            )));
        }
        if self.count > self.used() / RECORD_HEADER_SIZE {
            return Err(corrupt(format!(
                "{} records cannot fit into {} used bytes",
                self.count,
                self.used()
            )));
        }
        Ok(())
    }

    /// Read and validate the length prefix at `cursor`.
    ///
    /// `remaining` is the number of used bytes from `cursor` to the write
    /// cursor; the record must fit entirely inside it.
    fn record_len_at(&self, cursor: usize, remaining: usize) -> Result<usize> {
        if remaining < RECORD_HEADER_SIZE {
            return Err(corrupt(format!(
                "record header at offset {cursor} exceeds used space ({remaining} bytes left)"
            )));
        }
        let mut prefix = [0u8; RECORD_HEADER_SIZE];
        let mut position = cursor;
        self.read_block(&mut position, &mut prefix);
        let len = u32::from_ne_bytes(prefix) as usize;
        if len == 0 {
            return Err(corrupt(format!("zero-length record at offset {cursor}")));
        }
        if len > remaining - RECORD_HEADER_SIZE {
            return Err(corrupt(format!(
                "record at offset {cursor} declares {len} bytes, only {} stored",
                remaining - RECORD_HEADER_SIZE
            )));
        }
        Ok(len)
    }

    /// Find the `index`-th record from the read cursor.
    ///
    /// Returns the cursor of its length prefix and its payload length.
    fn locate(&self, index: usize) -> Result<(usize, usize)> {
        self.check_bookkeeping()?;
        if self.count == 0 {
            return Err(Error::BufferEmpty);
        }
        if index >= self.count {
            return Err(Error::NotPresent("record index"));
        }
        let capacity = self.capacity();
        let mut cursor = self.read;
        let mut remaining = self.used();
        for _ in 0..index {
            let len = self.record_len_at(cursor, remaining)?;
            cursor = (cursor + RECORD_HEADER_SIZE + len) % capacity;
            remaining -= RECORD_HEADER_SIZE + len;
        }
        let len = self.record_len_at(cursor, remaining)?;
        Ok((cursor, len))
    }

    fn payload_cursor(&self, cursor: usize) -> usize {
        (cursor + RECORD_HEADER_SIZE) % self.capacity()
    }

    fn copy_record(&self, cursor: usize, len: usize, out: &mut [u8]) -> RecordCopy {
        let copied = len.min(out.len());
        let mut position = self.payload_cursor(cursor);
        self.read_block(&mut position, &mut out[..copied]);
        RecordCopy {
            copied,
            record_len: len,
        }
    }

    fn drop_oldest(&mut self, len: usize) {
        self.read = (self.read + RECORD_HEADER_SIZE + len) % self.capacity();
        self.count -= 1;
    }

    /// Move all records into a store of `capacity` bytes, oldest first.
    fn relocate(&mut self, capacity: usize) -> Result<()> {
        let used = self.used();
        if used > capacity {
            return Err(Error::BufferFull {
                needed: used,
                available: capacity,
            });
        }
        let mut data = allocate(capacity)?;
        let mut cursor = self.read;
        self.read_block(&mut cursor, &mut data[..used]);
        self.data = data;
        self.read = 0;
        self.write = if capacity == 0 { 0 } else { used % capacity };
        Ok(())
    }
}

/// Zeroed store of `capacity` bytes; an allocation failure is reported instead of aborting.
fn allocate(capacity: usize) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    data.try_reserve_exact(capacity).map_err(|_| {
        Error::InvalidConfiguration(format!("cannot allocate {capacity} bytes"))
    })?;
    data.resize(capacity, 0);
    Ok(data)
}

fn corrupt(message: impl Into<alloc::string::String>) -> Error {
    let message = message.into();
    warn!("ring buffer corruption detected: {message}");
    Error::Corrupt(message)
}

/// A growable and shrinkable circular store of length-framed records.
///
/// A freshly created buffer is uninitialized: every operation fails with
/// [`Error::Uninitialized`] until [`RingBuffer::init_dynamic`] allocates the
/// store. No internal locking is performed; callers serialize access.
#[derive(Debug, Default)]
pub struct RingBuffer {
    config: BufferConfig,
    storage: Option<Storage>,
}

impl RingBuffer {
    /// Create an uninitialized buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and initialize a buffer from a [`BufferConfig`].
    pub fn with_config(config: BufferConfig) -> Result<Self> {
        let mut buffer = Self::new();
        buffer.init_dynamic(config.min_size, config.max_size, config.step_size)?;
        Ok(buffer)
    }

    /// Allocate the store with `min_size` bytes.
    ///
    /// Fails if the buffer is already active, if `min_size > max_size`, or if
    /// `step_size > max_size`.
    pub fn init_dynamic(&mut self, min_size: u32, max_size: u32, step_size: u32) -> Result<()> {
        if self.storage.is_some() {
            return Err(Error::AlreadyInitialized);
        }
        let config = BufferConfig::new(min_size, max_size, step_size);
        config.validate()?;

        self.storage = Some(Storage::with_capacity(min_size as usize)?);
        self.config = config;
        debug!("ring buffer initialized: min {min_size}, max {max_size}, step {step_size}");
        Ok(())
    }

    /// Release the store. The buffer becomes uninitialized again.
    pub fn free_dynamic(&mut self) -> Result<()> {
        match self.storage.take() {
            Some(_) => {
                debug!("ring buffer freed");
                Ok(())
            }
            None => Err(Error::Uninitialized),
        }
    }

    /// Returns true if the buffer currently owns a store.
    pub fn is_initialized(&self) -> bool {
        self.storage.is_some()
    }

    /// The sizing parameters given to the last successful initialization.
    pub fn config(&self) -> Result<BufferConfig> {
        self.active().map(|_| self.config)
    }

    fn active(&self) -> Result<&Storage> {
        self.storage.as_ref().ok_or(Error::Uninitialized)
    }

    fn active_mut(&mut self) -> Result<&mut Storage> {
        self.storage.as_mut().ok_or(Error::Uninitialized)
    }

    /// Grow the store by `step_size`, clamped to `max_size`.
    ///
    /// Stored records are preserved and moved to the start of the new store.
    pub fn increase_size(&mut self) -> Result<()> {
        let config = self.config;
        let storage = self.active_mut()?;
        config.validate_resize()?;

        let capacity = storage.capacity();
        let max = config.max_size as usize;
        if capacity >= max {
            return Err(Error::BufferFull {
                needed: capacity.saturating_add(config.step_size as usize),
                available: max,
            });
        }
        let new_capacity = capacity.saturating_add(config.step_size as usize).min(max);
        storage.relocate(new_capacity)?;
        debug!("ring buffer grown from {capacity} to {new_capacity} bytes");
        Ok(())
    }

    /// Shrink the store by `step_size`, floored at `min_size`.
    ///
    /// Fails with [`Error::BufferFull`] if the stored records do not fit into
    /// the smaller store; the buffer is left unchanged in that case.
    pub fn minimize_size(&mut self) -> Result<()> {
        let config = self.config;
        let storage = self.active_mut()?;
        config.validate_resize()?;

        let capacity = storage.capacity();
        let min = config.min_size as usize;
        if capacity <= min {
            return Err(Error::InvalidConfiguration(format!(
                "buffer already at its minimum size of {min} bytes"
            )));
        }
        let new_capacity = capacity.saturating_sub(config.step_size as usize).max(min);
        storage.relocate(new_capacity)?;
        debug!("ring buffer shrunk from {capacity} to {new_capacity} bytes");
        Ok(())
    }

    /// Drop all records. The store is kept but not zeroed.
    pub fn reset(&mut self) -> Result<()> {
        let storage = self.active_mut()?;
        storage.write = 0;
        storage.read = 0;
        storage.count = 0;
        Ok(())
    }

    /// Append one record.
    pub fn push(&mut self, data: &[u8]) -> Result<()> {
        self.push3(Some(data), None, None)
    }

    /// Append one record made of up to three chunks.
    ///
    /// Absent chunks are skipped; a present chunk must not be empty and at
    /// least one chunk must be present. If the free space is insufficient the
    /// buffer grows step by step; when even `max_size` cannot hold the record
    /// the push fails with [`Error::BufferFull`] and nothing changes.
    pub fn push3(&mut self, a: Option<&[u8]>, b: Option<&[u8]>, c: Option<&[u8]>) -> Result<()> {
        let config = self.config;
        let storage = self.active()?;
        storage.check_bookkeeping()?;

        let chunks = [a, b, c];
        if chunks.iter().flatten().any(|chunk| chunk.is_empty()) {
            return Err(Error::NullArgument("empty record chunk"));
        }
        if chunks.iter().all(Option::is_none) {
            return Err(Error::NullArgument("record data"));
        }
        let total: usize = chunks.iter().flatten().map(|chunk| chunk.len()).sum();
        let len = u32::try_from(total).map_err(|_| Error::BufferFull {
            needed: total,
            available: u32::MAX as usize,
        })?;
        let needed = RECORD_HEADER_SIZE + total;

        let free = storage.free();
        if free < needed {
            let growable = config.step_size > 0 && config.min_size <= config.max_size;
            let reachable = if growable {
                (config.max_size as usize).max(storage.capacity()) - storage.used()
            } else {
                free
            };
            if reachable < needed {
                return Err(Error::BufferFull {
                    needed,
                    available: reachable,
                });
            }
            while self.active()?.free() < needed {
                self.increase_size()?;
            }
        }

        let storage = self.active_mut()?;
        let mut cursor = storage.write;
        let mut written = storage.write_block(&mut cursor, &len.to_ne_bytes());
        for chunk in chunks.iter().flatten() {
            written += storage.write_block(&mut cursor, chunk);
        }
        debug_assert_eq!(written, needed);
        storage.write = cursor;
        storage.count += 1;
        trace!("pushed record of {total} bytes ({} stored)", storage.count);
        Ok(())
    }

    /// Copy the `record_index`-th record (0 = oldest) into `out`.
    ///
    /// At most `out.len()` bytes are copied; [`RecordCopy::is_truncated`]
    /// reports a short copy. With `erase` set and `record_index == 0` the
    /// record is removed afterwards.
    pub fn get(&mut self, out: &mut [u8], record_index: usize, erase: bool) -> Result<RecordCopy> {
        let storage = self.active_mut()?;
        if out.is_empty() {
            return Err(Error::NullArgument("output buffer"));
        }
        let (cursor, len) = storage.locate(record_index)?;
        let copy = storage.copy_record(cursor, len, out);
        if erase && record_index == 0 {
            storage.drop_oldest(len);
            trace!("pulled record of {len} bytes ({} left)", storage.count);
        }
        Ok(copy)
    }

    /// Read and remove the oldest record.
    pub fn pull(&mut self, out: &mut [u8]) -> Result<RecordCopy> {
        self.get(out, 0, true)
    }

    /// Remove the oldest record without copying it.
    ///
    /// Returns the length of the removed record.
    pub fn remove(&mut self) -> Result<usize> {
        let storage = self.active_mut()?;
        let (_, len) = storage.locate(0)?;
        storage.drop_oldest(len);
        Ok(len)
    }

    /// Copy the oldest record into `out` without removing it.
    pub fn copy(&self, out: &mut [u8]) -> Result<RecordCopy> {
        let storage = self.active()?;
        if out.is_empty() {
            return Err(Error::NullArgument("output buffer"));
        }
        let (cursor, len) = storage.locate(0)?;
        Ok(storage.copy_record(cursor, len, out))
    }

    /// Length of the oldest record, for sizing the output of [`RingBuffer::pull`].
    pub fn next_record_len(&self) -> Result<usize> {
        let storage = self.active()?;
        storage.locate(0).map(|(_, len)| len)
    }

    /// Number of stored records.
    pub fn message_count(&self) -> Result<usize> {
        self.active().map(|storage| storage.count)
    }

    /// Current capacity of the store in bytes.
    pub fn total_size(&self) -> Result<usize> {
        self.active().map(Storage::capacity)
    }

    /// Bytes occupied by stored records, length prefixes included.
    pub fn used_size(&self) -> Result<usize> {
        self.active().map(Storage::used)
    }

    /// Bytes available without growing the store.
    pub fn free_size(&self) -> Result<usize> {
        self.active().map(Storage::free)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn buffer(min: u32, max: u32, step: u32) -> RingBuffer {
        let mut buffer = RingBuffer::new();
        buffer.init_dynamic(min, max, step).unwrap();
        buffer
    }

    fn storage_mut(buffer: &mut RingBuffer) -> &mut Storage {
        buffer.storage.as_mut().unwrap()
    }

    #[test]
    fn test_write_block_wraps_at_end() {
        let mut storage = Storage::with_capacity(8).unwrap();
        let mut cursor = 6;
        assert_eq!(storage.write_block(&mut cursor, &[1, 2, 3, 4]), 4);
        assert_eq!(cursor, 2);
        assert_eq!(storage.data, vec![3, 4, 0, 0, 0, 0, 1, 2]);

        let mut cursor = 6;
        let mut out = [0u8; 4];
        assert_eq!(storage.read_block(&mut cursor, &mut out), 4);
        assert_eq!(out, [1, 2, 3, 4]);
        assert_eq!(cursor, 2);
    }

    #[test]
    fn test_write_block_accumulates_cursor() {
        let mut storage = Storage::with_capacity(10_000).unwrap();
        let mut cursor = 0;
        let data = vec![0xAAu8; 100];
        let mut total = 0;
        for size in 0..=100 {
            total += storage.write_block(&mut cursor, &data[..size]);
            assert_eq!(cursor, total % 10_000);
        }
        assert_eq!(total, 5050);
    }

    #[test]
    fn test_write_block_rejects_bad_cursor() {
        let mut storage = Storage::with_capacity(8).unwrap();
        let mut cursor = 8;
        assert_eq!(storage.write_block(&mut cursor, &[1]), 0);

        let mut empty = Storage::with_capacity(0).unwrap();
        let mut cursor = 0;
        assert_eq!(empty.write_block(&mut cursor, &[1]), 0);
    }

    #[test]
    fn test_record_wraps_around_store() {
        let mut buffer = buffer(16, 16, 0);
        buffer.push(&[1; 10]).unwrap();
        buffer.remove().unwrap();
        // length prefix now straddles the end of the store
        buffer.push(&[2; 6]).unwrap();

        let storage = storage_mut(&mut buffer);
        assert_eq!(storage.read, 14);
        assert_eq!(storage.write, 8);

        let mut out = [0u8; 8];
        let copy = buffer.pull(&mut out).unwrap();
        assert_eq!(copy.copied, 6);
        assert_eq!(&out[..6], &[2; 6]);
        assert_eq!(buffer.used_size().unwrap(), 0);
    }

    #[test]
    fn test_corrupt_length_prefix_is_rejected() {
        let mut buffer = buffer(64, 64, 0);
        buffer.push(&[7; 8]).unwrap();
        storage_mut(&mut buffer).data[..4].copy_from_slice(&50_000u32.to_ne_bytes());

        let mut out = [0u8; 16];
        assert!(matches!(buffer.pull(&mut out), Err(Error::Corrupt(_))));
        assert!(matches!(buffer.copy(&mut out), Err(Error::Corrupt(_))));
        assert!(matches!(buffer.remove(), Err(Error::Corrupt(_))));
        assert_eq!(buffer.message_count().unwrap(), 1);
    }

    #[test]
    fn test_negative_length_prefix_is_rejected() {
        let mut buffer = buffer(64, 64, 0);
        buffer.push(&[7; 8]).unwrap();
        storage_mut(&mut buffer).data[..4].copy_from_slice(&(-50_000i32).to_ne_bytes());

        let mut out = [0u8; 16];
        assert!(matches!(buffer.get(&mut out, 0, true), Err(Error::Corrupt(_))));
    }

    #[test]
    fn test_zero_length_prefix_is_rejected() {
        let mut buffer = buffer(64, 64, 0);
        buffer.push(&[7; 8]).unwrap();
        storage_mut(&mut buffer).data[..4].copy_from_slice(&0u32.to_ne_bytes());

        let mut out = [0u8; 16];
        assert!(matches!(buffer.get(&mut out, 0, false), Err(Error::Corrupt(_))));
    }

    #[test]
    fn test_corrupt_cursors_are_rejected() {
        let mut out = [0u8; 16];

        let mut buffer = buffer(64, 64, 0);
        buffer.push(&[7; 8]).unwrap();
        storage_mut(&mut buffer).read = 50_000;
        assert!(matches!(buffer.get(&mut out, 0, true), Err(Error::Corrupt(_))));

        let mut buffer = self::buffer(64, 64, 0);
        buffer.push(&[7; 8]).unwrap();
        storage_mut(&mut buffer).write = 50_000;
        assert!(matches!(buffer.get(&mut out, 0, true), Err(Error::Corrupt(_))));

        let mut buffer = self::buffer(64, 64, 0);
        buffer.push(&[7; 8]).unwrap();
        storage_mut(&mut buffer).count = 50_000;
        assert!(matches!(buffer.get(&mut out, 0, true), Err(Error::Corrupt(_))));

        let mut buffer = self::buffer(64, 64, 0);
        buffer.push(&[7; 8]).unwrap();
        storage_mut(&mut buffer).count = 0;
        assert!(matches!(buffer.get(&mut out, 0, true), Err(Error::Corrupt(_))));
    }

    #[test]
    fn test_corrupt_second_record_detected_while_skipping() {
        let mut buffer = buffer(64, 64, 0);
        buffer.push(&[1; 4]).unwrap();
        buffer.push(&[2; 4]).unwrap();
        storage_mut(&mut buffer).data[8..12].copy_from_slice(&19u32.to_ne_bytes());

        let mut out = [0u8; 16];
        assert_eq!(buffer.get(&mut out, 0, false).unwrap().copied, 4);
        assert!(matches!(buffer.get(&mut out, 1, false), Err(Error::Corrupt(_))));
    }

    #[test]
    fn test_grow_preserves_wrapped_records() {
        let mut buffer = buffer(16, 64, 16);
        buffer.push(&[1; 10]).unwrap();
        buffer.remove().unwrap();
        buffer.push(&[2; 6]).unwrap();
        buffer.push(&[3; 2]).unwrap();
        assert_eq!(buffer.free_size().unwrap(), 0);

        buffer.increase_size().unwrap();

        let storage = storage_mut(&mut buffer);
        assert_eq!(storage.capacity(), 32);
        assert_eq!(storage.read, 0);
        assert_eq!(storage.write, 16);

        let mut out = [0u8; 8];
        assert_eq!(buffer.pull(&mut out).unwrap().copied, 6);
        assert_eq!(&out[..6], &[2; 6]);
        assert_eq!(buffer.pull(&mut out).unwrap().copied, 2);
        assert_eq!(&out[..2], &[3; 2]);
    }

    #[test]
    fn test_full_store_has_equal_cursors() {
        let mut buffer = buffer(12, 12, 0);
        buffer.push(&[9; 8]).unwrap();

        let storage = storage_mut(&mut buffer);
        assert_eq!(storage.write, storage.read);
        assert_eq!(storage.used(), 12);
        assert_eq!(storage.free(), 0);
        assert!(matches!(buffer.push(&[1]), Err(Error::BufferFull { .. })));
    }
}
