//! Cached read/write windows over a backing store.
//!
//! A [`StreamUnit`] owns the bytes for one `(offset, capacity)` range and
//! remembers whether they changed. Nothing is written until [`StreamUnit::flush`],
//! and a clean unit never touches the store. [`Field`] is the typed variant
//! used for header fields such as ids, lengths and depths.

use crate::storage::block::BlockError;
use crate::storage::io::{Storage, StorageError};
use crate::storage::value::FixedWidth;

/// A raw byte window.
///
/// # Invariants
///
/// - `data.len() <= capacity`
/// - `dirty` is set by every mutation and cleared only by a successful flush
#[derive(Debug, Clone)]
pub struct StreamUnit {
    offset: u64,
    capacity: usize,
    data: Vec<u8>,
    dirty: bool,
}

impl StreamUnit {
    /// Read `capacity` bytes at `offset`.
    pub fn load(storage: &mut dyn Storage, offset: u64, capacity: usize) -> Result<Self, StorageError> {
        let mut data = vec![0u8; capacity];
        storage.read_at(offset, &mut data)?;
        Ok(Self::from_bytes(offset, capacity, data))
    }

    /// Wrap bytes that were already read as part of a larger region.
    #[must_use]
    pub const fn from_bytes(offset: u64, capacity: usize, data: Vec<u8>) -> Self {
        Self {
            offset,
            capacity,
            data,
            dirty: false,
        }
    }

    /// A unit that does not exist on disk yet: zero-filled and dirty, so the
    /// whole range is written on flush.
    #[must_use]
    pub fn create(offset: u64, capacity: usize) -> Self {
        Self {
            offset,
            capacity,
            data: vec![0u8; capacity],
            dirty: true,
        }
    }

    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Replace the leading bytes of the window with `bytes`.
    ///
    /// Bytes beyond `bytes.len()` keep their previous contents; readers of
    /// length-prefixed payloads never look at them.
    pub fn update(&mut self, bytes: &[u8]) -> Result<(), BlockError> {
        if bytes.len() > self.capacity {
            return Err(BlockError::ValueTooLarge {
                len: bytes.len(),
                capacity: self.capacity,
            });
        }
        if self.data.len() < bytes.len() {
            self.data.resize(bytes.len(), 0);
        }
        if self.data[..bytes.len()] != *bytes {
            self.data[..bytes.len()].copy_from_slice(bytes);
            self.dirty = true;
        }
        Ok(())
    }

    /// Write the window back if, and only if, it changed.
    pub fn flush(&mut self, storage: &mut dyn Storage) -> Result<(), StorageError> {
        if self.dirty {
            storage.write_at(self.offset, &self.data)?;
            self.dirty = false;
        }
        Ok(())
    }
}

/// A typed header field backed by its own window.
#[derive(Debug, Clone)]
pub struct Field<T: FixedWidth> {
    unit: StreamUnit,
    value: T,
}

impl<T: FixedWidth> Field<T> {
    /// Decode the field from bytes already read at `offset`.
    #[must_use]
    pub fn from_bytes(offset: u64, bytes: &[u8]) -> Self {
        let data = bytes[..T::WIDTH].to_vec();
        let value = T::read_le(&data);
        Self {
            unit: StreamUnit::from_bytes(offset, T::WIDTH, data),
            value,
        }
    }

    /// Read the field directly from the store.
    pub fn load(storage: &mut dyn Storage, offset: u64) -> Result<Self, StorageError> {
        let unit = StreamUnit::load(storage, offset, T::WIDTH)?;
        let value = T::read_le(unit.bytes());
        Ok(Self { unit, value })
    }

    /// A new field holding `value`, written on the next flush.
    #[must_use]
    pub fn create(offset: u64, value: T) -> Self {
        let mut field = Self {
            unit: StreamUnit::create(offset, T::WIDTH),
            value: T::default(),
        };
        field.store(value);
        field
    }

    #[must_use]
    pub const fn get(&self) -> T {
        self.value
    }

    /// Set the field, marking it dirty only if the encoding changes.
    pub fn set(&mut self, value: T) {
        self.store(value);
    }

    fn store(&mut self, value: T) {
        let mut buf = vec![0u8; T::WIDTH];
        value.write_le(&mut buf);
        if self.unit.data != buf {
            self.unit.data = buf;
            self.unit.dirty = true;
        }
        self.value = value;
    }

    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.unit.is_dirty()
    }

    pub fn flush(&mut self, storage: &mut dyn Storage) -> Result<(), StorageError> {
        self.unit.flush(storage)
    }
}
