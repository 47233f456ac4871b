//! Fixed-capacity slots inside a gather file.
//!
//! # Slot Layout
//!
//! Slot `id` occupies `header_size + id * capacity .. + capacity`. Three
//! block flavors share that addressing and differ only in their header:
//!
//! ```text
//! Block:     | next (8) | payload ...                                              |
//! SizeBlock: | next (8) | len (4) | payload ...                                    |
//! AvlBlock:  | parent (8) | left (8) | ldepth (1) | right (8) | rdepth (1) | len (4) | payload ... |
//! ```
//!
//! The free list always reads slots through the plain [`Block`] view, so a
//! released slot of any flavor is linked through its first eight bytes.

use crate::storage::RowId;
use crate::storage::io::{Storage, StorageError};
use crate::storage::stream_unit::{Field, StreamUnit};

/// Errors raised while encoding or decoding block payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockError {
    /// The payload does not fit in the block.
    ValueTooLarge { len: usize, capacity: usize },
    /// Stored bytes could not be decoded into the column type.
    Decode(String),
}

impl std::fmt::Display for BlockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ValueTooLarge { len, capacity } => {
                write!(f, "value of {len} bytes exceeds block payload capacity {capacity}")
            }
            Self::Decode(msg) => write!(f, "cannot decode stored value: {msg}"),
        }
    }
}

impl std::error::Error for BlockError {}

/// Addressing parameters shared by every slot of one gather file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    /// Bytes reserved for the gather header before slot 0.
    pub header_size: u64,
    /// Bytes per slot.
    pub capacity: u32,
}

impl Layout {
    #[must_use]
    pub const fn new(header_size: u64, capacity: u32) -> Self {
        Self {
            header_size,
            capacity,
        }
    }

    /// Absolute offset of slot `id`. Depends only on `id` and the capacity,
    /// so a slot never moves.
    #[must_use]
    pub const fn offset(&self, id: RowId) -> u64 {
        self.header_size + id * self.capacity as u64
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity as usize
    }
}

/// Minimal contract shared by every block flavor.
pub trait Slot {
    /// Slot id inside the gather.
    fn id(&self) -> RowId;

    /// Whether any field or the payload has unflushed changes.
    fn is_dirty(&self) -> bool;

    /// Write back changed fields. A no-op for clean blocks, so calling it
    /// repeatedly is harmless.
    fn flush(&mut self, storage: &mut dyn Storage) -> Result<(), StorageError>;
}

mod offsets {
    pub const NEXT: u64 = 0;
    pub const SIZE_LEN: u64 = 8;
    pub const SIZE_PAYLOAD: u64 = 12;

    pub const AVL_PARENT: u64 = 0;
    pub const AVL_LEFT: u64 = 8;
    pub const AVL_LEFT_DEPTH: u64 = 16;
    pub const AVL_RIGHT: u64 = 17;
    pub const AVL_RIGHT_DEPTH: u64 = 25;
    pub const AVL_LEN: u64 = 26;
    pub const AVL_PAYLOAD: u64 = 30;
}

/// Header size of a [`Block`].
pub const BLOCK_HEADER_SIZE: usize = 8;
/// Header size of a [`SizeBlock`].
pub const SIZE_BLOCK_HEADER_SIZE: usize = offsets::SIZE_PAYLOAD as usize;
/// Header size of an [`AvlBlock`].
pub const AVL_BLOCK_HEADER_SIZE: usize = offsets::AVL_PAYLOAD as usize;

fn slice_at(region: &[u8], offset: u64) -> &[u8] {
    #[allow(clippy::cast_possible_truncation)]
    &region[offset as usize..]
}

/// A slot viewed only through its forward link. Used by the free list.
#[derive(Debug)]
pub struct Block {
    id: RowId,
    next: Field<u64>,
}

impl Block {
    /// Read the forward link of slot `id`.
    pub fn load(storage: &mut dyn Storage, layout: Layout, id: RowId) -> Result<Self, StorageError> {
        let next = Field::load(storage, layout.offset(id) + offsets::NEXT)?;
        Ok(Self { id, next })
    }

    /// A slot that has never been written, linked to nothing.
    #[must_use]
    pub fn create(layout: Layout, id: RowId) -> Self {
        debug_assert!(layout.capacity() >= BLOCK_HEADER_SIZE);
        Self {
            id,
            next: Field::create(layout.offset(id) + offsets::NEXT, 0),
        }
    }

    #[must_use]
    pub const fn next(&self) -> RowId {
        self.next.get()
    }

    pub fn set_next(&mut self, next: RowId) {
        self.next.set(next);
    }
}

impl Slot for Block {
    fn id(&self) -> RowId {
        self.id
    }

    fn is_dirty(&self) -> bool {
        self.next.is_dirty()
    }

    fn flush(&mut self, storage: &mut dyn Storage) -> Result<(), StorageError> {
        self.next.flush(storage)
    }
}

/// A slot with a length-prefixed payload.
#[derive(Debug)]
pub struct SizeBlock {
    id: RowId,
    next: Field<u64>,
    len: Field<u32>,
    payload: StreamUnit,
}

impl SizeBlock {
    /// Load slot `id` with a single read of its region.
    pub fn load(storage: &mut dyn Storage, layout: Layout, id: RowId) -> Result<Self, StorageError> {
        let base = layout.offset(id);
        let region = StreamUnit::load(storage, base, layout.capacity())?;
        let bytes = region.bytes();
        Ok(Self {
            id,
            next: Field::from_bytes(base + offsets::NEXT, slice_at(bytes, offsets::NEXT)),
            len: Field::from_bytes(base + offsets::SIZE_LEN, slice_at(bytes, offsets::SIZE_LEN)),
            payload: StreamUnit::from_bytes(
                base + offsets::SIZE_PAYLOAD,
                Self::payload_capacity(layout),
                slice_at(bytes, offsets::SIZE_PAYLOAD).to_vec(),
            ),
        })
    }

    /// A fresh, fully dirty slot holding `data`.
    pub fn create(layout: Layout, id: RowId, data: &[u8]) -> Result<Self, BlockError> {
        let base = layout.offset(id);
        let mut block = Self {
            id,
            next: Field::create(base + offsets::NEXT, 0),
            len: Field::create(base + offsets::SIZE_LEN, 0),
            payload: StreamUnit::create(base + offsets::SIZE_PAYLOAD, Self::payload_capacity(layout)),
        };
        block.set_data(data)?;
        Ok(block)
    }

    /// Bytes available for payload in each slot of `layout`.
    #[must_use]
    pub const fn payload_capacity(layout: Layout) -> usize {
        layout.capacity().saturating_sub(SIZE_BLOCK_HEADER_SIZE)
    }

    #[must_use]
    pub const fn next(&self) -> RowId {
        self.next.get()
    }

    pub fn set_next(&mut self, next: RowId) {
        self.next.set(next);
    }

    /// The stored payload, truncated to its recorded length.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        let len = (self.len.get() as usize).min(self.payload.capacity());
        &self.payload.bytes()[..len]
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn set_data(&mut self, data: &[u8]) -> Result<(), BlockError> {
        self.payload.update(data)?;
        self.len.set(data.len() as u32);
        Ok(())
    }
}

impl Slot for SizeBlock {
    fn id(&self) -> RowId {
        self.id
    }

    fn is_dirty(&self) -> bool {
        self.next.is_dirty() || self.len.is_dirty() || self.payload.is_dirty()
    }

    fn flush(&mut self, storage: &mut dyn Storage) -> Result<(), StorageError> {
        self.next.flush(storage)?;
        self.len.flush(storage)?;
        self.payload.flush(storage)
    }
}

/// A tree node slot: links to parent and children, cached subtree depths,
/// and a length-prefixed value.
#[derive(Debug)]
pub struct AvlBlock {
    id: RowId,
    parent: Field<u64>,
    left: Field<u64>,
    left_depth: Field<u8>,
    right: Field<u64>,
    right_depth: Field<u8>,
    len: Field<u32>,
    payload: StreamUnit,
}

impl AvlBlock {
    pub fn load(storage: &mut dyn Storage, layout: Layout, id: RowId) -> Result<Self, StorageError> {
        let base = layout.offset(id);
        let region = StreamUnit::load(storage, base, layout.capacity())?;
        let bytes = region.bytes();
        Ok(Self {
            id,
            parent: Field::from_bytes(base + offsets::AVL_PARENT, slice_at(bytes, offsets::AVL_PARENT)),
            left: Field::from_bytes(base + offsets::AVL_LEFT, slice_at(bytes, offsets::AVL_LEFT)),
            left_depth: Field::from_bytes(
                base + offsets::AVL_LEFT_DEPTH,
                slice_at(bytes, offsets::AVL_LEFT_DEPTH),
            ),
            right: Field::from_bytes(base + offsets::AVL_RIGHT, slice_at(bytes, offsets::AVL_RIGHT)),
            right_depth: Field::from_bytes(
                base + offsets::AVL_RIGHT_DEPTH,
                slice_at(bytes, offsets::AVL_RIGHT_DEPTH),
            ),
            len: Field::from_bytes(base + offsets::AVL_LEN, slice_at(bytes, offsets::AVL_LEN)),
            payload: StreamUnit::from_bytes(
                base + offsets::AVL_PAYLOAD,
                Self::payload_capacity(layout),
                slice_at(bytes, offsets::AVL_PAYLOAD).to_vec(),
            ),
        })
    }

    /// A detached node holding `data`, with every field dirty.
    pub fn create(layout: Layout, id: RowId, data: &[u8]) -> Result<Self, BlockError> {
        let base = layout.offset(id);
        let mut block = Self {
            id,
            parent: Field::create(base + offsets::AVL_PARENT, 0),
            left: Field::create(base + offsets::AVL_LEFT, 0),
            left_depth: Field::create(base + offsets::AVL_LEFT_DEPTH, 0),
            right: Field::create(base + offsets::AVL_RIGHT, 0),
            right_depth: Field::create(base + offsets::AVL_RIGHT_DEPTH, 0),
            len: Field::create(base + offsets::AVL_LEN, 0),
            payload: StreamUnit::create(base + offsets::AVL_PAYLOAD, Self::payload_capacity(layout)),
        };
        block.set_data(data)?;
        Ok(block)
    }

    #[must_use]
    pub const fn payload_capacity(layout: Layout) -> usize {
        layout.capacity().saturating_sub(AVL_BLOCK_HEADER_SIZE)
    }

    #[must_use]
    pub const fn parent(&self) -> RowId {
        self.parent.get()
    }

    pub fn set_parent(&mut self, id: RowId) {
        self.parent.set(id);
    }

    #[must_use]
    pub const fn left(&self) -> RowId {
        self.left.get()
    }

    pub fn set_left(&mut self, id: RowId) {
        self.left.set(id);
    }

    #[must_use]
    pub const fn right(&self) -> RowId {
        self.right.get()
    }

    pub fn set_right(&mut self, id: RowId) {
        self.right.set(id);
    }

    #[must_use]
    pub const fn left_depth(&self) -> u8 {
        self.left_depth.get()
    }

    #[must_use]
    pub const fn right_depth(&self) -> u8 {
        self.right_depth.get()
    }

    pub fn set_depths(&mut self, left: u8, right: u8) {
        self.left_depth.set(left);
        self.right_depth.set(right);
    }

    /// Height of the subtree rooted here.
    #[must_use]
    pub fn depth(&self) -> u8 {
        1 + self.left_depth().max(self.right_depth())
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        let len = (self.len.get() as usize).min(self.payload.capacity());
        &self.payload.bytes()[..len]
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn set_data(&mut self, data: &[u8]) -> Result<(), BlockError> {
        self.payload.update(data)?;
        self.len.set(data.len() as u32);
        Ok(())
    }
}

impl Slot for AvlBlock {
    fn id(&self) -> RowId {
        self.id
    }

    fn is_dirty(&self) -> bool {
        self.parent.is_dirty()
            || self.left.is_dirty()
            || self.left_depth.is_dirty()
            || self.right.is_dirty()
            || self.right_depth.is_dirty()
            || self.len.is_dirty()
            || self.payload.is_dirty()
    }

    fn flush(&mut self, storage: &mut dyn Storage) -> Result<(), StorageError> {
        self.parent.flush(storage)?;
        self.left.flush(storage)?;
        self.left_depth.flush(storage)?;
        self.right.flush(storage)?;
        self.right_depth.flush(storage)?;
        self.len.flush(storage)?;
        self.payload.flush(storage)
    }
}
