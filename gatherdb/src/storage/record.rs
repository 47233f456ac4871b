//! Records: one or more blocks treated as one logical value.
//!
//! - [`SingleRecord`]: one length-prefixed block.
//! - [`ChainRecord`]: the free list, a chain of otherwise unused slots
//!   hanging off slot 0.
//! - [`PolylithRecord`]: a byte blob split across linked length-prefixed blocks.
//! - [`AvlRecord`]: one tree node together with its decoded value.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use crate::storage::RowId;
use crate::storage::block::{AvlBlock, Block, BlockError, Layout, SizeBlock, Slot};
use crate::storage::gather::{GatherCore, GatherError};
use crate::storage::io::{Storage, StorageError};
use crate::storage::value::StoredValue;

/// A value held in exactly one length-prefixed block.
#[derive(Debug)]
pub struct SingleRecord {
    block: SizeBlock,
}

impl SingleRecord {
    pub fn load(storage: &mut dyn Storage, layout: Layout, id: RowId) -> Result<Self, StorageError> {
        Ok(Self {
            block: SizeBlock::load(storage, layout, id)?,
        })
    }

    pub fn create(layout: Layout, id: RowId, data: &[u8]) -> Result<Self, BlockError> {
        Ok(Self {
            block: SizeBlock::create(layout, id, data)?,
        })
    }

    #[must_use]
    pub fn id(&self) -> RowId {
        self.block.id()
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.block.data()
    }

    pub fn set_data(&mut self, data: &[u8]) -> Result<(), BlockError> {
        self.block.set_data(data)
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.block.is_dirty()
    }

    pub fn flush(&mut self, storage: &mut dyn Storage) -> Result<(), StorageError> {
        self.block.flush(storage)
    }
}

/// The chain of reclaimed slots starting at slot 0.
///
/// Chain order is mirrored in memory so that the tail and any member can be
/// found without walking the file. Only the forward links touched by a
/// change are written back.
///
/// # Invariants
///
/// - `members` lists the chain after the head, in link order
/// - `member_set` contains exactly the ids in `members`
/// - slot 0 is the head and never a member
#[derive(Debug)]
pub struct ChainRecord {
    layout: Layout,
    members: Vec<RowId>,
    member_set: HashSet<RowId>,
    blocks: HashMap<RowId, Block>,
}

impl ChainRecord {
    /// An empty chain for a brand new file. The head link is written on flush.
    #[must_use]
    pub fn create(layout: Layout) -> Self {
        let mut blocks = HashMap::new();
        blocks.insert(0, Block::create(layout, 0));
        Self {
            layout,
            members: Vec::new(),
            member_set: HashSet::new(),
            blocks,
        }
    }

    /// Walk the chain stored in the file.
    ///
    /// Every member must be a slot at or below `latest`, and no slot may
    /// appear twice.
    pub fn open(storage: &mut dyn Storage, layout: Layout, latest: RowId) -> Result<Self, GatherError> {
        let mut members = Vec::new();
        let mut member_set = HashSet::new();

        let mut next = Block::load(storage, layout, 0)?.next();
        while next != 0 {
            if next > latest || !member_set.insert(next) {
                return Err(GatherError::Corrupt(format!(
                    "free list links to slot {next} (latest allocated id {latest})"
                )));
            }
            members.push(next);
            next = Block::load(storage, layout, next)?.next();
        }

        Ok(Self {
            layout,
            members,
            member_set,
            blocks: HashMap::new(),
        })
    }

    #[must_use]
    pub fn contains(&self, id: RowId) -> bool {
        self.member_set.contains(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Members in chain order.
    #[must_use]
    pub fn ids(&self) -> &[RowId] {
        &self.members
    }

    fn block(&mut self, storage: &mut dyn Storage, id: RowId) -> Result<&mut Block, StorageError> {
        let layout = self.layout;
        match self.blocks.entry(id) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => Ok(entry.insert(Block::load(storage, layout, id)?)),
        }
    }

    /// Append `id` after the current tail.
    pub fn push(&mut self, storage: &mut dyn Storage, id: RowId) -> Result<(), StorageError> {
        debug_assert!(id != 0 && !self.contains(id));
        let tail = self.members.last().copied().unwrap_or(0);
        self.block(storage, tail)?.set_next(id);

        self.blocks.insert(id, Block::create(self.layout, id));
        self.members.push(id);
        self.member_set.insert(id);
        Ok(())
    }

    /// Detach and return the tail, or `None` if only the head remains.
    pub fn pop_tail(&mut self, storage: &mut dyn Storage) -> Result<Option<RowId>, StorageError> {
        let Some(id) = self.members.pop() else {
            return Ok(None);
        };
        let new_tail = self.members.last().copied().unwrap_or(0);
        self.block(storage, new_tail)?.set_next(0);
        self.forget(id);
        Ok(Some(id))
    }

    /// Detach a specific member, splicing its neighbors together.
    ///
    /// Returns `false` if `id` is not on the chain.
    pub fn remove(&mut self, storage: &mut dyn Storage, id: RowId) -> Result<bool, StorageError> {
        let Some(position) = self.members.iter().position(|member| *member == id) else {
            return Ok(false);
        };
        let previous = if position == 0 { 0 } else { self.members[position - 1] };
        let next = self.members.get(position + 1).copied().unwrap_or(0);

        self.block(storage, previous)?.set_next(next);
        self.members.remove(position);
        self.forget(id);
        Ok(true)
    }

    /// A detached slot now belongs to its new owner, who rewrites it fully;
    /// its pending link must not be written over that.
    fn forget(&mut self, id: RowId) {
        self.member_set.remove(&id);
        self.blocks.remove(&id);
    }

    pub fn flush(&mut self, storage: &mut dyn Storage) -> Result<(), StorageError> {
        for block in self.blocks.values_mut() {
            block.flush(storage)?;
        }
        self.blocks.clear();
        Ok(())
    }
}

/// A byte blob spread over linked length-prefixed blocks.
///
/// The first block's id is the record id. Continuation blocks are taken from
/// the same gather's allocator.
#[derive(Debug)]
pub struct PolylithRecord {
    blocks: Vec<SizeBlock>,
}

impl PolylithRecord {
    /// Load the chain starting at `id`.
    pub fn load(core: &mut GatherCore, id: RowId) -> Result<Self, GatherError> {
        let layout = core.layout();
        let limit = core.latest();
        let mut blocks = Vec::new();
        let mut next = id;
        while next != 0 {
            if next > limit || blocks.len() as u64 >= limit {
                return Err(GatherError::Corrupt(format!(
                    "blob chain from slot {id} links to slot {next}"
                )));
            }
            let block = SizeBlock::load(core.storage_mut(), layout, next)?;
            next = block.next();
            blocks.push(block);
        }
        Ok(Self { blocks })
    }

    /// Write `data` as a new record whose first block is `id`.
    pub fn create(core: &mut GatherCore, id: RowId, data: &[u8]) -> Result<Self, GatherError> {
        let first = SizeBlock::create(core.layout(), id, &[])?;
        let mut record = Self { blocks: vec![first] };
        record.write(core, data)?;
        Ok(record)
    }

    #[must_use]
    pub fn id(&self) -> RowId {
        self.blocks.first().map_or(0, Slot::id)
    }

    /// Ids of every block, first block first.
    #[must_use]
    pub fn block_ids(&self) -> Vec<RowId> {
        self.blocks.iter().map(Slot::id).collect()
    }

    /// The reassembled blob.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.blocks.iter().flat_map(|block| block.data().iter().copied()).collect()
    }

    /// Re-chunk the record for `data`, reusing existing blocks in place,
    /// allocating more when the value grew and releasing trailing blocks
    /// when it shrank.
    pub fn write(&mut self, core: &mut GatherCore, data: &[u8]) -> Result<(), GatherError> {
        let layout = core.layout();
        let pieces: Vec<&[u8]> = chunks(layout, data).collect();
        let needed = pieces.len().max(1);

        while self.blocks.len() > needed {
            if let Some(block) = self.blocks.pop() {
                core.release(block.id())?;
            }
        }
        while self.blocks.len() < needed {
            let id = core.next_free_id()?;
            self.blocks.push(SizeBlock::create(layout, id, &[])?);
        }

        let ids: Vec<RowId> = self.block_ids();
        for (index, block) in self.blocks.iter_mut().enumerate() {
            block.set_data(pieces.get(index).copied().unwrap_or_default())?;
            block.set_next(ids.get(index + 1).copied().unwrap_or(0));
        }
        Ok(())
    }

    /// Return every block to the free list.
    pub fn release(self, core: &mut GatherCore) -> Result<(), GatherError> {
        for block in self.blocks {
            core.release(block.id())?;
        }
        Ok(())
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.blocks.iter().any(Slot::is_dirty)
    }

    pub fn flush(&mut self, storage: &mut dyn Storage) -> Result<(), StorageError> {
        for block in &mut self.blocks {
            block.flush(storage)?;
        }
        Ok(())
    }
}

fn chunks(layout: Layout, data: &[u8]) -> impl Iterator<Item = &[u8]> {
    data.chunks(SizeBlock::payload_capacity(layout).max(1))
}

/// A tree node and its decoded value.
#[derive(Debug)]
pub struct AvlRecord<T> {
    block: AvlBlock,
    value: T,
}

impl<T: StoredValue> AvlRecord<T> {
    pub fn load(storage: &mut dyn Storage, layout: Layout, id: RowId) -> Result<Self, GatherError> {
        let block = AvlBlock::load(storage, layout, id)?;
        let value = T::decode(block.data())?;
        Ok(Self { block, value })
    }

    /// A detached node holding `value`.
    pub fn create(layout: Layout, id: RowId, value: T) -> Result<Self, BlockError> {
        let block = AvlBlock::create(layout, id, &value.encode())?;
        Ok(Self { block, value })
    }

    #[must_use]
    pub fn id(&self) -> RowId {
        self.block.id()
    }

    #[must_use]
    pub const fn value(&self) -> &T {
        &self.value
    }

    pub fn set_value(&mut self, value: T) -> Result<(), BlockError> {
        self.block.set_data(&value.encode())?;
        self.value = value;
        Ok(())
    }

    #[must_use]
    pub const fn node(&self) -> &AvlBlock {
        &self.block
    }

    pub const fn node_mut(&mut self) -> &mut AvlBlock {
        &mut self.block
    }

    pub fn flush(&mut self, storage: &mut dyn Storage) -> Result<(), StorageError> {
        self.block.flush(storage)
    }
}
