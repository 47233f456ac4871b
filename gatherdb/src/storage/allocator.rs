//! Free-block allocator shared by every gather kind.
//!
//! Slot ids are handed out from two sources: the free list (reclaimed slots)
//! and the high-water mark `latest`. The allocator also lets a caller claim a
//! specific id, which is how every column of a collection ends up storing a
//! row under the same id even though each column is a separate file.
//!
//! # Invariants
//!
//! - `latest` never decreases
//! - every id in `1..=latest` is either live or on the free list, never both

use crate::storage::RowId;
use crate::storage::block::Layout;
use crate::storage::gather::GatherError;
use crate::storage::io::{Storage, StorageError};
use crate::storage::record::ChainRecord;
use crate::storage::stream_unit::Field;

/// Offset of the latest-allocated-id header field.
const LATEST_OFFSET: u64 = 0;

/// Tracks the allocated id range and the reclaimed slots of one gather file.
#[derive(Debug)]
pub struct BlockAllocator {
    latest: Field<u64>,
    free: ChainRecord,
}

impl BlockAllocator {
    /// Allocator for a brand new file.
    #[must_use]
    pub fn create(layout: Layout) -> Self {
        Self {
            latest: Field::create(LATEST_OFFSET, 0),
            free: ChainRecord::create(layout),
        }
    }

    /// Read the high-water mark and free list from an existing file.
    pub fn open(storage: &mut dyn Storage, layout: Layout) -> Result<Self, GatherError> {
        let latest = Field::<u64>::load(storage, LATEST_OFFSET)?;
        let free = ChainRecord::open(storage, layout, latest.get())?;
        Ok(Self { latest, free })
    }

    /// Highest id ever handed out.
    #[must_use]
    pub const fn latest(&self) -> RowId {
        self.latest.get()
    }

    /// Number of reclaimed slots waiting for reuse.
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    #[must_use]
    pub fn is_free(&self, id: RowId) -> bool {
        self.free.contains(id)
    }

    /// Whether `id` is currently allocated.
    #[must_use]
    pub fn is_allocated(&self, id: RowId) -> bool {
        id != 0 && id <= self.latest() && !self.free.contains(id)
    }

    /// Take the most recently freed slot, or extend the id range by one.
    pub fn next_free_id(&mut self, storage: &mut dyn Storage) -> Result<RowId, StorageError> {
        if let Some(id) = self.free.pop_tail(storage)? {
            return Ok(id);
        }
        let id = self.latest() + 1;
        self.latest.set(id);
        Ok(id)
    }

    /// Claim a caller-chosen id.
    ///
    /// # Pre-conditions
    ///
    /// - `id != 0`
    ///
    /// # Post-conditions
    ///
    /// - `id` is allocated
    /// - if `id` was beyond `latest`, every id skipped over is on the free list
    ///
    /// # Errors
    ///
    /// Returns `GatherError::IdInUse` if `id` is already allocated.
    pub fn try_use(&mut self, storage: &mut dyn Storage, id: RowId) -> Result<(), GatherError> {
        if id == 0 {
            return Err(GatherError::IdInUse(id));
        }

        let latest = self.latest();
        if id <= latest {
            if self.free.remove(storage, id)? {
                return Ok(());
            }
            return Err(GatherError::IdInUse(id));
        }

        for skipped in latest + 1..id {
            self.free.push(storage, skipped)?;
        }
        self.latest.set(id);
        Ok(())
    }

    /// Put `id` back on the free list. Releasing an unallocated id is a no-op.
    pub fn release(&mut self, storage: &mut dyn Storage, id: RowId) -> Result<(), StorageError> {
        if self.is_allocated(id) {
            self.free.push(storage, id)?;
        }
        Ok(())
    }

    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.latest.is_dirty()
    }

    pub fn flush(&mut self, storage: &mut dyn Storage) -> Result<(), StorageError> {
        self.latest.flush(storage)?;
        self.free.flush(storage)
    }
}
