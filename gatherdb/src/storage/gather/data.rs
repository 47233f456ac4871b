//! Fixed-width column: one length-prefixed block per row.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::marker::PhantomData;
use std::path::Path;

use crate::storage::RowId;
use crate::storage::block::{BlockError, Layout, SIZE_BLOCK_HEADER_SIZE, SizeBlock};
use crate::storage::gather::{BASE_HEADER_SIZE, Gather, GatherCore, GatherError};
use crate::storage::io::Storage;
use crate::storage::record::SingleRecord;
use crate::storage::value::StoredValue;

/// A column storing one encoded `T` per row.
#[derive(Debug)]
pub struct DataGather<T> {
    core: GatherCore,
    records: HashMap<RowId, SingleRecord>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: StoredValue> DataGather<T> {
    /// Block capacity for values of `T`. Variable-length types need an
    /// explicit `size`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn capacity_for(size: usize) -> u32 {
        let width = match T::FIXED_WIDTH {
            Some(width) => width,
            None => size,
        };
        (width + SIZE_BLOCK_HEADER_SIZE) as u32
    }

    pub fn open(path: &Path, capacity: u32) -> Result<Self, GatherError> {
        Ok(Self::with_core(GatherCore::open_file(path, BASE_HEADER_SIZE, SIZE_BLOCK_HEADER_SIZE, capacity)?))
    }

    pub fn with_storage(storage: Box<dyn Storage>, label: &str, capacity: u32) -> Result<Self, GatherError> {
        Ok(Self::with_core(GatherCore::open(
            storage,
            label.to_string(),
            BASE_HEADER_SIZE,
            SIZE_BLOCK_HEADER_SIZE,
            capacity,
        )?))
    }

    fn with_core(core: GatherCore) -> Self {
        Self {
            core,
            records: HashMap::new(),
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub const fn core(&self) -> &GatherCore {
        &self.core
    }

    /// Ids holding a row, ascending.
    #[must_use]
    pub fn ids(&self) -> Vec<RowId> {
        self.core.allocated_ids()
    }

    fn layout(&self) -> Layout {
        self.core.layout()
    }

    fn record(&mut self, id: RowId) -> Result<&mut SingleRecord, GatherError> {
        let layout = self.layout();
        match self.records.entry(id) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => Ok(entry.insert(SingleRecord::load(
                self.core.storage_mut(),
                layout,
                id,
            )?)),
        }
    }

    fn check_fits(&self, bytes: &[u8]) -> Result<(), GatherError> {
        let capacity = SizeBlock::payload_capacity(self.layout());
        if bytes.len() > capacity {
            return Err(BlockError::ValueTooLarge {
                len: bytes.len(),
                capacity,
            }
            .into());
        }
        Ok(())
    }
}

impl<T: StoredValue> Gather for DataGather<T> {
    type Value = T;

    fn add(&mut self, value: &T, id: Option<RowId>) -> Result<RowId, GatherError> {
        self.core.ensure_open()?;
        let bytes = value.encode();
        self.check_fits(&bytes)?;

        let id = self.core.claim(id)?;
        let record = SingleRecord::create(self.layout(), id, &bytes)?;
        self.records.insert(id, record);
        Ok(id)
    }

    fn get(&mut self, id: RowId) -> Result<Option<T>, GatherError> {
        self.core.ensure_open()?;
        if !self.core.is_allocated(id) {
            return Ok(None);
        }
        let record = self.record(id)?;
        Ok(Some(T::decode(record.data())?))
    }

    fn update(&mut self, id: RowId, value: &T) -> Result<(), GatherError> {
        self.core.ensure_open()?;
        if !self.core.is_allocated(id) {
            self.add(value, Some(id))?;
            return Ok(());
        }
        let bytes = value.encode();
        self.record(id)?.set_data(&bytes)?;
        Ok(())
    }

    fn delete(&mut self, id: RowId) -> Result<bool, GatherError> {
        self.core.ensure_open()?;
        if !self.core.is_allocated(id) {
            return Ok(false);
        }
        self.records.remove(&id);
        self.core.release(id)?;
        Ok(true)
    }

    fn contains(&self, id: RowId) -> bool {
        self.core.is_allocated(id)
    }

    fn flush(&mut self) -> Result<(), GatherError> {
        self.core.ensure_open()?;
        for record in self.records.values_mut() {
            record.flush(self.core.storage_mut())?;
        }
        self.records.clear();
        self.core.flush()
    }

    fn dispose(&mut self) -> Result<(), GatherError> {
        if self.core.ensure_open().is_err() {
            return Ok(());
        }
        self.flush()?;
        self.core.dispose()
    }

    fn destroy(self) -> Result<(), GatherError> {
        self.core.destroy()
    }
}
