//! Variable-length blob column.
//!
//! A blob longer than one block's payload continues in further blocks taken
//! from the same file's allocator, linked through their `next` fields.

use std::collections::HashMap;
use std::path::Path;

use crate::storage::RowId;
use crate::storage::block::SIZE_BLOCK_HEADER_SIZE;
use crate::storage::gather::{BASE_HEADER_SIZE, Gather, GatherCore, GatherError};
use crate::storage::io::Storage;
use crate::storage::record::PolylithRecord;

/// A column of byte blobs of any length.
#[derive(Debug)]
pub struct PolylithGather {
    core: GatherCore,
    records: HashMap<RowId, PolylithRecord>,
}

impl PolylithGather {
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
        }
    }

    #[must_use]
    pub const fn core(&self) -> &GatherCore {
        &self.core
    }

    /// Take the record for `id` out of the cache, loading it if needed.
    fn take_record(&mut self, id: RowId) -> Result<PolylithRecord, GatherError> {
        match self.records.remove(&id) {
            Some(record) => Ok(record),
            None => PolylithRecord::load(&mut self.core, id),
        }
    }
}

impl Gather for PolylithGather {
    type Value = Vec<u8>;

    fn add(&mut self, value: &Vec<u8>, id: Option<RowId>) -> Result<RowId, GatherError> {
        self.core.ensure_open()?;
        let id = self.core.claim(id)?;
        let record = PolylithRecord::create(&mut self.core, id, value)?;
        self.records.insert(id, record);
        Ok(id)
    }

    fn get(&mut self, id: RowId) -> Result<Option<Vec<u8>>, GatherError> {
        self.core.ensure_open()?;
        if !self.core.is_allocated(id) {
            return Ok(None);
        }
        let record = self.take_record(id)?;
        let data = record.data();
        self.records.insert(id, record);
        Ok(Some(data))
    }

    fn update(&mut self, id: RowId, value: &Vec<u8>) -> Result<(), GatherError> {
        self.core.ensure_open()?;
        if !self.core.is_allocated(id) {
            self.add(value, Some(id))?;
            return Ok(());
        }
        let mut record = self.take_record(id)?;
        let result = record.write(&mut self.core, value);
        self.records.insert(id, record);
        result
    }

    fn delete(&mut self, id: RowId) -> Result<bool, GatherError> {
        self.core.ensure_open()?;
        if !self.core.is_allocated(id) {
            return Ok(false);
        }
        let record = self.take_record(id)?;
        record.release(&mut self.core)?;
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
