//! Text column: a pointer column paired with a blob column.
//!
//! `<name>.gather` maps each row id to the id of a blob in
//! `<name>_text.gather`, which holds the UTF-8 bytes. Empty text stores a
//! null pointer and no blob.

use std::path::Path;

use crate::storage::RowId;
use crate::storage::block::BlockError;
use crate::storage::gather::{DataGather, Gather, GatherError, PolylithGather, gather_path};

/// A column of arbitrary-length strings.
#[derive(Debug)]
pub struct TextGather {
    pointers: DataGather<u64>,
    blobs: PolylithGather,
}

impl TextGather {
    /// Open `<name>.gather` and `<name>_text.gather` in `directory`, with
    /// `blob_capacity` bytes per blob block.
    pub fn open(directory: &Path, name: &str, blob_capacity: u32) -> Result<Self, GatherError> {
        let pointers = DataGather::open(
            &gather_path(directory, name),
            DataGather::<u64>::capacity_for(0),
        )?;
        let blobs = PolylithGather::open(&gather_path(directory, &format!("{name}_text")), blob_capacity)?;
        Ok(Self::from_parts(pointers, blobs))
    }

    #[must_use]
    pub const fn from_parts(pointers: DataGather<u64>, blobs: PolylithGather) -> Self {
        Self { pointers, blobs }
    }

    /// Row ids holding text, ascending.
    #[must_use]
    pub fn ids(&self) -> Vec<RowId> {
        self.pointers.ids()
    }

    #[must_use]
    pub const fn pointers(&self) -> &DataGather<u64> {
        &self.pointers
    }

    #[must_use]
    pub const fn blobs(&self) -> &PolylithGather {
        &self.blobs
    }

    fn store_blob(&mut self, text: &str) -> Result<RowId, GatherError> {
        if text.is_empty() {
            return Ok(0);
        }
        self.blobs.add(&text.as_bytes().to_vec(), None)
    }
}

impl Gather for TextGather {
    type Value = String;

    fn add(&mut self, value: &String, id: Option<RowId>) -> Result<RowId, GatherError> {
        let pointer = self.store_blob(value)?;
        match self.pointers.add(&pointer, id) {
            Ok(id) => Ok(id),
            Err(e) => {
                if pointer != 0 {
                    self.blobs.delete(pointer)?;
                }
                Err(e)
            }
        }
    }

    fn get(&mut self, id: RowId) -> Result<Option<String>, GatherError> {
        let Some(pointer) = self.pointers.get(id)? else {
            return Ok(None);
        };
        if pointer == 0 {
            return Ok(Some(String::new()));
        }
        let bytes = self.blobs.get(pointer)?.ok_or_else(|| {
            GatherError::Corrupt(format!("row {id} points to missing blob {pointer}"))
        })?;
        let text = String::from_utf8(bytes).map_err(|e| BlockError::Decode(e.to_string()))?;
        Ok(Some(text))
    }

    fn update(&mut self, id: RowId, value: &String) -> Result<(), GatherError> {
        let Some(pointer) = self.pointers.get(id)? else {
            self.add(value, Some(id))?;
            return Ok(());
        };

        match (pointer, value.is_empty()) {
            (0, true) => Ok(()),
            (0, false) => {
                let pointer = self.store_blob(value)?;
                self.pointers.update(id, &pointer)
            }
            (pointer, true) => {
                self.blobs.delete(pointer)?;
                self.pointers.update(id, &0)
            }
            (pointer, false) => self.blobs.update(pointer, &value.as_bytes().to_vec()),
        }
    }

    fn delete(&mut self, id: RowId) -> Result<bool, GatherError> {
        let Some(pointer) = self.pointers.get(id)? else {
            return Ok(false);
        };
        let blob_deleted = pointer == 0 || self.blobs.delete(pointer)?;
        let pointer_deleted = self.pointers.delete(id)?;
        Ok(blob_deleted && pointer_deleted)
    }

    fn contains(&self, id: RowId) -> bool {
        self.pointers.contains(id)
    }

    fn flush(&mut self) -> Result<(), GatherError> {
        self.blobs.flush()?;
        self.pointers.flush()
    }

    fn dispose(&mut self) -> Result<(), GatherError> {
        self.blobs.dispose()?;
        self.pointers.dispose()
    }

    fn destroy(self) -> Result<(), GatherError> {
        self.blobs.destroy()?;
        self.pointers.destroy()
    }
}
