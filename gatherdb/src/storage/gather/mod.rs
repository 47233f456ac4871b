//! Column-level stores.
//!
//! A gather maps row ids to records inside one file. Four kinds exist:
//!
//! - [`DataGather`]: one length-prefixed block per row
//! - [`PolylithGather`]: variable-length blobs chained across blocks
//! - [`TextGather`]: a pointer column plus a blob column holding UTF-8 text
//! - [`AvlGather`]: a persisted AVL tree whose nodes are the row slots, so it
//!   also answers ordered range queries
//!
//! [`GatherCore`] holds what every kind shares: the backing store, the
//! header, and the free-block allocator.

mod avl;
mod data;
mod polylith;
mod text;

pub use avl::{AvlGather, Comparison};
pub use data::DataGather;
pub use polylith::PolylithGather;
pub use text::TextGather;

use std::path::{Path, PathBuf};

use crate::storage::RowId;
use crate::storage::allocator::BlockAllocator;
use crate::storage::block::{BlockError, Layout};
use crate::storage::io::{FileStorage, Storage, StorageError};
use crate::storage::stream_unit::Field;

/// Size of the header every gather file starts with:
/// latest allocated id (8 bytes) and block capacity (4 bytes).
pub const BASE_HEADER_SIZE: u64 = 12;

/// Offset of the block capacity header field.
const CAPACITY_OFFSET: u64 = 8;

/// Errors that can occur during gather operations.
#[derive(Debug)]
pub enum GatherError {
    /// Backing store failure.
    Storage(StorageError),
    /// Payload encoding failure.
    Block(BlockError),
    /// The file was created with a different block capacity.
    CapacityMismatch {
        label: String,
        stored: u32,
        requested: u32,
    },
    /// The requested block capacity leaves no payload after the block header.
    InvalidCapacity(u32),
    /// An explicit id was requested that is already allocated.
    IdInUse(RowId),
    /// The file's links are inconsistent.
    Corrupt(String),
    /// The gather was disposed.
    Disposed(String),
}

impl std::fmt::Display for GatherError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Storage(e) => write!(f, "storage error: {e}"),
            Self::Block(e) => write!(f, "block error: {e}"),
            Self::CapacityMismatch {
                label,
                stored,
                requested,
            } => write!(
                f,
                "{label} was created with block capacity {stored}, cannot open with {requested}"
            ),
            Self::InvalidCapacity(capacity) => {
                write!(f, "block capacity {capacity} is too small")
            }
            Self::IdInUse(id) => write!(f, "block {id} is already in use"),
            Self::Corrupt(msg) => write!(f, "corrupt gather: {msg}"),
            Self::Disposed(label) => write!(f, "{label} has been disposed"),
        }
    }
}

impl std::error::Error for GatherError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Storage(e) => Some(e),
            Self::Block(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StorageError> for GatherError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<BlockError> for GatherError {
    fn from(e: BlockError) -> Self {
        Self::Block(e)
    }
}

/// Common contract of every gather kind.
pub trait Gather {
    /// Value type stored per row.
    type Value;

    /// Store `value` and return its row id.
    ///
    /// With `id = None` a free id is allocated; with `Some(id)` exactly that
    /// id is claimed, failing with `GatherError::IdInUse` if it is taken.
    fn add(&mut self, value: &Self::Value, id: Option<RowId>) -> Result<RowId, GatherError>;

    /// Value stored at `id`, or `None` if `id` holds no row.
    fn get(&mut self, id: RowId) -> Result<Option<Self::Value>, GatherError>;

    /// Replace the value at `id`, storing it under `id` if the row is absent.
    fn update(&mut self, id: RowId, value: &Self::Value) -> Result<(), GatherError>;

    /// Remove the row at `id`. Returns `false` if there was none.
    fn delete(&mut self, id: RowId) -> Result<bool, GatherError>;

    /// Whether `id` currently holds a row.
    fn contains(&self, id: RowId) -> bool;

    /// Write every pending change to the backing store.
    fn flush(&mut self) -> Result<(), GatherError>;

    /// Flush, sync and close. Later calls other than `dispose` fail with
    /// `GatherError::Disposed`; a second `dispose` is a no-op.
    fn dispose(&mut self) -> Result<(), GatherError>;

    /// Delete the backing file(s).
    fn destroy(self) -> Result<(), GatherError>
    where
        Self: Sized;
}

/// Backing store, header and allocator of one gather file.
pub struct GatherCore {
    label: String,
    storage: Box<dyn Storage>,
    layout: Layout,
    capacity: Field<u32>,
    allocator: BlockAllocator,
    created: bool,
    disposed: bool,
}

impl std::fmt::Debug for GatherCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatherCore")
            .field("label", &self.label)
            .field("layout", &self.layout)
            .field("latest", &self.allocator.latest())
            .field("disposed", &self.disposed)
            .finish_non_exhaustive()
    }
}

impl GatherCore {
    /// Open the gather file at `path`, creating it if it does not exist.
    pub fn open_file(
        path: &Path,
        header_size: u64,
        block_header_size: usize,
        capacity: u32,
    ) -> Result<Self, GatherError> {
        let storage = FileStorage::open(path)?;
        Self::open(
            Box::new(storage),
            path.display().to_string(),
            header_size,
            block_header_size,
            capacity,
        )
    }

    /// Open a gather on top of `storage`.
    ///
    /// An empty store is initialized with a fresh header; otherwise the
    /// stored capacity must equal `capacity`. `block_header_size` is the
    /// header of the block kind this gather stores.
    ///
    /// # Errors
    ///
    /// - `GatherError::InvalidCapacity` if `capacity` does not exceed `block_header_size`
    /// - `GatherError::CapacityMismatch` if the file was created with another capacity
    pub fn open(
        mut storage: Box<dyn Storage>,
        label: String,
        header_size: u64,
        block_header_size: usize,
        capacity: u32,
    ) -> Result<Self, GatherError> {
        if (capacity as usize) <= block_header_size {
            return Err(GatherError::InvalidCapacity(capacity));
        }
        let layout = Layout::new(header_size, capacity);

        let created = storage.is_empty()?;
        let (capacity_field, allocator) = if created {
            (
                Field::create(CAPACITY_OFFSET, capacity),
                BlockAllocator::create(layout),
            )
        } else {
            let stored = Field::<u32>::load(storage.as_mut(), CAPACITY_OFFSET)?;
            if stored.get() != capacity {
                return Err(GatherError::CapacityMismatch {
                    label,
                    stored: stored.get(),
                    requested: capacity,
                });
            }
            (stored, BlockAllocator::open(storage.as_mut(), layout)?)
        };

        tracing::debug!(
            gather = %label,
            capacity,
            latest = allocator.latest(),
            created,
            "opened gather"
        );

        Ok(Self {
            label,
            storage,
            layout,
            capacity: capacity_field,
            allocator,
            created,
            disposed: false,
        })
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub const fn layout(&self) -> Layout {
        self.layout
    }

    /// Whether this open initialized a new file.
    #[must_use]
    pub const fn created(&self) -> bool {
        self.created
    }

    #[must_use]
    pub const fn latest(&self) -> RowId {
        self.allocator.latest()
    }

    #[must_use]
    pub fn free_count(&self) -> usize {
        self.allocator.free_count()
    }

    pub fn storage_mut(&mut self) -> &mut dyn Storage {
        self.storage.as_mut()
    }

    pub fn ensure_open(&self) -> Result<(), GatherError> {
        if self.disposed {
            return Err(GatherError::Disposed(self.label.clone()));
        }
        Ok(())
    }

    /// Whether `id` is allocated (not free and within the id range).
    #[must_use]
    pub fn is_allocated(&self, id: RowId) -> bool {
        self.allocator.is_allocated(id)
    }

    /// Allocated ids in ascending order.
    #[must_use]
    pub fn allocated_ids(&self) -> Vec<RowId> {
        (1..=self.latest()).filter(|id| self.is_allocated(*id)).collect()
    }

    pub fn next_free_id(&mut self) -> Result<RowId, GatherError> {
        Ok(self.allocator.next_free_id(self.storage.as_mut())?)
    }

    /// Allocate a free id, or claim the explicit one.
    pub fn claim(&mut self, id: Option<RowId>) -> Result<RowId, GatherError> {
        match id {
            Some(id) => {
                if let Err(e) = self.allocator.try_use(self.storage.as_mut(), id) {
                    tracing::warn!(gather = %self.label, id, "cannot use block, it may be in use");
                    return Err(e);
                }
                Ok(id)
            }
            None => self.next_free_id(),
        }
    }

    pub fn release(&mut self, id: RowId) -> Result<(), GatherError> {
        Ok(self.allocator.release(self.storage.as_mut(), id)?)
    }

    pub fn flush(&mut self) -> Result<(), GatherError> {
        self.capacity.flush(self.storage.as_mut())?;
        self.allocator.flush(self.storage.as_mut())?;
        Ok(())
    }

    /// Flush header state and sync the store. Idempotent.
    pub fn dispose(&mut self) -> Result<(), GatherError> {
        if self.disposed {
            return Ok(());
        }
        self.flush()?;
        self.storage.sync()?;
        self.disposed = true;
        tracing::debug!(gather = %self.label, latest = self.latest(), "disposed gather");
        Ok(())
    }

    /// Delete the backing store.
    pub fn destroy(self) -> Result<(), GatherError> {
        tracing::debug!(gather = %self.label, "destroying gather");
        self.storage.remove()?;
        Ok(())
    }
}

/// Path of a gather file for `name` inside `directory`.
#[must_use]
pub fn gather_path(directory: &Path, name: &str) -> PathBuf {
    directory.join(format!("{name}.gather"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::block::{AVL_BLOCK_HEADER_SIZE, SIZE_BLOCK_HEADER_SIZE};
    use crate::storage::io::MemoryStorage;

    #[test]
    fn test_new_file_writes_header() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = gather_path(dir.path(), "col");

        let mut core = GatherCore::open_file(&path, BASE_HEADER_SIZE, SIZE_BLOCK_HEADER_SIZE, 20).expect("open");
        assert!(core.created());
        assert_eq!(core.claim(None).expect("claim"), 1);
        core.dispose().expect("dispose");

        let bytes = std::fs::read(&path).expect("read file");
        assert_eq!(u64::from_le_bytes(bytes[0..8].try_into().expect("latest")), 1);
        assert_eq!(u32::from_le_bytes(bytes[8..12].try_into().expect("capacity")), 20);
    }

    #[test]
    fn test_capacity_mismatch_on_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = gather_path(dir.path(), "col");

        let mut core = GatherCore::open_file(&path, BASE_HEADER_SIZE, SIZE_BLOCK_HEADER_SIZE, 20).expect("open");
        core.dispose().expect("dispose");

        let result = GatherCore::open_file(&path, BASE_HEADER_SIZE, SIZE_BLOCK_HEADER_SIZE, 24);
        assert!(matches!(
            result,
            Err(GatherError::CapacityMismatch {
                stored: 20,
                requested: 24,
                ..
            })
        ));

        let reopened =
            GatherCore::open_file(&path, BASE_HEADER_SIZE, SIZE_BLOCK_HEADER_SIZE, 20).expect("reopen");
        assert!(!reopened.created());
    }

    #[test]
    fn test_invalid_capacity() {
        let result = GatherCore::open(
            Box::new(MemoryStorage::new()),
            "mem".to_string(),
            12,
            SIZE_BLOCK_HEADER_SIZE,
            4,
        );
        assert!(matches!(result, Err(GatherError::InvalidCapacity(4))));
    }

    #[test]
    fn test_capacity_must_exceed_block_header() {
        let open = |block_header_size: usize, capacity: u32| {
            GatherCore::open(
                Box::new(MemoryStorage::new()),
                "mem".to_string(),
                12,
                block_header_size,
                capacity,
            )
        };
        assert!(matches!(open(SIZE_BLOCK_HEADER_SIZE, 12), Err(GatherError::InvalidCapacity(12))));
        assert!(open(SIZE_BLOCK_HEADER_SIZE, 13).is_ok());
        assert!(matches!(open(AVL_BLOCK_HEADER_SIZE, 20), Err(GatherError::InvalidCapacity(20))));
        assert!(matches!(open(AVL_BLOCK_HEADER_SIZE, 30), Err(GatherError::InvalidCapacity(30))));
        assert!(open(AVL_BLOCK_HEADER_SIZE, 31).is_ok());
    }

    #[test]
    fn test_disposed_core_rejects_use() {
        let mut core = GatherCore::open(
            Box::new(MemoryStorage::new()),
            "mem".to_string(),
            12,
            SIZE_BLOCK_HEADER_SIZE,
            20,
        )
        .expect("open");
        core.dispose().expect("dispose");
        core.dispose().expect("second dispose is a no-op");
        assert!(matches!(core.ensure_open(), Err(GatherError::Disposed(_))));
    }

    #[test]
    fn test_claim_explicit_in_use_fails() {
        let mut core = GatherCore::open(
            Box::new(MemoryStorage::new()),
            "mem".to_string(),
            12,
            SIZE_BLOCK_HEADER_SIZE,
            20,
        )
        .expect("open");
        let id = core.claim(None).expect("claim");
        assert!(matches!(core.claim(Some(id)), Err(GatherError::IdInUse(1))));
        assert_eq!(core.claim(Some(4)).expect("claim 4"), 4);
        assert_eq!(core.allocated_ids(), vec![1, 4]);
    }
}
