//! Column storage engine.
//!
//! Each column of a collection lives in its own gather file made of
//! fixed-capacity slots.
//!
//! # File Format
//!
//! ```text
//! +----------------------+-------------------+--------+--------+-----+
//! | latest id (8) | capacity (4) | kind fields | slot 0 | slot 1 | ... |
//! +----------------------+-------------------+--------+--------+-----+
//! ```
//!
//! - Slot 0 heads the free list; it never holds a row.
//! - Slot `i` holds row `i` (or a continuation block of some row's blob).
//! - Tree columns add an 8-byte root id after the capacity.
//!
//! # Usage
//!
//! ```ignore
//! use storage::{AvlGather, Gather};
//!
//! let mut ages = AvlGather::<i32>::open(path, AvlGather::<i32>::capacity_for(0))?;
//! let id = ages.add(&30, None)?;
//! assert_eq!(ages.gte(&18)?, vec![(id, 30)]);
//! ages.dispose()?;
//! ```

mod allocator;
mod block;
mod gather;
mod io;
mod record;
mod stream_unit;
mod value;

pub use allocator::BlockAllocator;
pub use block::{
    AVL_BLOCK_HEADER_SIZE, AvlBlock, BLOCK_HEADER_SIZE, Block, BlockError, Layout,
    SIZE_BLOCK_HEADER_SIZE, SizeBlock, Slot,
};
pub use gather::{
    AvlGather, Comparison, DataGather, Gather, GatherCore, GatherError, PolylithGather, TextGather,
    gather_path,
};
pub use io::{FileStorage, MemoryStorage, Storage, StorageError};
pub use record::{AvlRecord, ChainRecord, PolylithRecord, SingleRecord};
pub use stream_unit::{Field, StreamUnit};
pub use value::{FixedWidth, StoredValue};

/// Identifier of a row, shared by every column of a collection.
///
/// `0` is reserved: it means "no row" in every link field.
pub type RowId = u64;
