#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

// Life of an insert:
// 1. A row comes in through `RowSource`
// 2. Values are checked against the declared column types
// 3. The key column stores its value and hands out the row id
// 4. Every other column stores its value under that id, in parallel
//    - On any failure, the row is removed from the columns that took it
//
// Life of a query:
// 1. The condition string is parsed into clauses joined by && and ||
// 2. Each clause runs as a range search over one column's tree
// 3. Clause results are intersected and merged into a list of row ids
// 4. Selected columns are read back for those ids
//
// System components:
//  - Block files with a free-block list (storage)
//  - Tree, text and list columns built on them (storage::gather)
//  - Collections tying columns together (collection)
//  - Condition parser and evaluator (query)

pub mod collection;
pub mod config;
pub mod query;
pub mod storage;

#[cfg(test)]
mod e2e_tests;
#[cfg(test)]
mod testing;

pub use collection::{
    Collection, CollectionError, ColumnDef, ColumnType, DynamicRow, Entity, RowSink, RowSource,
    Value,
};
pub use config::{ConfigError, StoreConfig};
pub use query::{ParseError, QueryBuilder, QueryResult};
