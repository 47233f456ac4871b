use std::time::Duration;

use tempfile::TempDir;

use crate::collection::{Collection, ColumnDef, ColumnType, DynamicRow};
use crate::config::StoreConfig;

/// A collection in a fresh temporary data directory.
///
/// The collection is declared before the directory so it is closed before
/// the directory is removed.
pub struct TestCollection {
    pub collection: Collection,
    pub config: StoreConfig,
    _dir: TempDir,
}

impl TestCollection {
    /// Empty collection `test/items` with no columns.
    pub fn new() -> Self {
        Self::with_columns(&[])
    }

    /// Collection `test/items` with `columns` declared in order.
    pub fn with_columns(columns: &[ColumnDef]) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config = Self::config_for(&dir);
        let collection = Collection::open("test", "items", &config).expect("Failed to open collection");
        for def in columns {
            collection
                .declare_column(def.clone())
                .expect("Failed to declare column");
        }
        Self {
            collection,
            config,
            _dir: dir,
        }
    }

    /// `Id: i64` key, `Name: text(32)`, `Age: i32`.
    pub fn people() -> Self {
        Self::with_columns(&[
            ColumnDef::new("Id", ColumnType::I64),
            ColumnDef::new("Name", ColumnType::Text).with_size(32),
            ColumnDef::new("Age", ColumnType::I32),
        ])
    }

    fn config_for(dir: &TempDir) -> StoreConfig {
        let mut config = StoreConfig::with_data_directory(dir.path());
        config.lock_timeout = Duration::from_millis(100);
        config.text_block_size = 64;
        config
    }

    /// Open a second handle on the same collection files.
    ///
    /// Only use after closing `self.collection`.
    pub fn reopen(&self) -> Collection {
        Collection::open("test", "items", &self.config).expect("Failed to reopen collection")
    }
}

/// A people row.
pub fn person(id: i64, name: &str, age: i32) -> DynamicRow {
    DynamicRow::new()
        .with("Id", id)
        .with("Name", name)
        .with("Age", age)
}
