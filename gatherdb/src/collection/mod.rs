//! Collections: named sets of columns sharing one row-id space.
//!
//! A collection lives in `{data_directory}/{database}/{collection}/` and
//! keeps one gather per column plus a `collection.json` side file listing
//! the declared columns. The key column decides row ids: an insert writes
//! the key first, then every other column under the same id.
//!
//! # Concurrency
//!
//! One reader/writer lock per collection: inserts, deletes, updates and
//! column declarations take it for writing; queries and selects take it
//! for reading. Acquisition waits at most `StoreConfig::lock_timeout` and
//! fails with [`CollectionError::LockTimeout`]. Within a write, the
//! per-column work runs in parallel and is joined before the lock is
//! released.

mod column;
mod row;
mod schema;

pub use column::{ColumnStore, ColumnValue, open_store};
pub use row::{DynamicRow, Entity, RowSink, RowSource};
pub use schema::{
    CollectionMetadata, ColumnDef, ColumnType, INLINE_TEXT_LIMIT, METADATA_FILE, StorageKind, Value,
};

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::query::{self, ParseError, QueryBuilder, ValueCache};
use crate::storage::{GatherError, RowId};

// =============================================================================
// Errors
// =============================================================================

/// Errors that can occur during collection operations.
#[derive(Debug)]
pub enum CollectionError {
    /// The collection was disposed or dropped.
    Disposed(String),
    /// The collection lock could not be acquired in time.
    LockTimeout { collection: String, timeout: Duration },
    /// No orderable column has been declared, so there is no key.
    NoKeyColumn,
    /// The row has no value for the key column.
    MissingKeyValue(String),
    UnknownColumn(String),
    /// A comparison targeted a text column.
    NotOrderable(String),
    /// A text column without an inline size cannot be the key.
    KeyNotOrderable(String),
    TypeMismatch {
        column: String,
        expected: ColumnType,
        found: ColumnType,
    },
    InvalidLiteral { column_type: ColumnType, literal: String },
    /// A column declaration could not be understood.
    InvalidSchema(String),
    Io(std::io::Error),
    Json(serde_json::Error),
    Gather(GatherError),
    Parse(ParseError),
}

impl std::fmt::Display for CollectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disposed(name) => write!(f, "collection {name} has been disposed"),
            Self::LockTimeout {
                collection,
                timeout,
            } => write!(
                f,
                "could not lock collection {collection} within {}ms",
                timeout.as_millis()
            ),
            Self::NoKeyColumn => write!(f, "no orderable column has been declared as key"),
            Self::MissingKeyValue(key) => write!(f, "row has no value for key column {key}"),
            Self::UnknownColumn(name) => write!(f, "unknown column: {name}"),
            Self::NotOrderable(name) => {
                write!(f, "{name} is unsized text and cannot be queried by comparison")
            }
            Self::KeyNotOrderable(name) => {
                write!(f, "{name} is unsized text and cannot be used as key")
            }
            Self::TypeMismatch {
                column,
                expected,
                found,
            } => write!(f, "column {column} holds {expected}, got {found}"),
            Self::InvalidLiteral {
                column_type,
                literal,
            } => write!(f, "'{literal}' is not a valid {column_type}"),
            Self::InvalidSchema(message) => write!(f, "invalid column declaration: {message}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Json(e) => write!(f, "metadata error: {e}"),
            Self::Gather(e) => write!(f, "{e}"),
            Self::Parse(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for CollectionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::Gather(e) => Some(e),
            Self::Parse(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CollectionError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for CollectionError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

impl From<GatherError> for CollectionError {
    fn from(e: GatherError) -> Self {
        Self::Gather(e)
    }
}

impl From<ParseError> for CollectionError {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}

impl CollectionError {
    /// Fill in the column name on errors raised below the column level.
    pub(crate) fn for_column(self, name: &str) -> Self {
        match self {
            Self::TypeMismatch {
                column,
                expected,
                found,
            } if column.is_empty() => Self::TypeMismatch {
                column: name.to_string(),
                expected,
                found,
            },
            Self::NotOrderable(column) if column.is_empty() => Self::NotOrderable(name.to_string()),
            other => other,
        }
    }
}

// =============================================================================
// Columns
// =============================================================================

#[derive(Debug)]
pub(crate) struct Column {
    pub(crate) def: ColumnDef,
    pub(crate) store: Mutex<Box<dyn ColumnStore>>,
}

/// Declared columns in declaration order.
#[derive(Debug, Default)]
pub(crate) struct State {
    key: Option<String>,
    columns: Vec<Column>,
}

impl State {
    fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.def.name == name)
    }

    fn key_index(&self) -> Option<usize> {
        self.key.as_deref().and_then(|key| self.position(key))
    }

    pub(crate) fn column(&self, name: &str) -> Option<&Column> {
        self.position(name).map(|i| &self.columns[i])
    }

    pub(crate) fn key_column(&self) -> Option<&Column> {
        self.key_index().map(|i| &self.columns[i])
    }

    /// Add `def`, opening its gather. Returns `false` if a column with that
    /// name already exists.
    ///
    /// The first orderable column becomes the key; a later one takes over
    /// when declared with `key` set.
    fn declare(&mut self, directory: &Path, mut def: ColumnDef, text_block_size: u32) -> Result<bool, CollectionError> {
        if self.position(&def.name).is_some() {
            return Ok(false);
        }
        if def.key && !def.is_orderable() {
            return Err(CollectionError::KeyNotOrderable(def.name));
        }
        let becomes_key = def.key || (self.key.is_none() && def.is_orderable());

        let store = open_store(directory, &def, text_block_size)?;
        if becomes_key {
            self.key = Some(def.name.clone());
        }
        def.key = false;
        self.columns.push(Column {
            def,
            store: Mutex::new(store),
        });
        Ok(true)
    }

    fn definitions(&self) -> Vec<ColumnDef> {
        self.columns
            .iter()
            .map(|c| {
                let mut def = c.def.clone();
                def.key = self.key.as_deref() == Some(def.name.as_str());
                def
            })
            .collect()
    }

    fn metadata(&self) -> CollectionMetadata {
        CollectionMetadata {
            key: self.key.clone(),
            columns: self.definitions(),
        }
    }
}

/// What happened to one column during an insert fan-out.
enum Outcome {
    Skipped,
    Written,
    Failed(CollectionError),
}

// =============================================================================
// Collection
// =============================================================================

/// A named set of columns stored under one directory.
#[derive(Debug)]
pub struct Collection {
    database: String,
    name: String,
    directory: PathBuf,
    config: StoreConfig,
    state: RwLock<State>,
    disposed: AtomicBool,
}

impl Collection {
    /// Open the collection `database/name`, creating its directory if
    /// needed and reopening every column recorded in its metadata file.
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be created, the metadata file cannot
    /// be read, or a column file was created with a different capacity.
    pub fn open(database: &str, name: &str, config: &StoreConfig) -> Result<Self, CollectionError> {
        let directory = config.collection_directory(database, name);
        std::fs::create_dir_all(&directory)?;

        let mut state = State::default();
        let metadata_path = directory.join(METADATA_FILE);
        if metadata_path.exists() {
            let metadata: CollectionMetadata = serde_json::from_str(&std::fs::read_to_string(&metadata_path)?)?;
            for mut def in metadata.columns {
                def.key = metadata.key.as_deref() == Some(def.name.as_str());
                state.declare(&directory, def, config.text_block_size)?;
            }
        }

        debug!(
            database,
            collection = name,
            columns = state.columns.len(),
            "opened collection"
        );

        Ok(Self {
            database: database.to_string(),
            name: name.to_string(),
            directory,
            config: config.clone(),
            state: RwLock::new(state),
            disposed: AtomicBool::new(false),
        })
    }

    /// Open a collection storing `E`, declaring every column of its schema.
    pub fn open_typed<E: Entity>(database: &str, name: &str, config: &StoreConfig) -> Result<Self, CollectionError> {
        let collection = Self::open(database, name, config)?;
        for def in E::schema() {
            collection.declare_column(def)?;
        }
        Ok(collection)
    }

    /// Whether `database/name` has been created with at least one column.
    #[must_use]
    pub fn exists(database: &str, name: &str, config: &StoreConfig) -> bool {
        config
            .collection_directory(database, name)
            .join(METADATA_FILE)
            .exists()
    }

    #[must_use]
    pub fn database(&self) -> &str {
        &self.database
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Name of the key column.
    pub fn key(&self) -> Result<Option<String>, CollectionError> {
        Ok(self.read_state()?.key.clone())
    }

    /// Declared columns in declaration order.
    pub fn columns(&self) -> Result<Vec<ColumnDef>, CollectionError> {
        Ok(self.read_state()?.definitions())
    }

    /// Declare a column. Declaring an existing name again does nothing.
    ///
    /// # Errors
    ///
    /// Fails if the column would become the key but is unsized text, or its
    /// gather files cannot be opened.
    pub fn declare_column(&self, def: ColumnDef) -> Result<(), CollectionError> {
        self.ensure_open()?;
        let mut state = self.write_state()?;
        let name = def.name.clone();
        if state.declare(&self.directory, def, self.config.text_block_size)? {
            self.write_metadata(&state)?;
            debug!(collection = %self.name, column = %name, "declared column");
        }
        Ok(())
    }

    /// Declare columns from a JSON object mapping column names to
    /// `{"type": ..., "size": ..., "key": ...}`. The object may also be
    /// nested under the collection's name. Returns the number of new columns.
    ///
    /// Object members are visited in name order, so mark the key column
    /// explicitly.
    pub fn declare_from_json(&self, json: &str) -> Result<usize, CollectionError> {
        let mut root: serde_json::Value = serde_json::from_str(json)?;
        if let Some(nested) = root.get_mut(&self.name) {
            root = nested.take();
        }
        let serde_json::Value::Object(members) = root else {
            return Err(CollectionError::InvalidSchema("expected a JSON object".to_string()));
        };

        let mut declared = 0;
        for (name, spec) in members {
            let column_type = spec
                .get("type")
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| CollectionError::InvalidSchema(format!("{name} has no type")))?
                .parse::<ColumnType>()
                .map_err(CollectionError::InvalidSchema)?;
            let size = spec
                .get("size")
                .and_then(serde_json::Value::as_u64)
                .and_then(|size| usize::try_from(size).ok())
                .unwrap_or(0);
            let key = spec
                .get("key")
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(false);

            let mut def = ColumnDef::new(name, column_type).with_size(size);
            def.key = key;
            let existed = self.read_state()?.column(&def.name).is_some();
            self.declare_column(def)?;
            if !existed {
                declared += 1;
            }
        }
        Ok(declared)
    }

    /// Insert one row.
    ///
    /// The key value is written first and decides the row id; every other
    /// column the row has a value for is then written under that id in
    /// parallel. If any column write fails, the row is removed from every
    /// column that took it and `Ok(false)` is returned.
    ///
    /// # Errors
    ///
    /// Fails without writing anything if the row has no key value or a value
    /// of the wrong type, and fails if the key column rejects the value.
    pub fn insert<R: RowSource + ?Sized>(&self, row: &R) -> Result<bool, CollectionError> {
        self.ensure_open()?;
        let mut state = self.write_state()?;
        let key_index = state.key_index().ok_or(CollectionError::NoKeyColumn)?;

        let values = state
            .columns
            .iter()
            .map(|column| coerce(column, row.value(&column.def.name)))
            .collect::<Result<Vec<_>, _>>()?;
        let Some(key_value) = &values[key_index] else {
            return Err(CollectionError::MissingKeyValue(
                state.columns[key_index].def.name.clone(),
            ));
        };

        let key_column = &mut state.columns[key_index];
        let id = key_column
            .store
            .get_mut()
            .insert(key_value, None)
            .map_err(|e| e.for_column(&key_column.def.name))?;

        let outcomes: Vec<Outcome> = state
            .columns
            .par_iter_mut()
            .zip(values.par_iter())
            .enumerate()
            .map(|(index, (column, value))| match value {
                _ if index == key_index => Outcome::Written,
                None => Outcome::Skipped,
                Some(value) => match column.store.get_mut().insert(value, Some(id)) {
                    Ok(_) => Outcome::Written,
                    Err(e) => Outcome::Failed(e.for_column(&column.def.name)),
                },
            })
            .collect();

        if let Some(error) = outcomes.iter().find_map(|o| match o {
            Outcome::Failed(e) => Some(e),
            _ => None,
        }) {
            warn!(
                collection = %self.name,
                id,
                error = %error,
                "column write failed, rolling back row"
            );
            state
                .columns
                .par_iter_mut()
                .zip(outcomes.par_iter())
                .filter(|(_, outcome)| matches!(outcome, Outcome::Written))
                .for_each(|(column, _)| {
                    if let Err(e) = column.store.get_mut().delete(id) {
                        warn!(column = %column.def.name, id, error = %e, "rollback delete failed");
                    }
                });
            return Ok(false);
        }

        if self.config.auto_flush {
            state
                .columns
                .par_iter_mut()
                .zip(outcomes.par_iter())
                .filter(|(_, outcome)| matches!(outcome, Outcome::Written))
                .try_for_each(|(column, _)| column.store.get_mut().flush())?;
        }
        Ok(true)
    }

    /// Delete rows from every column. Returns `true` when every id was a
    /// live row.
    pub fn delete(&self, ids: &[RowId]) -> Result<bool, CollectionError> {
        self.ensure_open()?;
        let mut state = self.write_state()?;
        let key_index = state.key_index();
        let auto_flush = self.config.auto_flush;

        let removed = state
            .columns
            .par_iter_mut()
            .map(|column| -> Result<usize, GatherError> {
                let store = column.store.get_mut();
                let mut removed = 0;
                for id in ids {
                    if store.delete(*id)? {
                        removed += 1;
                    }
                }
                if auto_flush && removed > 0 {
                    store.flush()?;
                }
                Ok(removed)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let all_live = key_index.is_some_and(|k| removed[k] == ids.len());
        debug!(collection = %self.name, requested = ids.len(), all_live, "deleted rows");
        Ok(all_live)
    }

    /// Set `column` to `value` on every live row in `ids`; returns the number
    /// of rows updated. Rows that had no value in that column get one.
    pub fn update(&self, column: &str, ids: &[RowId], value: impl Into<Value>) -> Result<usize, CollectionError> {
        self.ensure_open()?;
        let value = value.into();
        let mut state = self.write_state()?;
        let index = state
            .position(column)
            .ok_or_else(|| CollectionError::UnknownColumn(column.to_string()))?;
        let value = coerce(&state.columns[index], Some(value))?
            .ok_or_else(|| CollectionError::UnknownColumn(column.to_string()))?;

        let live: Vec<RowId> = match state.key_index() {
            Some(k) => {
                let key = state.columns[k].store.get_mut();
                ids.iter().copied().filter(|id| key.contains(*id)).collect()
            }
            None => Vec::new(),
        };

        let target = &mut state.columns[index];
        let store = target.store.get_mut();
        for id in &live {
            store
                .update(*id, &value)
                .map_err(|e| e.for_column(&target.def.name))?;
        }
        if self.config.auto_flush && !live.is_empty() {
            store.flush()?;
        }
        Ok(live.len())
    }

    /// Parse `condition` into a query over this collection. An empty
    /// condition matches every row.
    pub fn query(&self, condition: &str) -> Result<QueryBuilder<'_>, CollectionError> {
        self.ensure_open()?;
        Ok(QueryBuilder::new(self, query::parse(condition)?))
    }

    /// Write every dirty block of every column.
    pub fn flush(&self) -> Result<(), CollectionError> {
        self.ensure_open()?;
        let mut state = self.write_state()?;
        state
            .columns
            .par_iter_mut()
            .try_for_each(|column| column.store.get_mut().flush())?;
        Ok(())
    }

    /// Flush and close every column and record the schema. Later calls do
    /// nothing.
    pub fn dispose(&self) -> Result<(), CollectionError> {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let mut state = self.state.write();
        state
            .columns
            .par_iter_mut()
            .try_for_each(|column| column.store.get_mut().dispose())?;
        self.write_metadata(&state)?;
        debug!(database = %self.database, collection = %self.name, "closed collection");
        Ok(())
    }

    /// Delete every column file and the metadata file.
    pub fn drop_collection(mut self) -> Result<(), CollectionError> {
        self.disposed.store(true, Ordering::SeqCst);
        let columns = std::mem::take(&mut self.state.get_mut().columns);
        columns
            .into_par_iter()
            .try_for_each(|column| column.store.into_inner().destroy())?;

        let metadata_path = self.directory.join(METADATA_FILE);
        if metadata_path.exists() {
            std::fs::remove_file(&metadata_path)?;
        }
        if let Err(e) = std::fs::remove_dir(&self.directory) {
            debug!(directory = %self.directory.display(), error = %e, "left collection directory in place");
        }
        info!(database = %self.database, collection = %self.name, "dropped collection");
        Ok(())
    }

    // ========== Internals ==========

    fn ensure_open(&self) -> Result<(), CollectionError> {
        if self.is_disposed() {
            return Err(CollectionError::Disposed(self.name.clone()));
        }
        Ok(())
    }

    fn lock_timeout(&self) -> CollectionError {
        warn!(
            collection = %self.name,
            timeout_ms = self.config.lock_timeout.as_millis(),
            "timed out waiting for collection lock"
        );
        CollectionError::LockTimeout {
            collection: self.name.clone(),
            timeout: self.config.lock_timeout,
        }
    }

    pub(crate) fn read_state(&self) -> Result<RwLockReadGuard<'_, State>, CollectionError> {
        self.ensure_open()?;
        self.state
            .try_read_for(self.config.lock_timeout)
            .ok_or_else(|| self.lock_timeout())
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, State>, CollectionError> {
        self.state
            .try_write_for(self.config.lock_timeout)
            .ok_or_else(|| self.lock_timeout())
    }

    fn write_metadata(&self, state: &State) -> Result<(), CollectionError> {
        let json = serde_json::to_string_pretty(&state.metadata())?;
        std::fs::write(self.directory.join(METADATA_FILE), json)?;
        Ok(())
    }

    /// One row per id in `ids` with the given columns, preferring values in
    /// `cache`. Columns a row has no value for are left out of that row.
    pub(crate) fn compose(
        &self,
        ids: &[RowId],
        cache: &ValueCache,
        columns: &[&str],
    ) -> Result<Vec<DynamicRow>, CollectionError> {
        let state = self.read_state()?;
        let targets: Vec<&Column> = if columns.is_empty() {
            state.columns.iter().collect()
        } else {
            columns
                .iter()
                .map(|name| {
                    state
                        .column(name)
                        .ok_or_else(|| CollectionError::UnknownColumn((*name).to_string()))
                })
                .collect::<Result<_, _>>()?
        };

        let fetched = targets
            .par_iter()
            .map(|column| {
                let cached = cache.get(&column.def.name);
                let mut store = column.store.lock();
                ids.iter()
                    .map(|id| match cached.and_then(|values| values.get(id)) {
                        Some(value) => Ok(Some(value.clone())),
                        None => store.get(*id).map_err(|e| e.for_column(&column.def.name)),
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut rows = Vec::with_capacity(ids.len());
        for index in 0..ids.len() {
            let mut row = DynamicRow::new();
            for (column, values) in targets.iter().zip(&fetched) {
                if let Some(value) = &values[index] {
                    row.assign(&column.def.name, value.clone());
                }
            }
            rows.push(row);
        }
        Ok(rows)
    }
}

impl Drop for Collection {
    fn drop(&mut self) {
        if let Err(e) = self.dispose() {
            warn!(collection = %self.name, error = %e, "failed to close collection");
        }
    }
}

/// Convert a row value to the column's type.
fn coerce(column: &Column, value: Option<Value>) -> Result<Option<Value>, CollectionError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let expected = column.def.column_type;
    expected
        .coerce(&value)
        .map(Some)
        .ok_or_else(|| CollectionError::TypeMismatch {
            column: column.def.name.clone(),
            expected,
            found: value.column_type(),
        })
}
