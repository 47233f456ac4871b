//! Row access traits.
//!
//! The engine never inspects row types directly: it reads column values
//! through [`RowSource`] on insert and writes them through [`RowSink`] when
//! materializing query results.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::collection::schema::{ColumnDef, Value};

/// Read access to a row's column values.
pub trait RowSource {
    /// Value of `column`, `None` when the row has no value for it.
    fn value(&self, column: &str) -> Option<Value>;
}

/// Write access to a row's column values.
pub trait RowSink {
    fn assign(&mut self, column: &str, value: Value);
}

/// A user struct stored in a collection.
///
/// `schema()` lists the struct's columns in declaration order; the first
/// orderable one is the key unless another is marked with [`ColumnDef::as_key`].
pub trait Entity: RowSource + RowSink + Default {
    fn schema() -> Vec<ColumnDef>;
}

/// A row with an open set of columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DynamicRow(BTreeMap<String, Value>);

impl DynamicRow {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(column.into(), value.into());
        self
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(column.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl RowSource for DynamicRow {
    fn value(&self, column: &str) -> Option<Value> {
        self.0.get(column).cloned()
    }
}

impl RowSink for DynamicRow {
    fn assign(&mut self, column: &str, value: Value) {
        self.0.insert(column.to_string(), value);
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for DynamicRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
