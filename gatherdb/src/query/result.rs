//! Query results.

use std::collections::{HashMap, HashSet};

use crate::collection::{Collection, CollectionError, DynamicRow, Entity, Value};
use crate::storage::RowId;

/// Values already read while evaluating a condition, per column.
pub(crate) type ValueCache = HashMap<String, HashMap<RowId, Value>>;

/// The row ids matched by a condition.
///
/// Values read while evaluating the condition are kept, so selecting a
/// column that a clause already scanned does not read it again.
#[derive(Debug)]
pub struct QueryResult<'c> {
    collection: &'c Collection,
    ids: Vec<RowId>,
    cache: ValueCache,
}

impl<'c> QueryResult<'c> {
    pub(crate) fn empty(collection: &'c Collection) -> Self {
        Self {
            collection,
            ids: Vec::new(),
            cache: HashMap::new(),
        }
    }

    /// Result holding `rows` of `column`, in the given order.
    pub(crate) fn from_rows(collection: &'c Collection, column: &str, rows: Vec<(RowId, Value)>) -> Self {
        let ids = rows.iter().map(|(id, _)| *id).collect();
        let mut cache = HashMap::new();
        cache.insert(column.to_string(), rows.into_iter().collect());
        Self {
            collection,
            ids,
            cache,
        }
    }

    /// Keep only ids also present in `other`.
    pub fn and(&mut self, other: Self) {
        if other.ids.is_empty() {
            self.ids.clear();
        } else {
            let keep: HashSet<RowId> = other.ids.iter().copied().collect();
            self.ids.retain(|id| keep.contains(id));
        }
        self.merge_cache(other.cache);
    }

    /// Add the ids of `other` not already present.
    pub fn or(&mut self, other: Self) {
        let mut seen: HashSet<RowId> = self.ids.iter().copied().collect();
        self.ids
            .extend(other.ids.into_iter().filter(|id| seen.insert(*id)));
        self.merge_cache(other.cache);
    }

    /// Values cached on `self` win.
    fn merge_cache(&mut self, other: ValueCache) {
        for (column, values) in other {
            let entry = self.cache.entry(column).or_default();
            for (id, value) in values {
                entry.entry(id).or_insert(value);
            }
        }
    }

    #[must_use]
    pub fn ids(&self) -> &[RowId] {
        &self.ids
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Drop the first `n` ids.
    #[must_use]
    pub fn skip(mut self, n: usize) -> Self {
        self.ids = self.ids.split_off(n.min(self.ids.len()));
        self
    }

    /// Keep at most `n` ids.
    #[must_use]
    pub fn take(mut self, n: usize) -> Self {
        self.ids.truncate(n);
        self
    }

    /// Materialize the matched rows with the given columns, or every
    /// declared column when `columns` is empty.
    pub fn select(&self, columns: &[&str]) -> Result<Vec<DynamicRow>, CollectionError> {
        self.collection.compose(&self.ids, &self.cache, columns)
    }

    /// Materialize the matched rows as `E`.
    pub fn select_as<E: Entity>(&self) -> Result<Vec<E>, CollectionError> {
        let schema = E::schema();
        let columns: Vec<&str> = schema.iter().map(|def| def.name.as_str()).collect();
        let rows = self.select(&columns)?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let mut entity = E::default();
                for (column, value) in row.iter() {
                    entity.assign(column, value.clone());
                }
                entity
            })
            .collect())
    }

    /// Delete the matched rows from every column.
    pub fn delete(&self) -> Result<bool, CollectionError> {
        self.collection.delete(&self.ids)
    }

    /// Set `column` to `value` on every matched row; returns the number of
    /// rows updated.
    pub fn update(&self, column: &str, value: impl Into<Value>) -> Result<usize, CollectionError> {
        self.collection.update(column, &self.ids, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestCollection;

    fn result<'c>(collection: &'c Collection, column: &str, ids: &[RowId]) -> QueryResult<'c> {
        let rows = ids.iter().map(|id| (*id, Value::U64(*id * 10))).collect();
        QueryResult::from_rows(collection, column, rows)
    }

    #[test]
    fn test_and_intersects_keeping_left_order() {
        let fixture = TestCollection::new();
        let mut left = result(&fixture.collection, "A", &[3, 1, 2]);
        left.and(result(&fixture.collection, "B", &[2, 3, 4]));
        assert_eq!(left.ids(), &[3, 2]);
        assert_eq!(left.cache["B"].len(), 3);
    }

    #[test]
    fn test_and_with_empty_clears() {
        let fixture = TestCollection::new();
        let mut left = result(&fixture.collection, "A", &[1, 2]);
        left.and(QueryResult::empty(&fixture.collection));
        assert!(left.is_empty());
    }

    #[test]
    fn test_or_unions_without_duplicates() {
        let fixture = TestCollection::new();
        let mut left = result(&fixture.collection, "A", &[1, 2]);
        left.or(result(&fixture.collection, "A", &[2, 3]));
        assert_eq!(left.ids(), &[1, 2, 3]);
        assert_eq!(left.count(), 3);
    }

    #[test]
    fn test_cache_merge_keeps_existing_values() {
        let fixture = TestCollection::new();
        let mut left = QueryResult::from_rows(&fixture.collection, "A", vec![(1, Value::I32(1))]);
        left.or(QueryResult::from_rows(
            &fixture.collection,
            "A",
            vec![(1, Value::I32(99)), (2, Value::I32(2))],
        ));
        assert_eq!(left.cache["A"][&1], Value::I32(1));
        assert_eq!(left.cache["A"][&2], Value::I32(2));
    }

    #[test]
    fn test_skip_and_take() {
        let fixture = TestCollection::new();
        let paged = result(&fixture.collection, "A", &[1, 2, 3, 4, 5]).skip(1).take(2);
        assert_eq!(paged.ids(), &[2, 3]);
        assert!(result(&fixture.collection, "A", &[1]).skip(5).is_empty());
    }
}
