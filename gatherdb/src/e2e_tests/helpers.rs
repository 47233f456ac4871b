//! Common helpers for end-to-end tests.

pub use crate::testing::{TestCollection, person};

use crate::collection::{Collection, DynamicRow};

/// `Id` values of `rows`, in row order.
pub fn ids_of(rows: &[DynamicRow]) -> Vec<i64> {
    rows.iter()
        .map(|row| {
            let id = row.get("Id").and_then(|v| v.as_i128()).expect("row has an Id");
            i64::try_from(id).expect("Id fits in i64")
        })
        .collect()
}

/// Sorted `Id` values of the rows matching `condition`.
pub fn matching(collection: &Collection, condition: &str) -> Vec<i64> {
    let rows = collection
        .query(condition)
        .expect("condition parses")
        .build()
        .expect("query runs")
        .select(&["Id"])
        .expect("select runs");
    let mut ids = ids_of(&rows);
    ids.sort_unstable();
    ids
}

/// People 1..=3 aged 10, 20 and 30.
pub fn ages() -> TestCollection {
    let test = TestCollection::people();
    for row in [person(1, "Ann", 10), person(2, "Bob", 20), person(3, "Cid", 30)] {
        assert!(test.collection.insert(&row).expect("insert runs"));
    }
    test
}
