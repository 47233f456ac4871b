//! A row is stored in every column or in none.

use crate::collection::{CollectionError, ColumnDef, ColumnType, DynamicRow, Value};
use crate::e2e_tests::helpers::{TestCollection, matching};

fn coded() -> TestCollection {
    TestCollection::with_columns(&[
        ColumnDef::new("Id", ColumnType::I64),
        ColumnDef::new("Score", ColumnType::F64),
        ColumnDef::new("Code", ColumnType::Text).with_size(4),
    ])
}

fn row(id: i64, score: f64, code: &str) -> DynamicRow {
    DynamicRow::new()
        .with("Id", id)
        .with("Score", score)
        .with("Code", code)
}

#[test]
fn test_failed_column_write_rolls_back_row() {
    let test = coded();
    assert!(test.collection.insert(&row(1, 1.5, "ab")).expect("insert"));

    let stored = test
        .collection
        .insert(&row(2, 2.5, "far too long for a four byte code column"))
        .expect("insert runs");
    assert!(!stored);

    // Row 2 was handed out by the key column and must be gone from every column.
    let state = test.collection.read_state().expect("read lock");
    for name in ["Id", "Score", "Code"] {
        let column = state.column(name).expect("declared");
        assert!(!column.store.lock().contains(2), "{name} still holds row 2");
    }
    assert!(state.column("Id").expect("key").store.lock().contains(1));
    drop(state);

    assert_eq!(matching(&test.collection, ""), vec![1]);
    assert_eq!(matching(&test.collection, "Score > 2"), Vec::<i64>::new());
    assert_eq!(matching(&test.collection, "Id == 2"), Vec::<i64>::new());
}

#[test]
fn test_taken_id_in_other_column_rolls_back_row() {
    let test = coded();
    assert!(test.collection.insert(&row(1, 1.5, "ab")).expect("insert"));

    // Score already holds id 2, which the key column hands out next.
    let state = test.collection.read_state().expect("read lock");
    let score = state.column("Score").expect("declared");
    assert_eq!(score.store.lock().insert(&Value::F64(9.5), Some(2)).expect("place"), 2);
    drop(state);

    let stored = test.collection.insert(&row(2, 2.5, "cd")).expect("insert runs");
    assert!(!stored);

    let state = test.collection.read_state().expect("read lock");
    for name in ["Id", "Code"] {
        let column = state.column(name).expect("declared");
        assert!(!column.store.lock().contains(2), "{name} still holds row 2");
    }
    let score = state.column("Score").expect("declared");
    assert_eq!(score.store.lock().get(2).expect("get"), Some(Value::F64(9.5)));
    drop(state);

    assert_eq!(matching(&test.collection, ""), vec![1]);
    assert_eq!(matching(&test.collection, "Id == 2"), Vec::<i64>::new());
}

#[test]
fn test_row_ids_stay_aligned_after_rollback() {
    let test = coded();
    assert!(!test
        .collection
        .insert(&row(1, 1.0, "much too long to fit"))
        .expect("insert runs"));
    assert!(test.collection.insert(&row(2, 2.0, "ok")).expect("insert"));
    assert!(test.collection.insert(&row(3, 3.0, "fine")).expect("insert"));

    let rows = test
        .collection
        .query("Score >= 2")
        .expect("parse")
        .build()
        .expect("build")
        .select(&["Id", "Code"])
        .expect("select");
    let pairs: Vec<_> = rows
        .iter()
        .map(|r| (r.get("Id").cloned(), r.get("Code").cloned()))
        .collect();
    assert_eq!(
        pairs,
        vec![
            (Some(Value::I64(2)), Some(Value::from("ok"))),
            (Some(Value::I64(3)), Some(Value::from("fine"))),
        ]
    );
}

#[test]
fn test_missing_key_value_is_rejected() {
    let test = coded();
    let err = test
        .collection
        .insert(&DynamicRow::new().with("Score", 1.0))
        .expect_err("no key");
    assert!(matches!(err, CollectionError::MissingKeyValue(key) if key == "Id"));
    assert_eq!(matching(&test.collection, ""), Vec::<i64>::new());
}

#[test]
fn test_value_of_wrong_type_is_rejected_before_writing() {
    let test = coded();
    let err = test
        .collection
        .insert(&DynamicRow::new().with("Id", 1).with("Score", "high"))
        .expect_err("wrong type");
    assert!(matches!(
        err,
        CollectionError::TypeMismatch { ref column, expected: ColumnType::F64, .. } if column == "Score"
    ));
    assert_eq!(matching(&test.collection, ""), Vec::<i64>::new());
}

#[test]
fn test_missing_non_key_values_are_skipped() {
    let test = coded();
    assert!(test.collection.insert(&DynamicRow::new().with("Id", 7)).expect("insert"));
    let rows = test
        .collection
        .query("Id == 7")
        .expect("parse")
        .build()
        .expect("build")
        .select(&[])
        .expect("select");
    assert_eq!(rows, vec![DynamicRow::new().with("Id", 7i64)]);
}

#[test]
fn test_insert_without_columns_fails() {
    let test = TestCollection::new();
    assert!(matches!(
        test.collection.insert(&DynamicRow::new().with("Id", 1)),
        Err(CollectionError::NoKeyColumn)
    ));
}
