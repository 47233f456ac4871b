//! Unsized text columns: multi-block values, whitespace and updates.

use crate::collection::{CollectionError, ColumnDef, ColumnType, DynamicRow, Value};
use crate::e2e_tests::helpers::{TestCollection, matching};

fn notes() -> TestCollection {
    TestCollection::with_columns(&[
        ColumnDef::new("Id", ColumnType::I64),
        ColumnDef::new("Bio", ColumnType::Text),
    ])
}

fn bio_of(test: &TestCollection, id: i64) -> Option<Value> {
    let rows = test
        .collection
        .query(&format!("Id == {id}"))
        .expect("parse")
        .build()
        .expect("build")
        .select(&["Bio"])
        .expect("select");
    rows.first().and_then(|row| row.get("Bio").cloned())
}

#[test]
fn test_long_text_spans_blocks() {
    let test = notes();
    let long = "lorem ipsum dolor sit amet ".repeat(20);
    assert!(test
        .collection
        .insert(&DynamicRow::new().with("Id", 1).with("Bio", long.as_str()))
        .expect("insert"));
    assert_eq!(bio_of(&test, 1), Some(Value::Text(long)));
}

#[test]
fn test_whitespace_text_round_trips() {
    let test = notes();
    for (id, bio) in [(1, "  \t "), (2, "")] {
        assert!(test
            .collection
            .insert(&DynamicRow::new().with("Id", id).with("Bio", bio))
            .expect("insert"));
    }
    assert_eq!(bio_of(&test, 1), Some(Value::from("  \t ")));
    assert_eq!(bio_of(&test, 2), Some(Value::from("")));
}

#[test]
fn test_update_text_grows_and_shrinks() {
    let test = notes();
    assert!(test
        .collection
        .insert(&DynamicRow::new().with("Id", 1).with("Bio", "short"))
        .expect("insert"));

    let long = "x".repeat(300);
    assert_eq!(test.collection.update("Bio", &[1], long.as_str()).expect("update"), 1);
    assert_eq!(bio_of(&test, 1), Some(Value::Text(long)));

    assert_eq!(test.collection.update("Bio", &[1], "tiny").expect("update"), 1);
    assert_eq!(bio_of(&test, 1), Some(Value::from("tiny")));
}

#[test]
fn test_comparison_on_unsized_text_is_rejected() {
    let test = notes();
    let err = test
        .collection
        .query("Bio == 'x'")
        .expect("parse")
        .build()
        .expect_err("not orderable");
    assert!(matches!(err, CollectionError::NotOrderable(name) if name == "Bio"));
}

#[test]
fn test_unsized_text_cannot_be_key() {
    let test = TestCollection::new();
    let err = test
        .collection
        .declare_column(ColumnDef::new("Bio", ColumnType::Text).as_key())
        .expect_err("not a key");
    assert!(matches!(err, CollectionError::KeyNotOrderable(_)));
}

#[test]
fn test_text_first_column_leaves_key_to_next_orderable() {
    let test = TestCollection::with_columns(&[
        ColumnDef::new("Bio", ColumnType::Text),
        ColumnDef::new("Id", ColumnType::I64),
    ]);
    assert_eq!(test.collection.key().expect("key"), Some("Id".to_string()));
    assert!(test
        .collection
        .insert(&DynamicRow::new().with("Id", 4).with("Bio", "hello"))
        .expect("insert"));
    assert_eq!(matching(&test.collection, ""), vec![4]);
}
