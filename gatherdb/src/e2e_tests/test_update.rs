//! Updating matched rows.

use crate::collection::{CollectionError, Value};
use crate::e2e_tests::helpers::{ages, matching};

#[test]
fn test_update_repositions_in_range_queries() {
    let test = ages();
    let updated = test
        .collection
        .query("Name == 'Bob'")
        .expect("parse")
        .build()
        .expect("build")
        .update("Age", 35)
        .expect("update");
    assert_eq!(updated, 1);

    assert_eq!(matching(&test.collection, "Age > 30"), vec![2]);
    assert_eq!(matching(&test.collection, "Age >= 15 && Age <= 25"), Vec::<i64>::new());
}

#[test]
fn test_update_key_column() {
    let test = ages();
    assert_eq!(test.collection.update("Id", &[1], 10).expect("update"), 1);
    assert_eq!(matching(&test.collection, ""), vec![2, 3, 10]);

    let rows = test
        .collection
        .query("Id == 10")
        .expect("parse")
        .build()
        .expect("build")
        .select(&["Name"])
        .expect("select");
    assert_eq!(rows[0].get("Name"), Some(&Value::from("Ann")));
}

#[test]
fn test_update_skips_deleted_rows() {
    let test = ages();
    assert!(test.collection.delete(&[3]).expect("delete"));
    assert_eq!(test.collection.update("Age", &[1, 3], 11).expect("update"), 1);
    assert_eq!(matching(&test.collection, "Age == 11"), vec![1]);
    assert_eq!(matching(&test.collection, ""), vec![1, 2]);
}

#[test]
fn test_update_rejects_unknown_column_and_bad_type() {
    let test = ages();
    assert!(matches!(
        test.collection.update("Height", &[1], 180),
        Err(CollectionError::UnknownColumn(name)) if name == "Height"
    ));
    assert!(matches!(
        test.collection.update("Age", &[1], "old"),
        Err(CollectionError::TypeMismatch { .. })
    ));
}
