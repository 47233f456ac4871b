//! Operations on a closed collection.

use crate::collection::CollectionError;
use crate::e2e_tests::helpers::{ages, person};

#[test]
fn test_disposed_collection_rejects_use() {
    let test = ages();
    test.collection.dispose().expect("dispose");
    assert!(test.collection.is_disposed());

    assert!(matches!(
        test.collection.insert(&person(9, "Zed", 90)),
        Err(CollectionError::Disposed(_))
    ));
    assert!(matches!(test.collection.query("Age > 1"), Err(CollectionError::Disposed(_))));
    assert!(matches!(test.collection.delete(&[1]), Err(CollectionError::Disposed(_))));
    assert!(matches!(test.collection.key(), Err(CollectionError::Disposed(_))));
    assert!(matches!(test.collection.flush(), Err(CollectionError::Disposed(_))));
}

#[test]
fn test_dispose_twice_is_harmless() {
    let test = ages();
    test.collection.dispose().expect("first dispose");
    test.collection.dispose().expect("second dispose");
}

#[test]
fn test_result_outliving_dispose_fails_cleanly() {
    let test = ages();
    let result = test
        .collection
        .query("Age > 1")
        .expect("parse")
        .build()
        .expect("build");
    test.collection.dispose().expect("dispose");
    assert!(matches!(result.select(&["Name"]), Err(CollectionError::Disposed(_))));
}
