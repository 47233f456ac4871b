//! Range queries, selection and deletion over a small people collection.

use crate::collection::{DynamicRow, Value};
use crate::e2e_tests::helpers::{TestCollection, ages, ids_of, matching, person};

#[test]
fn test_range_conjunction() {
    let test = ages();
    assert_eq!(matching(&test.collection, "Age >= 15 && Age <= 25"), vec![2]);
    assert_eq!(matching(&test.collection, "Age > 10"), vec![2, 3]);
    assert_eq!(matching(&test.collection, "Age < 10"), Vec::<i64>::new());
}

#[test]
fn test_empty_condition_matches_everything_in_key_order() {
    let test = ages();
    let rows = test
        .collection
        .query("")
        .expect("parse")
        .build()
        .expect("build")
        .select(&[])
        .expect("select");
    assert_eq!(ids_of(&rows), vec![1, 2, 3]);
    assert_eq!(rows[1].get("Name"), Some(&Value::from("Bob")));
    assert_eq!(rows[1].get("Age"), Some(&Value::I32(20)));
}

#[test]
fn test_select_returns_clause_order() {
    let test = ages();
    let result = test
        .collection
        .query("Age >= 10")
        .expect("parse")
        .build()
        .expect("build");
    let rows = result.select(&["Name"]).expect("select");
    let names: Vec<_> = rows.iter().filter_map(|r| r.get("Name")).cloned().collect();
    assert_eq!(names, vec![Value::from("Ann"), Value::from("Bob"), Value::from("Cid")]);
}

#[test]
fn test_delete_matched_rows() {
    let test = ages();
    let result = test
        .collection
        .query("Id == 1 || Id == 3")
        .expect("parse")
        .build()
        .expect("build");
    assert_eq!(result.count(), 2);
    assert!(result.delete().expect("delete"));

    assert_eq!(matching(&test.collection, ""), vec![2]);
    assert_eq!(matching(&test.collection, "Age == 10"), Vec::<i64>::new());
}

#[test]
fn test_delete_unknown_id_reports_false() {
    let test = ages();
    assert!(!test.collection.delete(&[2, 99]).expect("delete"));
    assert_eq!(matching(&test.collection, ""), vec![1, 3]);
}

#[test]
fn test_clause_on_undeclared_column_matches_nothing() {
    let test = ages();
    assert_eq!(matching(&test.collection, "Height > 3"), Vec::<i64>::new());
    assert_eq!(matching(&test.collection, "Height > 3 || Age == 30"), vec![3]);
}

#[test]
fn test_skip_and_take_page_results() {
    let test = ages();
    let page = test
        .collection
        .query("Age > 0")
        .expect("parse")
        .build()
        .expect("build")
        .skip(1)
        .take(1);
    assert_eq!(ids_of(&page.select(&["Id"]).expect("select")), vec![2]);
}

#[test]
fn test_select_keeps_rows_missing_the_column() {
    let test = TestCollection::people();
    let nameless = DynamicRow::new().with("Id", 1).with("Age", 5);
    assert!(test.collection.insert(&nameless).expect("insert"));
    assert!(test.collection.insert(&person(2, "Bo", 6)).expect("insert"));

    let result = test
        .collection
        .query("Age < 10")
        .expect("parse")
        .build()
        .expect("build");
    let rows = result.select(&["Name"]).expect("select");
    assert_eq!(rows.len(), result.count());
    assert_eq!(rows, vec![DynamicRow::new(), DynamicRow::new().with("Name", "Bo")]);
}
