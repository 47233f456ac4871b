//! Operator precedence and grouping in conditions.

use crate::collection::CollectionError;
use crate::e2e_tests::helpers::{ages, matching};

#[test]
fn test_and_binds_tighter_than_or() {
    let test = ages();
    // Age == 10 || (Age == 20 && Id == 3)
    assert_eq!(matching(&test.collection, "Age == 10 || Age == 20 && Id == 3"), vec![1]);
    // (Age == 20 && Id == 2) || Age == 30
    assert_eq!(matching(&test.collection, "Age == 20 && Id == 2 || Age == 30"), vec![2, 3]);
}

#[test]
fn test_parentheses_override_precedence() {
    let test = ages();
    assert_eq!(matching(&test.collection, "(Age == 10 || Age == 20) && Id == 2"), vec![2]);
    assert_eq!(matching(&test.collection, "((Age > 5)) && (Id < 3 && (Age >= 20))"), vec![2]);
}

#[test]
fn test_quoted_literals() {
    let test = ages();
    assert_eq!(matching(&test.collection, "Name == 'Bob' || Name == \"Cid\""), vec![2, 3]);
    assert_eq!(matching(&test.collection, "Name>='B'&&Name<'C'"), vec![2]);
}

#[test]
fn test_malformed_condition_reports_position() {
    let test = ages();
    let err = test.collection.query("Age => 3").expect_err("bad operator");
    match err {
        CollectionError::Parse(e) => {
            assert_eq!(e.position, 4);
            assert!(e.reason.contains("invalid operator"));
        }
        other => panic!("expected a parse error, got {other}"),
    }
    assert!(matches!(
        test.collection.query("(Age > 3"),
        Err(CollectionError::Parse(_))
    ));
}

#[test]
fn test_literal_of_wrong_type() {
    let test = ages();
    let err = test
        .collection
        .query("Age > old")
        .expect("parse")
        .build()
        .expect_err("not a number");
    assert!(matches!(err, CollectionError::InvalidLiteral { .. }));
}
