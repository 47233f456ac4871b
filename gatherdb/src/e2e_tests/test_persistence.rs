//! Collections survive closing and reopening.

use crate::collection::{Collection, ColumnType, Value};
use crate::e2e_tests::helpers::{TestCollection, ages, matching, person};

#[test]
fn test_reopen_restores_schema_and_rows() {
    let test = ages();
    test.collection.dispose().expect("dispose");
    assert!(Collection::exists("test", "items", &test.config));

    let reopened = test.reopen();
    assert_eq!(reopened.key().expect("key"), Some("Id".to_string()));
    let columns = reopened.columns().expect("columns");
    let names: Vec<_> = columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Id", "Name", "Age"]);
    assert_eq!(columns[1].column_type, ColumnType::Text);
    assert_eq!(columns[1].size, 32);
    assert!(columns[0].key);

    assert_eq!(matching(&reopened, "Age >= 20"), vec![2, 3]);
    assert!(reopened.insert(&person(4, "Dee", 40)).expect("insert"));
    assert_eq!(matching(&reopened, ""), vec![1, 2, 3, 4]);
}

#[test]
fn test_reopen_after_delete_reuses_ids() {
    let test = ages();
    assert!(test.collection.delete(&[2]).expect("delete"));
    test.collection.dispose().expect("dispose");

    let reopened = test.reopen();
    assert!(reopened.insert(&person(5, "Eve", 50)).expect("insert"));
    let result = reopened.query("Id == 5").expect("parse").build().expect("build");
    assert_eq!(result.ids(), &[2]);
    let rows = result.select(&["Name", "Age"]).expect("select");
    assert_eq!(rows[0].get("Name"), Some(&Value::from("Eve")));
    assert_eq!(rows[0].get("Age"), Some(&Value::I32(50)));
}

#[test]
fn test_declare_from_json_configuration() {
    let test = TestCollection::new();
    let declared = test
        .collection
        .declare_from_json(
            r#"{"items": {
                "Code": {"type": "int", "key": true},
                "Label": {"type": "string", "size": 20},
                "Notes": {"type": "string"}
            }}"#,
        )
        .expect("declare");
    assert_eq!(declared, 3);
    assert_eq!(test.collection.key().expect("key"), Some("Code".to_string()));

    let again = test
        .collection
        .declare_from_json(r#"{"Code": {"type": "int"}}"#)
        .expect("declare");
    assert_eq!(again, 0);
}

#[test]
fn test_drop_collection_removes_files() {
    let test = ages();
    let directory = test.collection.directory().to_path_buf();
    assert!(directory.join("Age.gather").exists());

    test.collection.dispose().expect("dispose");
    test.reopen().drop_collection().expect("drop");
    assert!(!directory.exists());
    assert!(!Collection::exists("test", "items", &test.config));
}
