//! Readers and writers sharing one collection.

use std::time::Duration;

use crate::collection::CollectionError;
use crate::e2e_tests::helpers::{TestCollection, ages, matching, person};

#[test]
fn test_write_times_out_while_read_held() {
    let test = ages();
    let guard = test.collection.read_state().expect("read lock");

    let err = test
        .collection
        .insert(&person(4, "Dee", 40))
        .expect_err("lock held");
    match err {
        CollectionError::LockTimeout {
            collection,
            timeout,
        } => {
            assert_eq!(collection, "items");
            assert_eq!(timeout, Duration::from_millis(100));
        }
        other => panic!("expected a lock timeout, got {other}"),
    }

    // Readers still share the lock.
    assert_eq!(matching(&test.collection, "Age == 20"), vec![2]);

    drop(guard);
    assert!(test.collection.insert(&person(4, "Dee", 40)).expect("insert"));
}

#[test]
fn test_parallel_inserts_and_queries() {
    let test = TestCollection::people();
    let collection = &test.collection;

    std::thread::scope(|scope| {
        for writer in 0..4i64 {
            scope.spawn(move || {
                for i in 0..25 {
                    let id = writer * 100 + i;
                    loop {
                        match collection.insert(&person(id, "W", i32::try_from(i).expect("small"))) {
                            Ok(stored) => {
                                assert!(stored);
                                break;
                            }
                            Err(CollectionError::LockTimeout { .. }) => {}
                            Err(e) => panic!("insert failed: {e}"),
                        }
                    }
                }
            });
        }
        scope.spawn(move || {
            for _ in 0..20 {
                match collection.query("Age < 5") {
                    Ok(query) => match query.build() {
                        Ok(result) => assert!(result.count() <= 20),
                        Err(CollectionError::LockTimeout { .. }) => {}
                        Err(e) => panic!("query failed: {e}"),
                    },
                    Err(e) => panic!("parse failed: {e}"),
                }
            }
        });
    });

    let all = matching(collection, "");
    assert_eq!(all.len(), 100);
    assert_eq!(matching(collection, "Age < 5").len(), 20);
    for (writer, i) in [(0, 0), (1, 7), (3, 24)] {
        let id = writer * 100 + i;
        assert_eq!(matching(collection, &format!("Id == {id}")), vec![id]);
    }
}
