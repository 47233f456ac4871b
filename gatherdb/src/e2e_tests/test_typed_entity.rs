//! Storing and reading back a user struct.

use crate::collection::{Collection, ColumnDef, ColumnType, Entity, RowSink, RowSource, Value};
use crate::e2e_tests::helpers::TestCollection;

#[derive(Debug, Default, Clone, PartialEq)]
struct Book {
    isbn: u64,
    title: String,
    price: f32,
    in_print: bool,
}

impl RowSource for Book {
    fn value(&self, column: &str) -> Option<Value> {
        match column {
            "Isbn" => Some(self.isbn.into()),
            "Title" => Some(self.title.clone().into()),
            "Price" => Some(self.price.into()),
            "InPrint" => Some(self.in_print.into()),
            _ => None,
        }
    }
}

impl RowSink for Book {
    fn assign(&mut self, column: &str, value: Value) {
        match (column, value) {
            ("Isbn", Value::U64(v)) => self.isbn = v,
            ("Title", Value::Text(v)) => self.title = v,
            ("Price", Value::F32(v)) => self.price = v,
            ("InPrint", Value::Bool(v)) => self.in_print = v,
            _ => {}
        }
    }
}

impl Entity for Book {
    fn schema() -> Vec<ColumnDef> {
        vec![
            ColumnDef::new("Title", ColumnType::Text).with_size(64),
            ColumnDef::new("Isbn", ColumnType::U64).as_key(),
            ColumnDef::new("Price", ColumnType::F32),
            ColumnDef::new("InPrint", ColumnType::Bool),
        ]
    }
}

fn book(isbn: u64, title: &str, price: f32, in_print: bool) -> Book {
    Book {
        isbn,
        title: title.to_string(),
        price,
        in_print,
    }
}

#[test]
fn test_typed_round_trip() {
    let test = TestCollection::new();
    let shelf = Collection::open_typed::<Book>("test", "books", &test.config).expect("open");
    assert_eq!(shelf.key().expect("key"), Some("Isbn".to_string()));

    let books = [
        book(9_780_000_000_003, "Dune", 9.5, true),
        book(9_780_000_000_001, "Emma", 4.25, false),
        book(9_780_000_000_002, "Ulysses", 12.0, true),
    ];
    for b in &books {
        assert!(shelf.insert(b).expect("insert"));
    }

    let cheap: Vec<Book> = shelf
        .query("Price < 10 && InPrint == true")
        .expect("parse")
        .build()
        .expect("build")
        .select_as()
        .expect("select");
    assert_eq!(cheap, vec![books[0].clone()]);

    let by_isbn: Vec<Book> = shelf
        .query("")
        .expect("parse")
        .build()
        .expect("build")
        .select_as()
        .expect("select");
    assert_eq!(by_isbn, vec![books[1].clone(), books[2].clone(), books[0].clone()]);
}

#[test]
fn test_open_typed_is_idempotent() {
    let test = TestCollection::new();
    let first = Collection::open_typed::<Book>("test", "books", &test.config).expect("open");
    assert!(first.insert(&book(1, "A", 1.0, true)).expect("insert"));
    first.dispose().expect("dispose");

    let second = Collection::open_typed::<Book>("test", "books", &test.config).expect("reopen");
    assert_eq!(second.columns().expect("columns").len(), 4);
    let rows = second
        .query("Isbn == 1")
        .expect("parse")
        .build()
        .expect("build")
        .select(&["Title"])
        .expect("select");
    assert_eq!(rows[0].get("Title"), Some(&Value::from("A")));
}
