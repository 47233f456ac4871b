//! Query language over a collection.
//!
//! A condition string is parsed into a [`Condition`], bound to a collection
//! as a [`QueryBuilder`], and evaluated into a [`QueryResult`] holding the
//! matching row ids.
//!
//! # Example
//!
//! ```ignore
//! let adults = collection.query("Age >= 18 && Age < 65")?.build()?;
//! for row in adults.select(&["Name"])? {
//!     println!("{row:?}");
//! }
//! ```
//!
//! `&&` binds tighter than `||`: `A || B && C` means `A || (B && C)`.

mod builder;
mod parser;
mod result;

pub use builder::QueryBuilder;
pub use parser::{Clause, Condition, Connector, ParseError, parse};
pub use result::QueryResult;
pub(crate) use result::ValueCache;
