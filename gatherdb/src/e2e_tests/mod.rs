//! End-to-end tests at the collection level.
//!
//! Each test file covers one scenario, from declaring columns through
//! inserting rows, querying, and reading the results back.

#![cfg(test)]

mod helpers;

mod test_age_scenario;
mod test_concurrency;
mod test_disposed;
mod test_insert_rollback;
mod test_persistence;
mod test_precedence;
mod test_text_columns;
mod test_typed_entity;
mod test_update;
