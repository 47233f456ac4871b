//! Turns a parsed condition into a [`QueryResult`].

use tracing::debug;

use crate::collection::{Collection, CollectionError, State};
use crate::query::parser::{Clause, Condition, Connector};
use crate::query::result::QueryResult;

/// A parsed condition bound to a collection, ready to run.
#[derive(Debug)]
pub struct QueryBuilder<'c> {
    collection: &'c Collection,
    condition: Condition,
}

impl<'c> QueryBuilder<'c> {
    pub(crate) const fn new(collection: &'c Collection, condition: Condition) -> Self {
        Self {
            collection,
            condition,
        }
    }

    #[must_use]
    pub const fn condition(&self) -> &Condition {
        &self.condition
    }

    /// Run the condition under the collection's read lock.
    ///
    /// # Errors
    ///
    /// Fails if the collection is disposed, the lock times out, a clause
    /// targets a text column, or a literal does not parse for its column.
    pub fn build(&self) -> Result<QueryResult<'c>, CollectionError> {
        let state = self.collection.read_state()?;
        self.evaluate(&state, &self.condition)
    }

    fn evaluate(&self, state: &State, condition: &Condition) -> Result<QueryResult<'c>, CollectionError> {
        match condition {
            Condition::All => self.all_rows(state),
            Condition::Clause(clause) => self.clause(state, clause),
            Condition::Compound {
                operands,
                connectors,
            } => {
                assert_eq!(
                    operands.len(),
                    connectors.len() + 1,
                    "a compound condition joins n operands with n - 1 connectors"
                );
                let mut results = operands
                    .iter()
                    .map(|operand| self.evaluate(state, operand))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(combine(self.collection, &mut results, connectors.clone()))
            }
        }
    }

    fn all_rows(&self, state: &State) -> Result<QueryResult<'c>, CollectionError> {
        let Some(key) = state.key_column() else {
            return Ok(QueryResult::empty(self.collection));
        };
        let rows = key.store.lock().all().map_err(|e| e.for_column(&key.def.name))?;
        Ok(QueryResult::from_rows(self.collection, &key.def.name, rows))
    }

    fn clause(&self, state: &State, clause: &Clause) -> Result<QueryResult<'c>, CollectionError> {
        let Some(column) = state.column(&clause.column) else {
            debug!(
                column = %clause.column,
                collection = %self.collection.name(),
                "query names an undeclared column, matching nothing"
            );
            return Ok(QueryResult::empty(self.collection));
        };
        if !column.def.is_orderable() {
            return Err(CollectionError::NotOrderable(column.def.name.clone()));
        }

        let operand = column.def.column_type.parse_literal(&clause.literal)?;
        let rows = column
            .store
            .lock()
            .range(clause.comparison, &operand)
            .map_err(|e| e.for_column(&column.def.name))?;
        Ok(QueryResult::from_rows(self.collection, &column.def.name, rows))
    }
}

/// Fold `results` joined by `connectors`: every `&&` first, left to right,
/// then the remaining `||` right to left.
fn combine<'c>(
    collection: &'c Collection,
    results: &mut Vec<QueryResult<'c>>,
    mut connectors: Vec<Connector>,
) -> QueryResult<'c> {
    let mut i = 0;
    while i < connectors.len() {
        if connectors[i] == Connector::And {
            let right = results.remove(i + 1);
            results[i].and(right);
            connectors.remove(i);
        } else {
            i += 1;
        }
    }
    assert!(
        connectors.iter().all(|c| *c == Connector::Or),
        "only '||' may remain after folding '&&'"
    );

    let mut combined = results.pop();
    while let Some(mut left) = results.pop() {
        if let Some(right) = combined {
            left.or(right);
        }
        combined = Some(left);
    }
    combined.unwrap_or_else(|| QueryResult::empty(collection))
}
