//! Per-column search and order strategies.
//!
//! A column can replace the built-in predicate or order clause with a
//! strategy object. Strategies return backend-tagged output; an adapter that
//! receives output tagged for the other backend reports an
//! [`AdapterContractViolation`](crate::error::QueryError::AdapterContractViolation).

use serde_json::Value;

use crate::backends::sql::SqlFragment;

use super::column::ColumnDefinition;
use super::request::SortDirection;

/// Output of a custom [`SearchStrategy`].
#[derive(Debug, Clone)]
pub enum CustomPredicate {
    /// A relational predicate fragment.
    Sql(SqlFragment),
    /// A search-index filter clause.
    Index(Value),
    /// No filtering for this term.
    Unfiltered,
}

impl CustomPredicate {
    /// Returns the backend the predicate was built for.
    pub fn backend(&self) -> &'static str {
        match self {
            CustomPredicate::Sql(_) => "relational",
            CustomPredicate::Index(_) => "search index",
            CustomPredicate::Unfiltered => "any",
        }
    }
}

/// Output of a custom [`OrderStrategy`].
#[derive(Debug, Clone)]
pub enum CustomOrder {
    /// ORDER BY terms, e.g. `"LOWER(name) ASC"`.
    Sql(Vec<String>),
    /// Sort clauses for the search index.
    Index(Vec<Value>),
}

impl CustomOrder {
    /// Returns the backend the order was built for.
    pub fn backend(&self) -> &'static str {
        match self {
            CustomOrder::Sql(_) => "relational",
            CustomOrder::Index(_) => "search index",
        }
    }
}

/// Replaces the built-in predicate of a column.
pub trait SearchStrategy: Send + Sync {
    /// Builds the predicate for `term` on `column`.
    fn predicate(&self, column: &ColumnDefinition, term: &str) -> CustomPredicate;
}

impl<F> SearchStrategy for F
where
    F: Fn(&ColumnDefinition, &str) -> CustomPredicate + Send + Sync,
{
    fn predicate(&self, column: &ColumnDefinition, term: &str) -> CustomPredicate {
        self(column, term)
    }
}

/// Replaces the built-in order clause of a column.
pub trait OrderStrategy: Send + Sync {
    /// Builds the order for `column` in `direction`.
    fn order(&self, column: &ColumnDefinition, direction: SortDirection) -> CustomOrder;
}

impl<F> OrderStrategy for F
where
    F: Fn(&ColumnDefinition, SortDirection) -> CustomOrder + Send + Sync,
{
    fn order(&self, column: &ColumnDefinition, direction: SortDirection) -> CustomOrder {
        self(column, direction)
    }
}
