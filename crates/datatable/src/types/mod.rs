//! Core types for table-view queries.
//!
//! - [`column`] - Column definitions and their search/sort options
//! - [`request`] - Search terms, order spec and page window
//! - [`aggregate`] - Aggregate specs and decoded buckets
//! - [`strategy`] - Per-column search/order strategy objects
//! - [`page`] - The executed result page

pub mod aggregate;
pub mod column;
pub mod page;
pub mod request;
pub mod strategy;

pub use aggregate::{AggregateBuckets, AggregateKind, AggregateOptions, AggregateSpec};
pub use column::{
    AssociationMode, AssociationOptions, ColumnDefinition, ColumnOptions, ColumnType, MatchMode,
    NullOrdering, RangeOperator, SearchOptions, TargetClause,
};
pub use page::ResultPage;
pub use request::{DatatableRequest, OrderSpec, PageWindow, SearchTerm, SearchTerms, SortDirection};
pub use strategy::{CustomOrder, CustomPredicate, OrderStrategy, SearchStrategy};

/// A result row: column/field name to value.
pub type Record = serde_json::Map<String, serde_json::Value>;
