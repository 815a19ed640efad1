//! Search index backend.
//!
//! - [`query_builder`] - The Query DSL body under construction
//! - [`predicate`] - Parsed term to clause table and sort clauses
//! - [`aggregate`] - Aggregation bodies and bucket decoding
//! - [`adapter`] - The search index query adapter
//! - `client` - Elasticsearch index (feature `elasticsearch`)

pub mod adapter;
pub mod aggregate;
pub mod predicate;
pub mod query_builder;

#[cfg(feature = "elasticsearch")]
pub mod client;

pub use adapter::{ExecutedIndexQuery, IndexQuery};
pub use predicate::IndexClause;
pub use query_builder::IndexQueryBody;

#[cfg(feature = "elasticsearch")]
pub use client::{ElasticsearchAuth, ElasticsearchIndex, ElasticsearchIndexConfig};
