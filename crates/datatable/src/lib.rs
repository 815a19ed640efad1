//! Helios Datatable Query Translation
//!
//! This crate serves paginated, searched and sorted table views from
//! declarative column metadata. The same column registry and the same raw
//! search terms are compiled into either a relational query or a search index
//! Query DSL body, with equivalent semantics on both backends.
//!
//! # Features
//!
//! - **Typed search terms**: Dates and datetimes match the whole period they name,
//!   prices are compared in cents, obfuscated identifiers are reversed through the store
//! - **Fuzzy text**: Whitespace tokens are conjoined; a quoted term is matched as one phrase
//! - **Associations**: One-to-many and many-to-many columns filter owners by related rows
//! - **Null placement**: Explicit nulls-first/nulls-last ordering, emulated where the
//!   backend has no native support
//! - **Aggregates**: Terms counts, date histograms and filtered sums on the search index
//!
//! # Backend Features
//!
//! - `sqlite` (default) - SQLite record store via rusqlite and an r2d2 pool
//! - `elasticsearch` - Elasticsearch search index
//!
//! # Architecture
//!
//! - [`types`] - Column definitions, requests, aggregates and result pages
//! - [`registry`] - The column registry
//! - [`parse`] - Raw term to typed value parsing
//! - [`association`] - Relationship column resolution
//! - [`core`] - Collaborator traits and the query traits both adapters implement
//! - [`backends`] - The relational and search index adapters
//! - [`config`] - Shared configuration
//! - [`error`] - Error types for all operations
//!
//! # Quick Start
//!
//! ```
//! use helios_datatable::registry::ColumnRegistry;
//! use helios_datatable::types::{ColumnOptions, ColumnType, NullOrdering, SearchOptions};
//!
//! let registry = ColumnRegistry::builder()
//!     .define("email", ColumnType::String, ColumnOptions::new())?
//!     .define(
//!         "status",
//!         ColumnType::Enumeration,
//!         ColumnOptions::new().with_search(SearchOptions::exact()),
//!     )?
//!     .define(
//!         "closed_at",
//!         ColumnType::Datetime,
//!         ColumnOptions::new().with_null_ordering(NullOrdering::Last),
//!     )?
//!     .build();
//!
//! assert_eq!(registry.names(), vec!["email", "status", "closed_at"]);
//! # Ok::<(), helios_datatable::error::RegistryError>(())
//! ```
//!
//! # Running a request
//!
//! ```no_run
//! # #[cfg(feature = "sqlite")]
//! # fn main() -> helios_datatable::DatatableResult<()> {
//! use helios_datatable::backends::sql::{Relation, RelationalQuery, SqliteStore};
//! use helios_datatable::registry::ColumnRegistryBuilder;
//! use helios_datatable::types::DatatableRequest;
//! use helios_datatable::{DatatableConfig, run};
//!
//! let store = SqliteStore::open("app.db")?;
//! let registry =
//!     ColumnRegistryBuilder::from_store(&store, "orders", &["number", "placed_on"])?.build();
//!
//! let request: DatatableRequest = serde_json::from_str(
//!     r#"{"search_terms": {"placed_on": "2024-03"}, "order": {"column": "number"}, "page": 2}"#,
//! )
//! .expect("valid request");
//!
//! let page = run(
//!     RelationalQuery::new(&store, &registry, Relation::new("orders")),
//!     &request,
//!     &DatatableConfig::default(),
//! )?;
//! println!("{} of {} orders", page.total_entries, page.unfiltered_total_entries);
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "sqlite"))]
//! # fn main() {}
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod association;
pub mod backends;
pub mod config;
pub mod core;
pub mod error;
pub mod parse;
pub mod registry;
pub mod types;

// Re-export commonly used types at crate root
pub use config::DatatableConfig;
pub use error::{DatatableError, DatatableResult};
pub use registry::{ColumnRegistry, ColumnRegistryBuilder};
pub use types::{
    AggregateSpec, ColumnDefinition, ColumnType, DatatableRequest, OrderSpec, PageWindow,
    ResultPage, SearchTerms, SortDirection,
};

// Re-export core traits
pub use core::{
    AssociationSource, BackendCapabilities, DatatableQuery, Deobfuscate, ExecutedQuery,
    RecordStore, SearchIndex, run,
};

// Re-export adapters
pub use backends::search_index::IndexQuery;
pub use backends::sql::{Relation, RelationalQuery};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
