//! Relational backend.
//!
//! - [`fragment`] - SQL fragments with bound parameters
//! - [`relation`] - The `SELECT` under construction
//! - [`predicate`] - Parsed term to predicate table
//! - [`order`] - ORDER BY with null placement
//! - [`adapter`] - The relational query adapter
//! - `sqlite` - SQLite record store (feature `sqlite`)

pub mod adapter;
pub mod fragment;
pub mod order;
pub mod predicate;
pub mod relation;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use adapter::{ExecutedRelationalQuery, RelationalQuery};
pub use fragment::{RenderedSql, SqlFragment, SqlParam};
pub use relation::Relation;

#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteStore, SqliteStoreConfig};
