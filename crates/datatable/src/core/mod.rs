//! Collaborator traits and the caller-facing query abstractions.
//!
//! - [`capabilities`] - Relational backend capability flags
//! - [`store`] - The record store and association reflection
//! - [`index`] - The search index
//! - [`query`] - Write/read phase traits implemented by both adapters

pub mod capabilities;
pub mod index;
pub mod query;
pub mod store;

pub use capabilities::{BackendCapabilities, SqlDialect};
pub use index::SearchIndex;
pub use query::{DatatableQuery, ExecutedQuery, run};
pub use store::{
    Association, AssociationKind, AssociationSource, Deobfuscate, JoinTable, NoObfuscation,
    PolymorphicLink, RecordStore, RelationSize,
};
