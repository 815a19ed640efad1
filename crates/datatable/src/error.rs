//! Error types for the datatable query layer.
//!
//! Fatal errors are grouped under [`DatatableError`]: registry setup
//! mistakes, adapter contract violations and backend failures. Problems
//! with individual search terms are modelled separately by [`TermError`];
//! those never reach the caller, the adapters log them and drop the term.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

/// The primary error type for all datatable operations.
#[derive(Error, Debug)]
pub enum DatatableError {
    /// Column registry errors
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Query construction errors
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Backend-specific errors
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Errors raised while building a column registry.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// A column with the same name was already defined.
    #[error("duplicate column: {name}")]
    DuplicateColumn { name: String },

    /// Introspection found no column or association with this name.
    #[error("unknown column {name} on {table}")]
    UnknownField { table: String, name: String },
}

/// Errors raised while compiling or executing a query.
#[derive(Error, Debug)]
pub enum QueryError {
    /// A call did not produce the query shape the adapter expects, or the
    /// adapter was driven out of order.
    #[error("adapter contract violation in {operation}: {message}")]
    AdapterContractViolation { operation: String, message: String },

    /// Association reflection failed for a column.
    #[error("association not found: {table}.{association}")]
    AssociationNotFound { table: String, association: String },

    /// The requested order column is declared as not sortable.
    #[error("column is not sortable: {column}")]
    ColumnNotSortable { column: String },
}

impl QueryError {
    /// Shorthand for an [`QueryError::AdapterContractViolation`].
    pub fn contract(operation: impl Into<String>, message: impl Into<String>) -> Self {
        QueryError::AdapterContractViolation {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// Errors originating from the record store or search index.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Connection to the backend failed.
    #[error("connection failed to {backend_name}: {message}")]
    ConnectionFailed {
        backend_name: String,
        message: String,
    },

    /// Query execution error.
    #[error("query execution failed on {backend_name}: {message}")]
    QueryFailed {
        backend_name: String,
        message: String,
    },

    /// The backend answered with a body the adapter cannot read.
    #[error("malformed response from {backend_name}: {message}")]
    MalformedResponse {
        backend_name: String,
        message: String,
    },

    /// Internal backend error.
    #[error("internal error in {backend_name}: {message}")]
    Internal {
        backend_name: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl BackendError {
    /// Creates a [`BackendError::QueryFailed`].
    pub fn query_failed(backend_name: &str, message: impl Into<String>) -> Self {
        BackendError::QueryFailed {
            backend_name: backend_name.to_string(),
            message: message.into(),
        }
    }

    /// Creates a [`BackendError::MalformedResponse`].
    pub fn malformed(backend_name: &str, message: impl Into<String>) -> Self {
        BackendError::MalformedResponse {
            backend_name: backend_name.to_string(),
            message: message.into(),
        }
    }
}

/// Reasons a single search term contributes no predicate.
///
/// These are recovered locally: the term is skipped and the collection
/// passes through unfiltered by it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TermError {
    /// The term names a column that is not in the registry.
    #[error("unknown column: {column}")]
    UnknownColumn { column: String },

    /// The raw value cannot be read as the column's type.
    #[error("unparseable term '{raw}' for {column_type} column")]
    Unparseable { column_type: String, raw: String },

    /// The raw value's digits do not form a valid date.
    #[error("invalid date term '{raw}'")]
    DateParse { raw: String },

    /// The column type has no predicate on this backend.
    #[error("{column_type} columns are not searchable on {backend}")]
    Unsupported {
        column_type: String,
        backend: &'static str,
    },
}

/// Result type for datatable operations.
pub type DatatableResult<T> = Result<T, DatatableError>;
