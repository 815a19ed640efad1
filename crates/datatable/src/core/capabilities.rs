//! Backend capability flags.
//!
//! Computed once per connection by the record store and handed to the
//! relational adapter, so no adapter inspects the backend on its own.

use serde::{Deserialize, Serialize};

/// SQL dialect spoken by the record store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect {
    /// PostgreSQL (`$N` placeholders).
    #[default]
    Postgres,
    /// MySQL / MariaDB (`?` placeholders).
    MySql,
    /// SQLite (`?N` placeholders).
    Sqlite,
}

impl SqlDialect {
    /// Returns the placeholder for the 1-based parameter `n`.
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            SqlDialect::Postgres => format!("${}", n),
            SqlDialect::MySql => "?".to_string(),
            SqlDialect::Sqlite => format!("?{}", n),
        }
    }

    /// Returns an expression extracting the calendar year of `field`.
    pub fn year_expression(&self, field: &str) -> String {
        match self {
            SqlDialect::Postgres | SqlDialect::MySql => format!("EXTRACT(YEAR FROM {})", field),
            SqlDialect::Sqlite => format!("CAST(strftime('%Y', {}) AS INTEGER)", field),
        }
    }
}

/// What the relational backend supports natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendCapabilities {
    /// SQL dialect.
    #[serde(default)]
    pub dialect: SqlDialect,

    /// Supports `NULLS FIRST` / `NULLS LAST` in ORDER BY.
    #[serde(default)]
    pub native_null_ordering: bool,

    /// Supports the `ILIKE` operator.
    #[serde(default)]
    pub supports_ilike: bool,
}

impl BackendCapabilities {
    /// PostgreSQL capabilities.
    pub fn postgres() -> Self {
        Self {
            dialect: SqlDialect::Postgres,
            native_null_ordering: true,
            supports_ilike: true,
        }
    }

    /// MySQL capabilities.
    pub fn mysql() -> Self {
        Self {
            dialect: SqlDialect::MySql,
            native_null_ordering: false,
            supports_ilike: false,
        }
    }

    /// SQLite (3.30+) capabilities.
    pub fn sqlite() -> Self {
        Self {
            dialect: SqlDialect::Sqlite,
            native_null_ordering: true,
            supports_ilike: false,
        }
    }

    /// Returns the preset for a dialect.
    pub fn for_dialect(dialect: SqlDialect) -> Self {
        match dialect {
            SqlDialect::Postgres => Self::postgres(),
            SqlDialect::MySql => Self::mysql(),
            SqlDialect::Sqlite => Self::sqlite(),
        }
    }

    /// Overrides native null ordering support.
    pub fn with_native_null_ordering(mut self, supported: bool) -> Self {
        self.native_null_ordering = supported;
        self
    }
}

impl Default for BackendCapabilities {
    fn default() -> Self {
        Self::postgres()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders() {
        assert_eq!(SqlDialect::Postgres.placeholder(3), "$3");
        assert_eq!(SqlDialect::Sqlite.placeholder(3), "?3");
        assert_eq!(SqlDialect::MySql.placeholder(3), "?");
    }

    #[test]
    fn test_presets() {
        assert!(BackendCapabilities::postgres().supports_ilike);
        assert!(!BackendCapabilities::mysql().native_null_ordering);
        assert_eq!(
            BackendCapabilities::for_dialect(SqlDialect::Sqlite),
            BackendCapabilities::sqlite()
        );
    }

    #[test]
    fn test_year_expression() {
        assert_eq!(
            SqlDialect::Postgres.year_expression("created_at"),
            "EXTRACT(YEAR FROM created_at)"
        );
        assert!(SqlDialect::Sqlite.year_expression("created_at").contains("strftime"));
    }
}
