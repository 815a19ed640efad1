//! SQL fragments with bound parameters.
//!
//! Fragments mark each bound value with a bare `?`. Markers are numbered
//! only when the complete statement is rendered for a dialect, so fragments
//! compose with `and`/`or` without tracking parameter offsets.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

use crate::core::SqlDialect;

/// A fragment of SQL with bound parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlFragment {
    /// The SQL clause, with `?` for each bound parameter.
    pub sql: String,
    /// Bound parameter values, in marker order.
    pub params: Vec<SqlParam>,
}

/// A bound SQL parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    /// String parameter.
    String(String),
    /// Integer parameter.
    Integer(i64),
    /// Float parameter.
    Float(f64),
    /// Exact decimal parameter.
    Decimal(Decimal),
    /// Boolean parameter.
    Bool(bool),
    /// Date parameter.
    Date(NaiveDate),
    /// Timestamp parameter.
    Timestamp(NaiveDateTime),
    /// Null parameter.
    Null,
}

impl SqlParam {
    /// Creates a string parameter.
    pub fn string(s: impl Into<String>) -> Self {
        SqlParam::String(s.into())
    }

    /// Creates an integer parameter.
    pub fn integer(i: i64) -> Self {
        SqlParam::Integer(i)
    }

    /// Creates a float parameter.
    pub fn float(f: f64) -> Self {
        SqlParam::Float(f)
    }
}

impl fmt::Display for SqlParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlParam::String(s) => write!(f, "'{}'", s),
            SqlParam::Integer(i) => write!(f, "{}", i),
            SqlParam::Float(x) => write!(f, "{}", x),
            SqlParam::Decimal(d) => write!(f, "{}", d),
            SqlParam::Bool(b) => write!(f, "{}", b),
            SqlParam::Date(d) => write!(f, "'{}'", d.format("%Y-%m-%d")),
            SqlParam::Timestamp(t) => write!(f, "'{}'", t.format("%Y-%m-%d %H:%M:%S%.f")),
            SqlParam::Null => f.write_str("NULL"),
        }
    }
}

/// A statement rendered for one dialect.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedSql {
    /// SQL text with dialect placeholders.
    pub sql: String,
    /// Parameters in placeholder order.
    pub params: Vec<SqlParam>,
}

impl SqlFragment {
    /// Creates a new SQL fragment.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Creates a fragment with parameters.
    pub fn with_params(sql: impl Into<String>, params: Vec<SqlParam>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Creates a fragment with a single parameter.
    pub fn with_param(sql: impl Into<String>, param: SqlParam) -> Self {
        Self::with_params(sql, vec![param])
    }

    /// A predicate no row satisfies.
    pub fn never() -> Self {
        Self::new("1 = 0")
    }

    /// Combines with another fragment using AND.
    pub fn and(mut self, other: SqlFragment) -> Self {
        if !self.sql.is_empty() && !other.sql.is_empty() {
            self.sql = format!("({}) AND ({})", self.sql, other.sql);
        } else if !other.sql.is_empty() {
            self.sql = other.sql;
        }
        self.params.extend(other.params);
        self
    }

    /// Combines with another fragment using OR.
    pub fn or(mut self, other: SqlFragment) -> Self {
        if !self.sql.is_empty() && !other.sql.is_empty() {
            self.sql = format!("({}) OR ({})", self.sql, other.sql);
        } else if !other.sql.is_empty() {
            self.sql = other.sql;
        }
        self.params.extend(other.params);
        self
    }

    /// ANDs every fragment together; `None` when there are none.
    pub fn and_all(fragments: impl IntoIterator<Item = SqlFragment>) -> Option<Self> {
        fragments.into_iter().reduce(SqlFragment::and)
    }

    /// ORs every fragment together; `None` when there are none.
    pub fn or_all(fragments: impl IntoIterator<Item = SqlFragment>) -> Option<Self> {
        fragments.into_iter().reduce(SqlFragment::or)
    }

    /// Appends raw SQL text.
    pub fn push_sql(&mut self, sql: &str) {
        self.sql.push_str(sql);
    }

    /// Appends another fragment, separated by a space.
    pub fn push_fragment(&mut self, other: &SqlFragment) {
        if !self.sql.is_empty() && !other.sql.is_empty() {
            self.sql.push(' ');
        }
        self.sql.push_str(&other.sql);
        self.params.extend(other.params.iter().cloned());
    }

    /// Returns true if this fragment is empty.
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }

    /// Numbers the `?` markers with `dialect` placeholders.
    ///
    /// Markers inside single-quoted literals are left alone.
    pub fn render(&self, dialect: SqlDialect) -> RenderedSql {
        let mut sql = String::with_capacity(self.sql.len() + self.params.len() * 2);
        let mut in_literal = false;
        let mut n = 0;

        for ch in self.sql.chars() {
            match ch {
                '\'' => {
                    in_literal = !in_literal;
                    sql.push(ch);
                }
                '?' if !in_literal => {
                    n += 1;
                    sql.push_str(&dialect.placeholder(n));
                }
                _ => sql.push(ch),
            }
        }

        RenderedSql {
            sql,
            params: self.params.clone(),
        }
    }
}

impl fmt::Display for SqlFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_and_or_combination() {
        let a = SqlFragment::with_param("a = ?", SqlParam::integer(1));
        let b = SqlFragment::with_param("b = ?", SqlParam::integer(2));
        let c = SqlFragment::with_param("c = ?", SqlParam::integer(3));

        let combined = a.and(b.or(c));
        assert_eq!(combined.sql, "(a = ?) AND ((b = ?) OR (c = ?))");
        assert_eq!(combined.params.len(), 3);
    }

    #[test]
    fn test_and_with_empty() {
        let a = SqlFragment::new("");
        let b = SqlFragment::new("x = 1");
        assert_eq!(a.and(b).sql, "x = 1");
    }

    #[test]
    fn test_and_all_empty() {
        assert!(SqlFragment::and_all(Vec::new()).is_none());
    }

    #[test]
    fn test_render_numbers_markers() {
        let frag = SqlFragment::with_params(
            "a = ? AND b LIKE ?",
            vec![SqlParam::integer(1), SqlParam::string("%x%")],
        );

        assert_eq!(
            frag.render(SqlDialect::Postgres).sql,
            "a = $1 AND b LIKE $2"
        );
        assert_eq!(frag.render(SqlDialect::Sqlite).sql, "a = ?1 AND b LIKE ?2");
        assert_eq!(frag.render(SqlDialect::MySql).sql, "a = ? AND b LIKE ?");
    }

    #[test]
    fn test_render_skips_literals() {
        let frag = SqlFragment::with_param("a = '?' AND b = ?", SqlParam::integer(1));
        assert_eq!(frag.render(SqlDialect::Postgres).sql, "a = '?' AND b = $1");
    }
}
