//! The relational query under construction.

use super::fragment::SqlFragment;

/// A `SELECT` over one table, built up clause by clause.
///
/// Filters and having-predicates are conjoined in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Relation {
    /// Table (or table expression) selected from.
    pub table: String,
    /// Custom select list; `None` selects `table.*`.
    pub projection: Option<String>,
    /// Raw JOIN clauses.
    pub joins: Vec<String>,
    /// WHERE predicates.
    pub filters: Vec<SqlFragment>,
    /// GROUP BY expressions.
    pub group_by: Vec<String>,
    /// HAVING predicates.
    pub having: Vec<SqlFragment>,
    /// ORDER BY terms.
    pub order_by: Vec<String>,
    /// Row limit.
    pub limit: Option<u64>,
    /// Row offset.
    pub offset: Option<u64>,
}

impl Relation {
    /// Selects every row of `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    /// Replaces the select list.
    pub fn with_projection(mut self, projection: impl Into<String>) -> Self {
        self.projection = Some(projection.into());
        self
    }

    /// Adds a JOIN clause.
    pub fn with_join(mut self, join: impl Into<String>) -> Self {
        self.joins.push(join.into());
        self
    }

    /// Adds a base WHERE predicate.
    pub fn with_filter(mut self, filter: SqlFragment) -> Self {
        self.filters.push(filter);
        self
    }

    /// Adds a GROUP BY expression.
    pub fn with_group_by(mut self, expression: impl Into<String>) -> Self {
        self.group_by.push(expression.into());
        self
    }

    /// Returns true when the relation is grouped.
    pub fn is_grouped(&self) -> bool {
        !self.group_by.is_empty()
    }

    /// Returns true when the relation selects a custom list.
    pub fn has_custom_projection(&self) -> bool {
        self.projection.is_some()
    }

    /// Returns a copy without ORDER BY, LIMIT and OFFSET.
    pub fn unpaged(&self) -> Relation {
        Relation {
            order_by: Vec::new(),
            limit: None,
            offset: None,
            ..self.clone()
        }
    }

    /// Builds the WHERE/GROUP BY/HAVING tail shared by the select and count forms.
    fn body(&self) -> SqlFragment {
        let mut sql = SqlFragment::new(format!("FROM {}", self.table));
        for join in &self.joins {
            sql.push_sql(" ");
            sql.push_sql(join);
        }
        if let Some(filter) = SqlFragment::and_all(self.filters.iter().cloned()) {
            sql.push_sql(" WHERE");
            sql.push_fragment(&filter);
        }
        if self.is_grouped() {
            sql.push_sql(" GROUP BY ");
            sql.push_sql(&self.group_by.join(", "));
        }
        if let Some(having) = SqlFragment::and_all(self.having.iter().cloned()) {
            sql.push_sql(" HAVING");
            sql.push_fragment(&having);
        }
        sql
    }

    /// Builds the full `SELECT` statement.
    pub fn to_sql(&self) -> SqlFragment {
        let projection = self
            .projection
            .clone()
            .unwrap_or_else(|| format!("{}.*", self.table));

        let mut sql = SqlFragment::new(format!("SELECT {}", projection));
        sql.push_fragment(&self.body());

        if !self.order_by.is_empty() {
            sql.push_sql(" ORDER BY ");
            sql.push_sql(&self.order_by.join(", "));
        }
        if let Some(limit) = self.limit {
            sql.push_sql(&format!(" LIMIT {}", limit));
        }
        if let Some(offset) = self.offset {
            sql.push_sql(&format!(" OFFSET {}", offset));
        }
        sql
    }

    /// Builds `SELECT COUNT(*)` over the unpaged relation.
    ///
    /// Plain relations are counted directly; grouped or projected ones are
    /// counted as a derived table.
    pub fn count_sql(&self) -> SqlFragment {
        if !self.is_grouped() && !self.has_custom_projection() {
            let mut sql = SqlFragment::new("SELECT COUNT(*)");
            sql.push_fragment(&self.body());
            return sql;
        }

        let inner = self.unpaged().to_sql();
        SqlFragment::with_params(
            format!("SELECT COUNT(*) FROM ({}) AS datatable_count", inner.sql),
            inner.params,
        )
    }

    /// Builds one member count per group of a grouped relation.
    pub fn group_sizes_sql(&self) -> SqlFragment {
        let mut sql = SqlFragment::new("SELECT COUNT(*)");
        sql.push_fragment(&self.body());
        sql
    }
}
