//! Association resolution.
//!
//! A relationship column filters the owning table indirectly: the term
//! selects related rows, and the resolver turns those into the set of owner
//! identifiers through one sub-query against the record store. Adapters then
//! express the identifier set natively (`IN (...)` or a `terms` filter).

use tracing::debug;

use crate::backends::sql::predicate::{LIKE_ESCAPE, escape_like};
use crate::backends::sql::{SqlFragment, SqlParam};
use crate::core::{Association, AssociationKind, AssociationSource};
use crate::error::{DatatableResult, QueryError};
use crate::types::{AssociationMode, ColumnDefinition};

/// Outcome of resolving one association term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The term selects nothing to filter on; the collection passes through.
    Unfiltered,
    /// Owner rows whose `key` is one of `ids`.
    Owners {
        /// Owner field the identifiers refer to.
        key: String,
        /// Sorted, de-duplicated identifiers. May be empty.
        ids: Vec<i64>,
    },
}

/// Parses a comma separated id list, keeping positive integers only.
pub fn parse_id_list(raw: &str) -> Vec<i64> {
    let mut ids: Vec<i64> = raw
        .split(',')
        .filter_map(|token| token.trim().parse::<i64>().ok())
        .filter(|id| *id > 0)
        .collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Resolves relationship columns of one owning table.
pub struct AssociationResolver<'a, A: ?Sized> {
    source: &'a A,
    table: &'a str,
}

impl<'a, A> AssociationResolver<'a, A>
where
    A: AssociationSource + ?Sized,
{
    /// Creates a resolver for `table`.
    pub fn new(source: &'a A, table: &'a str) -> Self {
        Self { source, table }
    }

    /// Resolves `raw` for the relationship `column`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::AssociationNotFound`] when the store does not
    /// know the column's association.
    pub fn resolve(&self, column: &ColumnDefinition, raw: &str) -> DatatableResult<Resolution> {
        let name = column.association_name();
        let association =
            self.source
                .association(self.table, name)
                .ok_or_else(|| QueryError::AssociationNotFound {
                    table: self.table.to_string(),
                    association: name.to_string(),
                })?;

        let related = match column.association_mode() {
            AssociationMode::IdList => {
                let ids = parse_id_list(raw);
                if ids.is_empty() {
                    debug!(column = %column.name, raw, "Empty id list, skipping association filter");
                    return Ok(Resolution::Unfiltered);
                }
                let params = ids.into_iter().map(SqlParam::integer).collect::<Vec<_>>();
                let key = match association.kind {
                    AssociationKind::HasAndBelongsToMany => association
                        .join
                        .as_ref()
                        .map(|join| format!("{}.{}", join.table, join.related_key))
                        .unwrap_or_else(|| association.related_key.clone()),
                    _ => format!("{}.{}", association.related_table, association.related_key),
                };
                SqlFragment::with_params(
                    format!("{} IN ({})", key, placeholders(params.len())),
                    params,
                )
            }
            AssociationMode::TextSearch { field } => {
                match self.text_predicate(&association, field.as_deref(), raw)? {
                    Some(predicate) => predicate,
                    None => {
                        debug!(column = %column.name, "No searchable related fields, skipping association filter");
                        return Ok(Resolution::Unfiltered);
                    }
                }
            }
        };

        let (key, sql) = Self::owner_query(&association, related);
        let mut ids = self.source.pluck_ids(&sql)?;
        ids.sort_unstable();
        ids.dedup();

        debug!(
            column = %column.name,
            matched = ids.len(),
            "Resolved association filter"
        );
        Ok(Resolution::Owners { key, ids })
    }

    /// Matches `raw` against one related field or every textual related field.
    fn text_predicate(
        &self,
        association: &Association,
        field: Option<&str>,
        raw: &str,
    ) -> DatatableResult<Option<SqlFragment>> {
        let needle = raw.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(None);
        }

        let fields: Vec<String> = match field {
            Some(field) => vec![field.to_string()],
            None => self
                .source
                .columns(&association.related_table)?
                .into_iter()
                .filter(|(_, column_type)| column_type.is_textual())
                .map(|(name, _)| name)
                .collect(),
        };

        let pattern = format!("%{}%", escape_like(&needle));
        Ok(SqlFragment::or_all(fields.iter().map(|f| {
            SqlFragment::with_param(
                format!(
                    "LOWER({}.{}) LIKE ? ESCAPE '{}'",
                    association.related_table, f, LIKE_ESCAPE
                ),
                SqlParam::string(pattern.clone()),
            )
        })))
    }

    /// Wraps a predicate over related rows into the owner-id sub-query.
    fn owner_query(association: &Association, related: SqlFragment) -> (String, SqlFragment) {
        let table = &association.related_table;
        let (key, mut sql) = match (&association.kind, &association.join) {
            (AssociationKind::HasAndBelongsToMany, Some(join)) => (
                association.owner_key.clone(),
                SqlFragment::new(format!(
                    "SELECT {join}.{owner} FROM {join} INNER JOIN {table} ON {table}.{related} = {join}.{join_related} WHERE",
                    join = join.table,
                    owner = join.owner_key,
                    table = table,
                    related = association.related_key,
                    join_related = join.related_key,
                )),
            ),
            (AssociationKind::BelongsTo, _) => (
                association.foreign_key.clone(),
                SqlFragment::new(format!(
                    "SELECT {}.{} FROM {} WHERE",
                    table, association.related_key, table
                )),
            ),
            _ => (
                association.owner_key.clone(),
                SqlFragment::new(format!(
                    "SELECT {}.{} FROM {} WHERE",
                    table, association.foreign_key, table
                )),
            ),
        };

        let related = match &association.polymorphic {
            Some(link) if association.kind == AssociationKind::HasMany => related.and(
                SqlFragment::with_param(
                    format!("{}.{} = ?", table, link.type_column),
                    SqlParam::string(&link.type_name),
                ),
            ),
            _ => related,
        };
        sql.push_fragment(&related);
        (key, sql)
    }
}
