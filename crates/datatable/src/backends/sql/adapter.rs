//! The relational query adapter.
//!
//! [`RelationalQuery`] compiles search terms and an order spec into a
//! [`Relation`] and runs it through a [`RecordStore`]. Calls must follow
//! `search → order → paginate`; any step may be skipped, none may be
//! revisited once a later step ran.

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::association::{AssociationResolver, Resolution};
use crate::core::{BackendCapabilities, DatatableQuery, ExecutedQuery, RecordStore, RelationSize};
use crate::error::{DatatableResult, QueryError};
use crate::parse::parse_term;
use crate::registry::ColumnRegistry;
use crate::types::{
    ColumnDefinition, CustomOrder, CustomPredicate, OrderSpec, PageWindow, Record, SearchTerms,
    TargetClause,
};

use super::fragment::{RenderedSql, SqlFragment, SqlParam};
use super::order::order_terms;
use super::predicate::term_predicate;
use super::relation::Relation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Stage {
    Idle,
    Filtered,
    Ordered,
    Paginated,
}

/// Write phase of a relational table query.
pub struct RelationalQuery<'a, S: RecordStore + ?Sized> {
    store: &'a S,
    registry: &'a ColumnRegistry,
    capabilities: BackendCapabilities,
    base: Relation,
    relation: Relation,
    stage: Stage,
}

impl<'a, S> RelationalQuery<'a, S>
where
    S: RecordStore + ?Sized,
{
    /// Starts a query over `relation`, which acts as the unfiltered base scope.
    pub fn new(store: &'a S, registry: &'a ColumnRegistry, relation: Relation) -> Self {
        Self {
            capabilities: store.capabilities(),
            store,
            registry,
            base: relation.clone(),
            relation,
            stage: Stage::Idle,
        }
    }

    /// The relation compiled so far.
    pub fn relation(&self) -> &Relation {
        &self.relation
    }

    /// Renders the compiled statement for the store's dialect.
    pub fn to_sql(&self) -> RenderedSql {
        self.relation.to_sql().render(self.capabilities.dialect)
    }

    fn advance(&mut self, operation: &str, next: Stage) -> Result<(), QueryError> {
        if self.stage > next {
            return Err(QueryError::contract(
                operation,
                format!("called after {:?} stage", self.stage),
            ));
        }
        self.stage = next;
        Ok(())
    }

    /// Builds the predicate for one term; `None` means the term is dropped.
    fn predicate(&self, column: &ColumnDefinition, raw: &str) -> DatatableResult<Option<SqlFragment>> {
        if let Some(strategy) = &column.search_strategy {
            return match strategy.predicate(column, raw) {
                CustomPredicate::Sql(fragment) => Ok(Some(fragment)),
                CustomPredicate::Unfiltered => Ok(None),
                other => Err(QueryError::contract(
                    "search",
                    format!(
                        "strategy for column {} returned a {} predicate",
                        column.name,
                        other.backend()
                    ),
                )
                .into()),
            };
        }

        if column.column_type.is_association() {
            let resolver = AssociationResolver::new(self.store, &self.base.table);
            return Ok(match resolver.resolve(column, raw)? {
                Resolution::Unfiltered => None,
                Resolution::Owners { ids, .. } if ids.is_empty() => Some(SqlFragment::never()),
                Resolution::Owners { key, ids } => Some(SqlFragment::with_params(
                    format!(
                        "{}.{} IN ({})",
                        self.base.table,
                        key,
                        vec!["?"; ids.len()].join(", ")
                    ),
                    ids.into_iter().map(SqlParam::Integer).collect(),
                )),
            });
        }

        match parse_term(column, raw, self.store) {
            Ok(parsed) => Ok(Some(term_predicate(column, parsed, &self.capabilities))),
            Err(e) => {
                debug!(column = %column.name, raw, error = %e, "Dropping search term");
                Ok(None)
            }
        }
    }

    /// Counts `relation`, tolerating grouped and projected shapes.
    fn count(store: &S, relation: &Relation) -> DatatableResult<u64> {
        let unpaged = relation.unpaged();
        Ok(match store.size(&unpaged)? {
            RelationSize::Exact(n) => n,
            // Grouped relations report the number of groups shown
            RelationSize::Grouped(groups) => groups.len() as u64,
            RelationSize::Unknown => match store.count(&unpaged.count_sql()) {
                Ok(n) => n,
                Err(e) => {
                    warn!(error = %e, "Count fallback failed, defaulting to 1");
                    1
                }
            },
        })
    }
}

impl<'a, S> DatatableQuery for RelationalQuery<'a, S>
where
    S: RecordStore + ?Sized,
{
    type Executed = ExecutedRelationalQuery<'a, S>;

    fn search(mut self, terms: &SearchTerms) -> DatatableResult<Self> {
        self.advance("search", Stage::Filtered)?;

        let registry = self.registry;
        for (column, raw) in registry.resolve_terms(terms) {
            let Some(predicate) = self.predicate(column, raw)? else {
                continue;
            };
            match column.search.target_clause {
                TargetClause::Filter => self.relation.filters.push(predicate),
                TargetClause::Having => self.relation.having.push(predicate),
            }
        }
        Ok(self)
    }

    fn order(mut self, spec: Option<&OrderSpec>) -> DatatableResult<Self> {
        self.advance("order", Stage::Ordered)?;

        let registry = self.registry;
        let Some((column, direction)) = registry.resolve_order(spec)? else {
            return Ok(self);
        };

        let terms = match &column.order_strategy {
            Some(strategy) => match strategy.order(column, direction) {
                CustomOrder::Sql(terms) => terms,
                other => {
                    return Err(QueryError::contract(
                        "order",
                        format!(
                            "strategy for column {} returned a {} order",
                            column.name,
                            other.backend()
                        ),
                    )
                    .into());
                }
            },
            None => order_terms(column, direction, &self.capabilities),
        };

        // The base scope's own order becomes a tie-breaker
        let base_order = std::mem::take(&mut self.relation.order_by);
        self.relation.order_by = terms.into_iter().chain(base_order).collect();
        Ok(self)
    }

    fn paginate(mut self, window: PageWindow) -> DatatableResult<Self> {
        self.advance("paginate", Stage::Paginated)?;
        self.relation.limit = Some(u64::from(window.per_page()));
        self.relation.offset = Some(window.offset());
        Ok(self)
    }

    fn execute(self) -> DatatableResult<Self::Executed> {
        let statement = self.relation.to_sql();
        debug!(
            sql = %statement.render(self.capabilities.dialect).sql,
            params = statement.params.len(),
            "Executing relational query"
        );

        let rows = self.store.select(&statement)?;
        let total_entries = Self::count(self.store, &self.relation)?;

        Ok(ExecutedRelationalQuery {
            store: self.store,
            base: self.base,
            rows,
            total_entries,
            unfiltered: RwLock::new(None),
        })
    }
}

/// Read phase of a relational table query.
pub struct ExecutedRelationalQuery<'a, S: RecordStore + ?Sized> {
    store: &'a S,
    base: Relation,
    rows: Vec<Record>,
    total_entries: u64,
    unfiltered: RwLock<Option<u64>>,
}

impl<S> ExecutedQuery for ExecutedRelationalQuery<'_, S>
where
    S: RecordStore + ?Sized,
{
    fn rows(&self) -> &[Record] {
        &self.rows
    }

    fn into_rows(self) -> Vec<Record> {
        self.rows
    }

    fn total_entries(&self) -> u64 {
        self.total_entries
    }

    fn unfiltered_total_entries(&self) -> DatatableResult<u64> {
        if let Some(n) = *self.unfiltered.read() {
            return Ok(n);
        }
        let n = RelationalQuery::count(self.store, &self.base)?;
        *self.unfiltered.write() = Some(n);
        Ok(n)
    }
}

impl<S> std::fmt::Debug for ExecutedRelationalQuery<'_, S>
where
    S: RecordStore + ?Sized,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutedRelationalQuery")
            .field("rows", &self.rows.len())
            .field("total_entries", &self.total_entries)
            .finish_non_exhaustive()
    }
}
