//! The search index query adapter.
//!
//! [`IndexQuery`] compiles search terms, an order spec and aggregate requests
//! into one Query DSL body, sends it once through a [`SearchIndex`] and
//! freezes the response. Raw [`filter`](IndexQuery::filter) and
//! [`query`](IndexQuery::query) clauses scope the page before `search`.
//! Unfiltered totals are counted over the whole index.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use crate::association::{AssociationResolver, Resolution};
use crate::config::DatatableConfig;
use crate::core::{
    AssociationSource, DatatableQuery, Deobfuscate, ExecutedQuery, NoObfuscation, SearchIndex,
};
use crate::error::{BackendError, DatatableResult, QueryError};
use crate::parse::parse_term;
use crate::registry::ColumnRegistry;
use crate::types::{
    AggregateBuckets, AggregateSpec, ColumnDefinition, ColumnType, CustomOrder, CustomPredicate,
    OrderSpec, PageWindow, Record, SearchTerms,
};

use super::aggregate::{aggregation_body, decode};
use super::predicate::{IndexClause, match_none, sort_clauses, term_clause};
use super::query_builder::IndexQueryBody;

const BACKEND: &str = "search index";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Stage {
    Idle,
    Filtered,
    Ordered,
    Paginated,
}

/// Association reflection for relationship columns on the index.
struct Associations<'a> {
    source: &'a dyn AssociationSource,
    table: String,
}

/// Write phase of a search index table query.
pub struct IndexQuery<'a, I: SearchIndex + ?Sized> {
    index: &'a I,
    registry: &'a ColumnRegistry,
    config: &'a DatatableConfig,
    associations: Option<Associations<'a>>,
    deobfuscator: Option<&'a dyn Deobfuscate>,
    body: IndexQueryBody,
    aggregates: BTreeMap<String, AggregateSpec>,
    stage: Stage,
}

impl<'a, I> IndexQuery<'a, I>
where
    I: SearchIndex + ?Sized,
{
    /// Starts a query over the whole index.
    pub fn new(index: &'a I, registry: &'a ColumnRegistry, config: &'a DatatableConfig) -> Self {
        Self {
            index,
            registry,
            config,
            associations: None,
            deobfuscator: None,
            body: IndexQueryBody::new(config.track_total_hits),
            aggregates: BTreeMap::new(),
            stage: Stage::Idle,
        }
    }

    /// Resolves relationship columns of `table` through `source`.
    pub fn with_associations(
        mut self,
        source: &'a dyn AssociationSource,
        table: impl Into<String>,
    ) -> Self {
        self.associations = Some(Associations {
            source,
            table: table.into(),
        });
        self
    }

    /// Reverses obfuscated identifiers with `deobfuscator`.
    pub fn with_deobfuscator(mut self, deobfuscator: &'a dyn Deobfuscate) -> Self {
        self.deobfuscator = Some(deobfuscator);
        self
    }

    /// The body compiled so far.
    pub fn body(&self) -> &IndexQueryBody {
        &self.body
    }

    /// Adds a raw unscored clause to the page query.
    pub fn filter(mut self, clause: Value) -> DatatableResult<Self> {
        self.scope("filter")?;
        self.body.push_filter(clause);
        Ok(self)
    }

    /// Adds a raw scored clause to the page query.
    pub fn query(mut self, clause: Value) -> DatatableResult<Self> {
        self.scope("query")?;
        self.body.push_query(clause);
        Ok(self)
    }

    /// Registers the aggregate `spec` under `name`.
    ///
    /// Identical specs share one aggregation slot in the body. Registering
    /// another spec under a taken name releases the old slot once no name
    /// refers to it.
    pub fn aggregate(
        mut self,
        name: impl Into<String>,
        spec: AggregateSpec,
    ) -> DatatableResult<Self> {
        let key = spec.key();
        if !self.body.has_aggregation(&key) {
            let body = aggregation_body(&spec, self.config)?;
            self.body.add_aggregation(key, body);
        }

        if let Some(replaced) = self.aggregates.insert(name.into(), spec) {
            let old_key = replaced.key();
            let in_use = self.aggregates.values().any(|s| s.key() == old_key);
            if !in_use {
                self.body.aggregations.remove(&old_key);
            }
        }
        Ok(self)
    }

    fn scope(&self, operation: &str) -> Result<(), QueryError> {
        if self.stage != Stage::Idle {
            return Err(QueryError::contract(
                operation,
                format!("scope changed after {:?} stage", self.stage),
            ));
        }
        Ok(())
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

    fn search_field(&self, field: &str) -> String {
        self.index
            .field_name_for_search(field)
            .unwrap_or_else(|| self.config.field_name_for_search(field))
    }

    /// Builds the clause for one term; `None` means the term is dropped.
    fn clause(&self, column: &ColumnDefinition, raw: &str) -> DatatableResult<Option<IndexClause>> {
        if let Some(strategy) = &column.search_strategy {
            return match strategy.predicate(column, raw) {
                CustomPredicate::Index(clause) => Ok(Some(IndexClause::Filter(clause))),
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
            let Some(associations) = &self.associations else {
                debug!(column = %column.name, "No association source, dropping search term");
                return Ok(None);
            };
            let resolver = AssociationResolver::new(associations.source, &associations.table);
            return Ok(match resolver.resolve(column, raw)? {
                Resolution::Unfiltered => None,
                Resolution::Owners { ids, .. } if ids.is_empty() => {
                    Some(IndexClause::Filter(match_none()))
                }
                Resolution::Owners { key, ids } => Some(IndexClause::Filter(
                    serde_json::json!({ "terms": { key: ids } }),
                )),
            });
        }

        let parsed = match self.deobfuscator {
            Some(deobfuscator) => parse_term(column, raw, deobfuscator),
            None => parse_term(column, raw, &NoObfuscation),
        };
        match parsed {
            Ok(parsed) => {
                let search_field = self.search_field(&column.backend_field);
                Ok(Some(term_clause(column, parsed, raw, &search_field)))
            }
            Err(e) => {
                debug!(column = %column.name, raw, error = %e, "Dropping search term");
                Ok(None)
            }
        }
    }
}

impl<'a, I> DatatableQuery for IndexQuery<'a, I>
where
    I: SearchIndex + ?Sized,
{
    type Executed = ExecutedIndexQuery<'a, I>;

    fn search(mut self, terms: &SearchTerms) -> DatatableResult<Self> {
        self.advance("search", Stage::Filtered)?;

        let registry = self.registry;
        for (column, raw) in registry.resolve_terms(terms) {
            let Some(clause) = self.clause(column, raw)? else {
                continue;
            };
            if let ColumnType::Nested { path } = &column.column_type {
                self.body.push_nested(path, clause.into_value());
                continue;
            }
            match clause {
                IndexClause::Query(value) => self.body.push_query(value),
                IndexClause::Filter(value) => self.body.push_filter(value),
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

        let sort = match &column.order_strategy {
            Some(strategy) => match strategy.order(column, direction) {
                CustomOrder::Index(sort) => sort,
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
            None => sort_clauses(column, direction),
        };

        self.body.sort = sort;
        Ok(self)
    }

    fn paginate(mut self, window: PageWindow) -> DatatableResult<Self> {
        self.advance("paginate", Stage::Paginated)?;
        self.body.from = Some(window.offset());
        self.body.size = Some(u64::from(window.per_page()));
        Ok(self)
    }

    fn execute(self) -> DatatableResult<Self::Executed> {
        let body = self.body.build();
        debug!(body = %body, "Executing search index query");

        let response = self.index.search(&body)?;
        let total_entries = hit_total(&response)?;

        let rows = response
            .get("hits")
            .and_then(|hits| hits.get("hits"))
            .and_then(Value::as_array)
            .map(|hits| {
                hits.iter()
                    .filter_map(|hit| hit.get("_source").and_then(Value::as_object).cloned())
                    .collect()
            })
            .unwrap_or_default();

        let aggregations = response.get("aggregations").cloned().unwrap_or(Value::Null);

        Ok(ExecutedIndexQuery {
            index: self.index,
            rows,
            total_entries,
            aggregations,
            aggregates: self.aggregates,
            unfiltered: RwLock::new(None),
        })
    }
}

/// Reads `hits.total`, either `{ "value": n }` or a bare number.
fn hit_total(response: &Value) -> DatatableResult<u64> {
    let total = response.get("hits").and_then(|hits| hits.get("total"));
    total
        .and_then(|t| t.get("value").and_then(Value::as_u64).or_else(|| t.as_u64()))
        .ok_or_else(|| BackendError::malformed(BACKEND, "response has no hits.total").into())
}

/// Read phase of a search index table query.
pub struct ExecutedIndexQuery<'a, I: SearchIndex + ?Sized> {
    index: &'a I,
    rows: Vec<Record>,
    total_entries: u64,
    aggregations: Value,
    aggregates: BTreeMap<String, AggregateSpec>,
    unfiltered: RwLock<Option<u64>>,
}

impl<I> ExecutedIndexQuery<'_, I>
where
    I: SearchIndex + ?Sized,
{
    /// The raw `aggregations` object of the response.
    pub fn raw_aggregations(&self) -> &Value {
        &self.aggregations
    }
}

impl<I> ExecutedQuery for ExecutedIndexQuery<'_, I>
where
    I: SearchIndex + ?Sized,
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
        let body = IndexQueryBody::unfiltered_count_body();
        debug!(body = %body, "Counting unfiltered search index entries");
        let n = hit_total(&self.index.search(&body)?)?;
        *self.unfiltered.write() = Some(n);
        Ok(n)
    }

    fn aggregate_names(&self) -> Vec<String> {
        self.aggregates.keys().cloned().collect()
    }

    fn aggregate_for(&self, name: &str) -> DatatableResult<Option<AggregateBuckets>> {
        let Some(spec) = self.aggregates.get(name) else {
            return Ok(None);
        };
        let Some(result) = self.aggregations.get(spec.key()) else {
            return Err(BackendError::malformed(
                BACKEND,
                format!("aggregate {} missing from response", name),
            )
            .into());
        };
        decode(spec, result).map(Some)
    }
}

impl<I> std::fmt::Debug for ExecutedIndexQuery<'_, I>
where
    I: SearchIndex + ?Sized,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutedIndexQuery")
            .field("rows", &self.rows.len())
            .field("total_entries", &self.total_entries)
            .field("aggregates", &self.aggregates.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use serde_json::json;

    use super::*;
    use crate::backends::search_index::predicate::clause_field;
    use crate::types::{ColumnOptions, SortDirection};

    /// Records request bodies and replays one canned response.
    struct FakeIndex {
        response: Value,
        bodies: RefCell<Vec<Value>>,
    }

    impl FakeIndex {
        fn new(response: Value) -> Self {
            Self {
                response,
                bodies: RefCell::new(Vec::new()),
            }
        }
    }

    impl SearchIndex for FakeIndex {
        fn search(&self, body: &Value) -> DatatableResult<Value> {
            self.bodies.borrow_mut().push(body.clone());
            Ok(self.response.clone())
        }

        fn field_name_for_search(&self, field: &str) -> Option<String> {
            (field == "opened_on").then(|| "opened_on_text".to_string())
        }
    }

    fn registry() -> ColumnRegistry {
        ColumnRegistry::builder()
            .define("name", ColumnType::String, ColumnOptions::new())
            .unwrap()
            .define("opened_on", ColumnType::Date, ColumnOptions::new())
            .unwrap()
            .define("created_at", ColumnType::Datetime, ColumnOptions::new())
            .unwrap()
            .define(
                "sku",
                ColumnType::Nested {
                    path: "line_items".to_string(),
                },
                ColumnOptions::new(),
            )
            .unwrap()
            .define("comments", ColumnType::OneToMany, ColumnOptions::new())
            .unwrap()
            .build()
    }

    fn response(total: u64) -> Value {
        json!({
            "hits": {
                "total": { "value": total, "relation": "eq" },
                "hits": [
                    { "_id": "1", "_source": { "name": "alpha" } },
                    { "_id": "2", "_source": { "name": "beta" } }
                ]
            },
            "aggregations": {}
        })
    }

    #[test]
    fn test_search_places_clauses() {
        let index = FakeIndex::new(response(2));
        let registry = registry();
        let config = DatatableConfig::default();
        let query = IndexQuery::new(&index, &registry, &config)
            .search(
                &SearchTerms::new()
                    .with("name", "al")
                    .with("opened_on", "2020")
                    .with("created_at", "2021")
                    .with("sku", "ab-1")
                    .with("comments", "3"),
            )
            .unwrap();

        let body = query.body();
        assert_eq!(body.query.len(), 3);
        assert_eq!(
            body.query[1],
            json!({ "wildcard": { "opened_on_text": { "value": "*2020*" } } })
        );
        assert_eq!(
            body.query[2],
            json!({ "wildcard": { "created_at_for_searching": { "value": "*2021*" } } })
        );
        assert_eq!(body.nested["line_items"].len(), 1);
        // No association source: the relationship term is dropped
        assert!(body.filter.is_empty());
    }

    #[test]
    fn test_execute_reads_hits() {
        let index = FakeIndex::new(response(42));
        let registry = registry();
        let config = DatatableConfig::default();
        let executed = IndexQuery::new(&index, &registry, &config)
            .order(Some(&OrderSpec::new("name", SortDirection::Asc)))
            .unwrap()
            .paginate(PageWindow::new(3, 10))
            .unwrap()
            .execute()
            .unwrap();

        assert_eq!(executed.total_entries(), 42);
        assert_eq!(executed.rows().len(), 2);
        assert_eq!(executed.rows()[0]["name"], "alpha");

        let sent = &index.bodies.borrow()[0];
        assert_eq!(sent["from"], 20);
        assert_eq!(sent["size"], 10);
        assert_eq!(sent["sort"][0]["name"]["missing"], "_last");
    }

    #[test]
    fn test_unfiltered_count_ignores_scope_and_terms() {
        let index = FakeIndex::new(response(7));
        let registry = registry();
        let config = DatatableConfig::default();
        let executed = IndexQuery::new(&index, &registry, &config)
            .filter(json!({ "term": { "account_id": 3 } }))
            .unwrap()
            .search(&SearchTerms::new().with("name", "zzz"))
            .unwrap()
            .execute()
            .unwrap();

        assert_eq!(executed.unfiltered_total_entries().unwrap(), 7);
        assert_eq!(executed.unfiltered_total_entries().unwrap(), 7);

        let bodies = index.bodies.borrow();
        assert_eq!(bodies.len(), 2);
        assert_eq!(bodies[1], json!({ "size": 0, "track_total_hits": true }));
    }

    #[test]
    fn test_scope_after_search_is_rejected() {
        let index = FakeIndex::new(response(0));
        let registry = registry();
        let config = DatatableConfig::default();
        let result = IndexQuery::new(&index, &registry, &config)
            .search(&SearchTerms::new())
            .unwrap()
            .filter(json!({ "term": { "a": 1 } }));
        assert!(result.is_err());
    }

    #[test]
    fn test_identical_aggregates_share_a_slot() {
        let index = FakeIndex::new(response(0));
        let registry = registry();
        let config = DatatableConfig::default();
        let query = IndexQuery::new(&index, &registry, &config)
            .aggregate("by_status", AggregateSpec::terms_count("status"))
            .unwrap()
            .aggregate("status_again", AggregateSpec::terms_count("status"))
            .unwrap();

        assert_eq!(query.body().aggregations.len(), 1);
        assert_eq!(query.aggregates.len(), 2);
    }

    #[test]
    fn test_reregistered_name_releases_unused_slot() {
        let index = FakeIndex::new(response(0));
        let registry = registry();
        let config = DatatableConfig::default();
        let by_status = AggregateSpec::terms_count("status");
        let by_region = AggregateSpec::terms_count("region");

        let query = IndexQuery::new(&index, &registry, &config)
            .aggregate("shared", by_status.clone())
            .unwrap()
            .aggregate("breakdown", by_status.clone())
            .unwrap()
            .aggregate("breakdown", by_region.clone())
            .unwrap();
        // "shared" still uses the status slot
        assert!(query.body().has_aggregation(&by_status.key()));
        assert!(query.body().has_aggregation(&by_region.key()));

        let query = query.aggregate("shared", by_region.clone()).unwrap();
        assert!(!query.body().has_aggregation(&by_status.key()));
        assert_eq!(query.body().aggregations.len(), 1);
    }

    #[test]
    fn test_sql_strategy_is_a_contract_violation() {
        let index = FakeIndex::new(response(0));
        let strategy = |_: &ColumnDefinition, _: &str| {
            CustomPredicate::Sql(crate::backends::sql::SqlFragment::new("1 = 1"))
        };
        let registry = ColumnRegistry::builder()
            .define(
                "name",
                ColumnType::String,
                ColumnOptions::new().with_search_strategy(std::sync::Arc::new(strategy)),
            )
            .unwrap()
            .build();
        let config = DatatableConfig::default();

        let result =
            IndexQuery::new(&index, &registry, &config).search(&SearchTerms::new().with("name", "a"));
        assert!(matches!(
            result,
            Err(crate::error::DatatableError::Query(
                QueryError::AdapterContractViolation { .. }
            ))
        ));
    }

    #[test]
    fn test_missing_total_is_malformed() {
        let index = FakeIndex::new(json!({ "hits": { "hits": [] } }));
        let registry = registry();
        let config = DatatableConfig::default();
        assert!(IndexQuery::new(&index, &registry, &config).execute().is_err());
    }

    #[test]
    fn test_nested_column_field() {
        let column = registry().lookup("sku").cloned().unwrap();
        assert_eq!(clause_field(&column), "line_items.sku");
    }
}
