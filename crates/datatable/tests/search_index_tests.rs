//! Search index adapter tests against a recording index.
//!
//! Run with: `cargo test -p helios-datatable --test search_index_tests`

mod common;

use std::cell::RefCell;
use std::collections::VecDeque;

use serde_json::{Value, json};

use helios_datatable::backends::search_index::IndexQuery;
use helios_datatable::core::{DatatableQuery, ExecutedQuery, SearchIndex};
use helios_datatable::error::{BackendError, DatatableError, DatatableResult, QueryError};
use helios_datatable::registry::ColumnRegistry;
use helios_datatable::types::{
    AggregateKind, AggregateOptions, AggregateSpec, ColumnOptions, ColumnType, DatatableRequest,
    OrderSpec, PageWindow, SearchOptions, SearchTerms,
};
use helios_datatable::{DatatableConfig, run};

use common::*;

// ============================================================================
// Recording Index
// ============================================================================

/// Replays queued responses in order and records every request body.
#[derive(Default)]
struct RecordingIndex {
    responses: RefCell<VecDeque<Value>>,
    bodies: RefCell<Vec<Value>>,
}

impl RecordingIndex {
    fn replying(responses: impl IntoIterator<Item = Value>) -> Self {
        Self {
            responses: RefCell::new(responses.into_iter().collect()),
            bodies: RefCell::new(Vec::new()),
        }
    }

    fn bodies(&self) -> Vec<Value> {
        self.bodies.borrow().clone()
    }

    fn last_body(&self) -> Value {
        self.bodies.borrow().last().cloned().unwrap_or(Value::Null)
    }
}

impl SearchIndex for RecordingIndex {
    fn search(&self, body: &Value) -> DatatableResult<Value> {
        self.bodies.borrow_mut().push(body.clone());
        Ok(self
            .responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| hits(0, &[])))
    }
}

fn hits(total: u64, ids: &[i64]) -> Value {
    let docs: Vec<Value> = ids
        .iter()
        .map(|id| json!({ "_id": id.to_string(), "_source": { "id": id, "title": format!("Post {:02}", id) } }))
        .collect();
    json!({ "hits": { "total": { "value": total, "relation": "eq" }, "hits": docs } })
}

fn filters(body: &Value) -> Vec<Value> {
    body["query"]["bool"]["filter"]
        .as_array()
        .cloned()
        .unwrap_or_default()
}

fn musts(body: &Value) -> Vec<Value> {
    body["query"]["bool"]["must"]
        .as_array()
        .cloned()
        .unwrap_or_default()
}

fn searched_body(index: &RecordingIndex, registry: &ColumnRegistry, terms: SearchTerms) -> Value {
    let config = DatatableConfig::default();
    IndexQuery::new(index, registry, &config)
        .search(&terms)
        .unwrap()
        .execute()
        .unwrap();
    index.last_body()
}

// ============================================================================
// Body Compilation
// ============================================================================

#[test]
fn test_run_compiles_one_body() {
    let index = RecordingIndex::replying([hits(42, &[11, 12])]);
    let registry = posts_registry();
    let request: DatatableRequest = serde_json::from_str(
        r#"{
            "search_terms": {
                "title": "Post 1",
                "status": "Open",
                "price": "$3",
                "published_on": "2020-05"
            },
            "order": {"column": "score", "direction": "desc"},
            "page": 2,
            "per_page": 10
        }"#,
    )
    .unwrap();

    let page = run(
        IndexQuery::new(&index, &registry, &DatatableConfig::default()),
        &request,
        &DatatableConfig::default(),
    );

    // The page search is sent first, the unfiltered count second
    let bodies = index.bodies();
    let body = &bodies[0];

    let must = musts(body);
    assert_eq!(must[0], json!({ "match_all": {} }));
    assert!(must.contains(&json!({ "wildcard": { "status": { "value": "*open*" } } })));
    assert!(must.contains(&json!({ "wildcard": {
        "published_on_for_searching": { "value": "*2020-05*" }
    } })));
    assert!(must.contains(&json!({ "bool": { "must": [
        { "wildcard": { "title": { "value": "*post*" } } },
        { "wildcard": { "title": { "value": "*1*" } } }
    ] } })));

    assert_eq!(filters(body), vec![json!({ "term": { "price_cents": 300 } })]);
    assert_eq!(
        body["sort"],
        json!([{ "score": { "order": "desc", "missing": "_last" } }])
    );
    assert_eq!(body["from"], 10);
    assert_eq!(body["size"], 10);
    assert_eq!(body["track_total_hits"], true);

    // The count request got the default empty response
    let page = page.unwrap();
    assert_eq!(page.total_entries, 42);
    assert_eq!(page.unfiltered_total_entries, 0);
    assert_eq!(page.rows.len(), 2);
    assert_eq!(page.rows[0]["title"], Value::from("Post 11"));
}

#[test]
fn test_typed_terms_become_filters() {
    let index = RecordingIndex::default();
    let registry = posts_registry();

    let body = searched_body(
        &index,
        &registry,
        SearchTerms::new()
            .with("published", "yes")
            .with("created_year", "2021")
            .with("owner", "User_2")
            .with("nickname", "nil"),
    );

    let filter = filters(&body);
    assert_eq!(filter.len(), 4);
    assert!(filter.contains(&json!({ "term": { "published": true } })));
    assert!(filter.contains(&json!({ "range": { "created_at": {
        "gte": "2021||/y",
        "lte": "2021||/y",
        "format": "yyyy"
    } } })));
    assert!(filter.contains(&json!({ "bool": { "must": [
        { "term": { "owner_id": 2 } },
        { "term": { "owner_type": "User" } }
    ] } })));
    assert!(filter.contains(&json!({ "bool": {
        "should": [
            { "term": { "nickname": "" } },
            { "bool": { "must_not": [{ "exists": { "field": "nickname" } }] } }
        ],
        "minimum_should_match": 1
    } })));
}

#[test]
fn test_malformed_date_is_dropped() {
    let index = RecordingIndex::default();
    let registry = posts_registry();

    let body = searched_body(
        &index,
        &registry,
        SearchTerms::new().with("created_at", "yesterday"),
    );
    assert_eq!(musts(&body), vec![json!({ "match_all": {} })]);
    assert!(filters(&body).is_empty());
}

#[test]
fn test_underscore_is_a_literal_in_wildcards() {
    let index = RecordingIndex::default();
    let registry = posts_registry();

    let body = searched_body(&index, &registry, SearchTerms::new().with("title", "a_b 100% x*y"));
    assert_eq!(
        musts(&body),
        vec![
            json!({ "match_all": {} }),
            json!({ "bool": { "must": [
                { "wildcard": { "title": { "value": "*a_b*" } } },
                { "wildcard": { "title": { "value": "*100%*" } } },
                { "wildcard": { "title": { "value": "*x\\*y*" } } }
            ] } }),
        ]
    );
}

#[test]
fn test_obfuscated_id() {
    let index = RecordingIndex::default();
    let registry = posts_registry();
    let config = DatatableConfig::default();
    let terms = SearchTerms::new().with("id", "p-7");

    IndexQuery::new(&index, &registry, &config)
        .with_deobfuscator(&deobfuscate)
        .search(&terms)
        .unwrap()
        .execute()
        .unwrap();
    assert_eq!(filters(&index.last_body()), vec![json!({ "term": { "id": 7 } })]);

    // Without a deobfuscator no token can be reversed
    let body = searched_body(&index, &registry, terms);
    assert_eq!(
        filters(&body),
        vec![json!({ "bool": { "must_not": [{ "match_all": {} }] } })]
    );
}

#[test]
fn test_nested_terms_share_one_nested_clause() {
    let index = RecordingIndex::default();
    let nested = || ColumnType::Nested {
        path: "line_items".to_string(),
    };
    let registry = ColumnRegistry::builder()
        .define(
            "sku",
            nested(),
            ColumnOptions::new().with_search(SearchOptions::exact()),
        )
        .unwrap()
        .define(
            "line_items.quantity",
            nested(),
            ColumnOptions::new().with_search(SearchOptions::exact()),
        )
        .unwrap()
        .build();

    let body = searched_body(
        &index,
        &registry,
        SearchTerms::new()
            .with("sku", "AB-1")
            .with("line_items.quantity", "2"),
    );

    assert_eq!(
        filters(&body),
        vec![json!({ "nested": {
            "path": "line_items",
            "query": { "bool": { "must": [
                { "term": { "line_items.sku": "ab-1" } },
                { "term": { "line_items.quantity": "2" } }
            ] } }
        } })]
    );
}

#[test]
fn test_order_after_paginate_is_rejected() {
    let index = RecordingIndex::default();
    let registry = posts_registry();
    let config = DatatableConfig::default();

    let result = IndexQuery::new(&index, &registry, &config)
        .paginate(PageWindow::new(1, 10))
        .unwrap()
        .order(Some(&OrderSpec::asc("title")));
    assert!(matches!(
        result,
        Err(DatatableError::Query(QueryError::AdapterContractViolation { .. }))
    ));
}

#[test]
fn test_polymorphic_sort_is_type_then_id() {
    let index = RecordingIndex::default();
    let registry = posts_registry();
    let config = DatatableConfig::default();

    let query = IndexQuery::new(&index, &registry, &config)
        .order(Some(&OrderSpec::asc("owner")))
        .unwrap();
    assert_eq!(
        query.body().sort,
        vec![
            json!({ "owner_type": { "order": "asc", "missing": "_last" } }),
            json!({ "owner_id": { "order": "asc", "missing": "_last" } }),
        ]
    );
}

// ============================================================================
// Counts
// ============================================================================

#[test]
fn test_unfiltered_count_is_memoized_and_unscoped() {
    let index = RecordingIndex::replying([hits(3, &[1, 2, 3]), hits(25, &[])]);
    let registry = posts_registry();
    let config = DatatableConfig::default();
    let scope = json!({ "term": { "status": "open" } });

    let executed = IndexQuery::new(&index, &registry, &config)
        .filter(scope)
        .unwrap()
        .search(&SearchTerms::new().with("score", "3"))
        .unwrap()
        .execute()
        .unwrap();

    assert_eq!(executed.total_entries(), 3);
    assert_eq!(executed.unfiltered_total_entries().unwrap(), 25);
    assert_eq!(executed.unfiltered_total_entries().unwrap(), 25);

    let bodies = index.bodies();
    assert_eq!(bodies.len(), 2);
    assert_eq!(filters(&bodies[0]).len(), 2);
    assert_eq!(bodies[1], json!({ "size": 0, "track_total_hits": true }));
}

// ============================================================================
// Aggregates
// ============================================================================

#[test]
fn test_aggregates_share_slots_and_decode() {
    let by_status = AggregateSpec::terms_count("status");
    let paid_by_month = AggregateSpec::new(
        "published_on",
        AggregateKind::DateHistogramSumWithFilter,
        AggregateOptions::new()
            .with_filter("published", true)
            .with_sum_over("price_cents"),
    );

    let mut response = hits(25, &[]);
    response["aggregations"] = json!({
        by_status.key(): { "buckets": [
            { "key": "open", "doc_count": 13 },
            { "key": "closed", "doc_count": 12 }
        ] },
        paid_by_month.key(): { "doc_count": 2, "buckets": { "buckets": [
            { "key_as_string": "2020-02", "doc_count": 1, "sum": { "value": 200.0 } },
            { "key_as_string": "2020-04", "doc_count": 1, "sum": { "value": 400.0 } }
        ] } }
    });

    let index = RecordingIndex::replying([response, hits(25, &[])]);
    let registry = posts_registry();
    let config = DatatableConfig::default();

    let page = IndexQuery::new(&index, &registry, &config)
        .aggregate("status_counts", by_status.clone())
        .unwrap()
        .aggregate("statuses", by_status.clone())
        .unwrap()
        .aggregate("paid_by_month", paid_by_month.clone())
        .unwrap()
        .execute()
        .unwrap()
        .into_page()
        .unwrap();

    let body = &index.bodies()[0];
    let aggs = body["aggs"].as_object().unwrap();
    assert_eq!(aggs.len(), 2);
    assert_eq!(
        aggs[&paid_by_month.key()]["filter"],
        json!({ "term": { "published": true } })
    );

    assert_eq!(page.aggregates.len(), 3);
    assert_eq!(page.aggregates["status_counts"], page.aggregates["statuses"]);
    let counts = page.aggregates["statuses"].as_counts().unwrap();
    assert_eq!(counts["open"], 13);
    assert_eq!(counts["closed"], 12);
    let sums = page.aggregates["paid_by_month"].as_sums().unwrap();
    assert_eq!(sums["2020-04"], 400.0);
}

#[test]
fn test_missing_aggregation_result_is_malformed() {
    let index = RecordingIndex::replying([hits(0, &[])]);
    let registry = posts_registry();
    let config = DatatableConfig::default();

    let executed = IndexQuery::new(&index, &registry, &config)
        .aggregate("statuses", AggregateSpec::terms_count("status"))
        .unwrap()
        .execute()
        .unwrap();

    assert_eq!(executed.aggregate_names(), vec!["statuses".to_string()]);
    assert!(matches!(
        executed.aggregate_for("statuses"),
        Err(DatatableError::Backend(BackendError::MalformedResponse { .. }))
    ));
    assert!(executed.aggregate_for("unknown").unwrap().is_none());
}

// ============================================================================
// Associations
// ============================================================================

#[test]
fn test_association_without_source_is_dropped() {
    let index = RecordingIndex::default();
    let registry = posts_registry();

    let body = searched_body(&index, &registry, SearchTerms::new().with("comments", "1,2"));
    assert!(filters(&body).is_empty());
}

#[cfg(feature = "sqlite")]
mod associations {
    use super::*;

    fn association_filters(raw_terms: SearchTerms) -> Vec<Value> {
        let store = create_store();
        let index = RecordingIndex::default();
        let registry = posts_registry();
        let config = DatatableConfig::default();

        IndexQuery::new(&index, &registry, &config)
            .with_associations(&store, "posts")
            .search(&raw_terms)
            .unwrap()
            .execute()
            .unwrap();
        filters(&index.last_body())
    }

    #[test]
    fn test_id_list_becomes_owner_terms() {
        assert_eq!(
            association_filters(SearchTerms::new().with("comments", "1,2")),
            vec![json!({ "terms": { "id": [1, 2] } })]
        );
    }

    #[test]
    fn test_text_search_through_join_table() {
        assert_eq!(
            association_filters(SearchTerms::new().with("tags", "rust")),
            vec![json!({ "terms": { "id": [4, 5] } })]
        );
    }

    #[test]
    fn test_unmatched_association_matches_nothing() {
        assert_eq!(
            association_filters(SearchTerms::new().with("comment_authors", "zed")),
            vec![json!({ "bool": { "must_not": [{ "match_all": {} }] } })]
        );
    }

    #[test]
    fn test_empty_id_list_is_unfiltered() {
        assert!(association_filters(SearchTerms::new().with("comments", "none")).is_empty());
    }
}
