//! Search index Query DSL body under construction.
//!
//! Clauses are collected in separate groups and only assembled into one JSON
//! body by [`IndexQueryBody::build`]:
//!
//! ```json
//! {
//!   "query": { "bool": {
//!     "must":   [{ "match_all": {} }, ...scored clauses],
//!     "filter": [...filters, { "nested": { "path": "...", "query": ... } }]
//!   } },
//!   "sort": [...], "aggs": { "<key>": ... },
//!   "from": 0, "size": 25, "track_total_hits": true
//! }
//! ```

use std::collections::BTreeMap;

use serde_json::{Map, Value, json};

/// A search body split into its clause groups.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexQueryBody {
    /// Scored clauses (`bool.must`), after the leading `match_all`.
    pub query: Vec<Value>,
    /// Unscored clauses (`bool.filter`).
    pub filter: Vec<Value>,
    /// Nested path to the clauses scoped to it.
    pub nested: BTreeMap<String, Vec<Value>>,
    /// Sort clauses, in priority order.
    pub sort: Vec<Value>,
    /// Aggregation key to aggregation body.
    pub aggregations: BTreeMap<String, Value>,
    /// Number of hits skipped.
    pub from: Option<u64>,
    /// Number of hits returned.
    pub size: Option<u64>,
    /// Whether exact hit totals are requested.
    pub track_total_hits: bool,
}

impl IndexQueryBody {
    /// Creates an empty body.
    pub fn new(track_total_hits: bool) -> Self {
        Self {
            track_total_hits,
            ..Default::default()
        }
    }

    /// Adds a scored clause.
    pub fn push_query(&mut self, clause: Value) {
        self.query.push(clause);
    }

    /// Adds an unscored filter clause.
    pub fn push_filter(&mut self, clause: Value) {
        self.filter.push(clause);
    }

    /// Adds a clause to the nested group for `path`, creating the group on first use.
    pub fn push_nested(&mut self, path: &str, clause: Value) {
        self.nested.entry(path.to_string()).or_default().push(clause);
    }

    /// Registers an aggregation under `key`.
    ///
    /// Returns false when the key is already registered; the existing body is kept.
    pub fn add_aggregation(&mut self, key: String, body: Value) -> bool {
        if self.aggregations.contains_key(&key) {
            return false;
        }
        self.aggregations.insert(key, body);
        true
    }

    /// Returns true if an aggregation is registered under `key`.
    pub fn has_aggregation(&self, key: &str) -> bool {
        self.aggregations.contains_key(key)
    }

    /// The `bool` query holding every clause group.
    pub fn bool_query(&self) -> Value {
        let mut must = Vec::with_capacity(self.query.len() + 1);
        must.push(json!({ "match_all": {} }));
        must.extend(self.query.iter().cloned());

        let mut filter = self.filter.clone();
        for (path, clauses) in &self.nested {
            filter.push(json!({
                "nested": {
                    "path": path,
                    "query": { "bool": { "must": clauses } }
                }
            }));
        }

        json!({ "bool": { "must": must, "filter": filter } })
    }

    /// Assembles the complete search body.
    pub fn build(&self) -> Value {
        let mut body = Map::new();
        body.insert("query".to_string(), self.bool_query());

        if !self.sort.is_empty() {
            body.insert("sort".to_string(), Value::Array(self.sort.clone()));
        }
        if !self.aggregations.is_empty() {
            let aggs: Map<String, Value> = self
                .aggregations
                .iter()
                .map(|(key, agg)| (key.clone(), agg.clone()))
                .collect();
            body.insert("aggs".to_string(), Value::Object(aggs));
        }
        if let Some(from) = self.from {
            body.insert("from".to_string(), json!(from));
        }
        if let Some(size) = self.size {
            body.insert("size".to_string(), json!(size));
        }
        body.insert("track_total_hits".to_string(), json!(self.track_total_hits));

        Value::Object(body)
    }

    /// A body that returns no hits, only the exact total of the whole index.
    pub fn unfiltered_count_body() -> Value {
        json!({ "size": 0, "track_total_hits": true })
    }
}
