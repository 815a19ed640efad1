//! Aggregation bodies and bucket decoding.
//!
//! Every [`AggregateSpec`] is compiled into one aggregation registered under
//! its [`key`](AggregateSpec::key). Filtered shapes wrap their buckets in a
//! `filter` aggregation whose single child is named `buckets`:
//!
//! ```json
//! { "filter": { "term": { "status": "paid" } },
//!   "aggs": { "buckets": {
//!     "terms": { "field": "region", "size": 10000 },
//!     "aggs": { "sum": { "sum": { "field": "total" } } }
//!   } } }
//! ```

use std::collections::BTreeMap;

use serde_json::{Map, Value, json};

use crate::config::DatatableConfig;
use crate::error::{BackendError, DatatableResult, QueryError};
use crate::types::{AggregateBuckets, AggregateKind, AggregateSpec};

const BACKEND: &str = "search index";
const BUCKETS: &str = "buckets";
const SUM: &str = "sum";
const DEFAULT_INTERVAL: &str = "month";

/// Compiles `spec` into an aggregation body.
///
/// # Errors
///
/// Returns [`QueryError::AdapterContractViolation`] when the spec lacks an
/// option its kind requires (a sum field, or a raw body).
pub fn aggregation_body(
    spec: &AggregateSpec,
    config: &DatatableConfig,
) -> Result<Value, QueryError> {
    let options = &spec.options;

    match spec.kind {
        AggregateKind::TermsCount => Ok(terms(spec, config)),
        AggregateKind::DateHistogramCount => Ok(date_histogram(spec)),
        AggregateKind::DateHistogramSumWithFilter => {
            let field = single_sum_field(spec)?;
            Ok(filtered(spec, with_sums(date_histogram(spec), &[(SUM, field)])))
        }
        AggregateKind::FilteredTermsSum => {
            let field = single_sum_field(spec)?;
            Ok(filtered(spec, with_sums(terms(spec, config), &[(SUM, field)])))
        }
        AggregateKind::FilteredTermsMultiSum => {
            if options.sum_over.is_empty() {
                return Err(missing_option(spec, "sum_over"));
            }
            let names: Vec<String> = options
                .sum_over
                .iter()
                .map(|field| format!("sum_{}", field))
                .collect();
            let sums: Vec<(&str, &str)> = names
                .iter()
                .zip(&options.sum_over)
                .map(|(name, field)| (name.as_str(), field.as_str()))
                .collect();
            Ok(filtered(spec, with_sums(terms(spec, config), &sums)))
        }
        AggregateKind::Raw => options
            .body
            .clone()
            .ok_or_else(|| missing_option(spec, "body")),
    }
}

fn missing_option(spec: &AggregateSpec, option: &str) -> QueryError {
    QueryError::contract(
        "aggregate",
        format!("{} aggregate on {} requires {}", spec.kind, spec.field, option),
    )
}

fn single_sum_field(spec: &AggregateSpec) -> Result<&str, QueryError> {
    spec.options
        .sum_over
        .first()
        .map(String::as_str)
        .ok_or_else(|| missing_option(spec, "sum_over"))
}

fn terms(spec: &AggregateSpec, config: &DatatableConfig) -> Value {
    let size = spec.options.size.unwrap_or(config.terms_aggregation_size);
    json!({ "terms": { "field": spec.field, "size": size } })
}

fn date_histogram(spec: &AggregateSpec) -> Value {
    let interval = spec.options.interval.as_deref().unwrap_or(DEFAULT_INTERVAL);
    let mut histogram = json!({ "field": spec.field, "calendar_interval": interval });
    if let Some(format) = &spec.options.format {
        histogram["format"] = json!(format);
    }
    json!({ "date_histogram": histogram })
}

fn with_sums(mut bucket: Value, sums: &[(&str, &str)]) -> Value {
    let aggs: Map<String, Value> = sums
        .iter()
        .map(|(name, field)| (name.to_string(), json!({ "sum": { "field": field } })))
        .collect();
    bucket["aggs"] = Value::Object(aggs);
    bucket
}

/// Wraps `inner` in the spec's term filter, or an existence filter on the field.
fn filtered(spec: &AggregateSpec, inner: Value) -> Value {
    let mut clauses: Vec<Value> = spec
        .options
        .filter
        .iter()
        .flatten()
        .map(|(field, value)| json!({ "term": { field: value } }))
        .collect();

    let filter = match clauses.len() {
        0 => json!({ "exists": { "field": spec.field } }),
        1 => clauses.remove(0),
        _ => json!({ "bool": { "must": clauses } }),
    };
    json!({ "filter": filter, "aggs": { BUCKETS: inner } })
}

/// Decodes the response sub-tree of one aggregation.
///
/// # Errors
///
/// Returns [`BackendError::MalformedResponse`] when the sub-tree lacks the
/// buckets its kind produces.
pub fn decode(spec: &AggregateSpec, result: &Value) -> DatatableResult<AggregateBuckets> {
    match spec.kind {
        AggregateKind::Raw => Ok(AggregateBuckets::Raw(result.clone())),
        AggregateKind::TermsCount | AggregateKind::DateHistogramCount => {
            let mut counts = BTreeMap::new();
            for bucket in buckets(spec, result)? {
                let count = bucket.get("doc_count").and_then(Value::as_u64).unwrap_or(0);
                counts.insert(bucket_key(bucket), count);
            }
            Ok(AggregateBuckets::Counts(counts))
        }
        AggregateKind::DateHistogramSumWithFilter | AggregateKind::FilteredTermsSum => {
            let mut sums = BTreeMap::new();
            for bucket in buckets(spec, &result[BUCKETS])? {
                sums.insert(bucket_key(bucket), sum_value(bucket, SUM));
            }
            Ok(AggregateBuckets::Sums(sums))
        }
        AggregateKind::FilteredTermsMultiSum => {
            let mut sums = BTreeMap::new();
            for bucket in buckets(spec, &result[BUCKETS])? {
                let per_field = spec
                    .options
                    .sum_over
                    .iter()
                    .map(|field| {
                        let value = sum_value(bucket, &format!("sum_{}", field));
                        (field.clone(), value)
                    })
                    .collect();
                sums.insert(bucket_key(bucket), per_field);
            }
            Ok(AggregateBuckets::MultiSums(sums))
        }
    }
}

fn buckets<'v>(spec: &AggregateSpec, result: &'v Value) -> DatatableResult<&'v Vec<Value>> {
    result
        .get(BUCKETS)
        .and_then(Value::as_array)
        .ok_or_else(|| {
            BackendError::malformed(
                BACKEND,
                format!("{} aggregate on {} returned no buckets", spec.kind, spec.field),
            )
            .into()
        })
}

/// Date buckets are keyed by their formatted date, all others by their raw key.
fn bucket_key(bucket: &Value) -> String {
    if let Some(formatted) = bucket.get("key_as_string").and_then(Value::as_str) {
        return formatted.to_string();
    }
    match bucket.get("key") {
        Some(Value::String(key)) => key.clone(),
        Some(key) => key.to_string(),
        None => String::new(),
    }
}

fn sum_value(bucket: &Value, name: &str) -> f64 {
    bucket
        .get(name)
        .and_then(|sum| sum.get("value"))
        .and_then(Value::as_f64)
        .unwrap_or(0.0)
}
