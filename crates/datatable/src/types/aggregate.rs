//! Aggregate requests and their decoded buckets.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// The shape of an aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateKind {
    /// Document count per distinct field value.
    TermsCount,
    /// Document count per date interval.
    DateHistogramCount,
    /// Sum of a second field per date interval, behind an optional filter.
    DateHistogramSumWithFilter,
    /// Sum of a second field per distinct value, behind an optional filter.
    FilteredTermsSum,
    /// Sums of several fields per distinct value, behind an optional filter.
    FilteredTermsMultiSum,
    /// Caller-supplied aggregation body, returned undecoded.
    Raw,
}

impl AggregateKind {
    /// Returns the snake_case kind name.
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateKind::TermsCount => "terms_count",
            AggregateKind::DateHistogramCount => "date_histogram_count",
            AggregateKind::DateHistogramSumWithFilter => "date_histogram_sum_with_filter",
            AggregateKind::FilteredTermsSum => "filtered_terms_sum",
            AggregateKind::FilteredTermsMultiSum => "filtered_terms_multi_sum",
            AggregateKind::Raw => "raw",
        }
    }
}

impl fmt::Display for AggregateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options of an aggregate; which ones apply depends on the kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateOptions {
    /// Calendar interval for date histograms (e.g. `"month"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,

    /// Date format of histogram bucket keys.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// Term filter (`field -> value`) wrapping the buckets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Map<String, Value>>,

    /// Field(s) summed inside each bucket.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sum_over: Vec<String>,

    /// Maximum number of term buckets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,

    /// Raw aggregation body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl AggregateOptions {
    /// Creates empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the histogram interval.
    pub fn with_interval(mut self, interval: impl Into<String>) -> Self {
        self.interval = Some(interval.into());
        self
    }

    /// Sets the histogram key format.
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Adds a term filter entry.
    pub fn with_filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter
            .get_or_insert_with(Map::new)
            .insert(field.into(), value.into());
        self
    }

    /// Adds a summed field.
    pub fn with_sum_over(mut self, field: impl Into<String>) -> Self {
        self.sum_over.push(field.into());
        self
    }

    /// Sets the bucket limit.
    pub fn with_size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    /// Sets the raw body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// A requested aggregation over one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateSpec {
    /// The bucketed (or histogrammed) field.
    pub field: String,
    /// Aggregation shape.
    pub kind: AggregateKind,
    /// Shape-specific options.
    #[serde(default)]
    pub options: AggregateOptions,
}

impl AggregateSpec {
    /// Creates an aggregate spec.
    pub fn new(field: impl Into<String>, kind: AggregateKind, options: AggregateOptions) -> Self {
        Self {
            field: field.into(),
            kind,
            options,
        }
    }

    /// Document count per distinct value of `field`.
    pub fn terms_count(field: impl Into<String>) -> Self {
        Self::new(field, AggregateKind::TermsCount, AggregateOptions::default())
    }

    /// Document count per `interval` of `field`.
    pub fn date_histogram_count(field: impl Into<String>, interval: impl Into<String>) -> Self {
        Self::new(
            field,
            AggregateKind::DateHistogramCount,
            AggregateOptions::new().with_interval(interval),
        )
    }

    /// Stable key of the aggregation slot.
    ///
    /// Identical `(field, kind, options)` always produce the same key, so
    /// registering the same aggregate twice shares one slot.
    pub fn key(&self) -> String {
        let options = serde_json::to_string(&self.options).unwrap_or_default();
        let material = format!("{}_{}_{}", self.field, self.kind, options);

        Sha256::digest(material.as_bytes())
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }
}

/// Decoded aggregation result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AggregateBuckets {
    /// Bucket key to document count.
    Counts(BTreeMap<String, u64>),
    /// Bucket key to summed value.
    Sums(BTreeMap<String, f64>),
    /// Bucket key to per-field sums.
    MultiSums(BTreeMap<String, BTreeMap<String, f64>>),
    /// Undecoded response sub-tree.
    Raw(Value),
}

impl AggregateBuckets {
    /// Returns the counts map, if this is a count aggregation.
    pub fn as_counts(&self) -> Option<&BTreeMap<String, u64>> {
        match self {
            AggregateBuckets::Counts(counts) => Some(counts),
            _ => None,
        }
    }

    /// Returns the sums map, if this is a single-sum aggregation.
    pub fn as_sums(&self) -> Option<&BTreeMap<String, f64>> {
        match self {
            AggregateBuckets::Sums(sums) => Some(sums),
            _ => None,
        }
    }

    /// Returns the per-field sums map, if this is a multi-sum aggregation.
    pub fn as_multi_sums(&self) -> Option<&BTreeMap<String, BTreeMap<String, f64>>> {
        match self {
            AggregateBuckets::MultiSums(sums) => Some(sums),
            _ => None,
        }
    }
}
