//! Datatable configuration.

use serde::{Deserialize, Serialize};

/// Settings shared by every table view query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatatableConfig {
    /// Page size used when the request does not name one (default: 25).
    #[serde(default = "default_per_page")]
    pub default_per_page: u32,

    /// Upper bound applied to a requested page size (default: 9_999_999).
    #[serde(default = "default_max_per_page")]
    pub max_per_page: u32,

    /// Suffix of the precomputed string field indexed next to each
    /// date/number field (default: `"_for_searching"`).
    #[serde(default = "default_search_field_suffix")]
    pub search_field_suffix: String,

    /// Bucket limit for terms aggregations (default: 10_000).
    #[serde(default = "default_terms_aggregation_size")]
    pub terms_aggregation_size: u32,

    /// Ask the search index for exact hit counts (default: true).
    #[serde(default = "default_true")]
    pub track_total_hits: bool,
}

fn default_per_page() -> u32 {
    25
}

fn default_max_per_page() -> u32 {
    9_999_999
}

fn default_search_field_suffix() -> String {
    "_for_searching".to_string()
}

fn default_terms_aggregation_size() -> u32 {
    10_000
}

fn default_true() -> bool {
    true
}

impl Default for DatatableConfig {
    fn default() -> Self {
        Self {
            default_per_page: default_per_page(),
            max_per_page: default_max_per_page(),
            search_field_suffix: default_search_field_suffix(),
            terms_aggregation_size: default_terms_aggregation_size(),
            track_total_hits: true,
        }
    }
}

impl DatatableConfig {
    /// Returns the name of the string projection used to search `field`.
    pub fn field_name_for_search(&self, field: &str) -> String {
        format!("{}{}", field, self.search_field_suffix)
    }

    /// Clamps a requested page size into `1..=max_per_page`, falling back to
    /// the default when none was requested.
    pub fn effective_per_page(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_per_page)
            .clamp(1, self.max_per_page.max(1))
    }
}
