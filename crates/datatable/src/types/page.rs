//! Result page returned to the rendering layer.

use std::collections::BTreeMap;

use serde::Serialize;

use super::Record;
use super::aggregate::AggregateBuckets;

/// One executed page of a table view.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResultPage {
    /// Rows of the requested page.
    pub rows: Vec<Record>,

    /// Rows matching every applied search term.
    pub total_entries: u64,

    /// Rows in the collection before any search term was applied.
    pub unfiltered_total_entries: u64,

    /// Decoded aggregates by registered name.
    pub aggregates: BTreeMap<String, AggregateBuckets>,
}

impl ResultPage {
    /// Number of pages needed for `total_entries` at `per_page` rows each.
    pub fn total_pages(&self, per_page: u32) -> u64 {
        let per_page = u64::from(per_page.max(1));
        self.total_entries.div_ceil(per_page)
    }

    /// Returns true when the page holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
