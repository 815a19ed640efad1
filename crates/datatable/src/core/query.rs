//! The caller-facing query traits shared by both adapters.
//!
//! A query is built in a write phase ([`DatatableQuery`]) and consumed by
//! [`DatatableQuery::execute`], which hands back a read-only
//! [`ExecutedQuery`]. Because execution takes the builder by value, no
//! predicate can be added to a query that has already run.

use std::collections::BTreeMap;

use crate::config::DatatableConfig;
use crate::error::DatatableResult;
use crate::types::{
    AggregateBuckets, DatatableRequest, OrderSpec, PageWindow, Record, ResultPage, SearchTerms,
};

/// Write phase of a table-view query.
pub trait DatatableQuery: Sized {
    /// The frozen, executed form of this query.
    type Executed: ExecutedQuery;

    /// Conjoins one predicate per recognised search term.
    fn search(self, terms: &SearchTerms) -> DatatableResult<Self>;

    /// Applies the order spec; `None` keeps the backend's default order.
    fn order(self, spec: Option<&OrderSpec>) -> DatatableResult<Self>;

    /// Restricts the query to one page.
    fn paginate(self, window: PageWindow) -> DatatableResult<Self>;

    /// Executes the query once and freezes it.
    fn execute(self) -> DatatableResult<Self::Executed>;
}

/// Read phase of a table-view query.
///
/// Every accessor reads the same memoized execution.
pub trait ExecutedQuery {
    /// Rows of the requested page.
    fn rows(&self) -> &[Record];

    /// Consumes the query, returning its rows.
    fn into_rows(self) -> Vec<Record>;

    /// Rows matching every applied search term.
    fn total_entries(&self) -> u64;

    /// Rows in the collection ignoring search terms.
    fn unfiltered_total_entries(&self) -> DatatableResult<u64>;

    /// Names of the registered aggregates.
    fn aggregate_names(&self) -> Vec<String> {
        Vec::new()
    }

    /// Decoded buckets of the aggregate registered as `name`.
    fn aggregate_for(&self, _name: &str) -> DatatableResult<Option<AggregateBuckets>> {
        Ok(None)
    }

    /// Collects rows, counts and aggregates into a [`ResultPage`].
    fn into_page(self) -> DatatableResult<ResultPage>
    where
        Self: Sized,
    {
        let unfiltered_total_entries = self.unfiltered_total_entries()?;
        let mut aggregates = BTreeMap::new();
        for name in self.aggregate_names() {
            if let Some(buckets) = self.aggregate_for(&name)? {
                aggregates.insert(name, buckets);
            }
        }
        let total_entries = self.total_entries();

        Ok(ResultPage {
            rows: self.into_rows(),
            total_entries,
            unfiltered_total_entries,
            aggregates,
        })
    }
}

/// Drives a query through search, order, pagination and execution for one request.
pub fn run<Q: DatatableQuery>(
    query: Q,
    request: &DatatableRequest,
    config: &DatatableConfig,
) -> DatatableResult<ResultPage> {
    let terms = request.terms();
    query
        .search(&terms)?
        .order(request.order.as_ref())?
        .paginate(request.page_window(config))?
        .execute()?
        .into_page()
}
