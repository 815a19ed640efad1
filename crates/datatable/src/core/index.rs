//! Search index collaborator trait.

use serde_json::Value;

use crate::error::DatatableResult;

/// A search index that executes compiled query bodies.
pub trait SearchIndex {
    /// Runs a search request body and returns the raw response
    /// (`hits`, `aggregations`, ...).
    fn search(&self, body: &Value) -> DatatableResult<Value>;

    /// Name of the precomputed string projection of `field`, when the index
    /// maps it under a name other than the configured suffix.
    fn field_name_for_search(&self, _field: &str) -> Option<String> {
        None
    }
}

impl<T: SearchIndex + ?Sized> SearchIndex for &T {
    fn search(&self, body: &Value) -> DatatableResult<Value> {
        (**self).search(body)
    }

    fn field_name_for_search(&self, field: &str) -> Option<String> {
        (**self).field_name_for_search(field)
    }
}
