//! Per-request inputs: search terms, order and page window.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::DatatableConfig;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

impl SortDirection {
    /// Returns the SQL keyword.
    pub fn sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    /// Returns the search index keyword.
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(format!("unknown sort direction: {}", other)),
        }
    }
}

/// A single requested order: one column and a direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSpec {
    /// Column name.
    pub column: String,
    /// Direction.
    #[serde(default)]
    pub direction: SortDirection,
}

impl OrderSpec {
    /// Creates an order spec.
    pub fn new(column: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            column: column.into(),
            direction,
        }
    }

    /// Ascending order on `column`.
    pub fn asc(column: impl Into<String>) -> Self {
        Self::new(column, SortDirection::Asc)
    }

    /// Descending order on `column`.
    pub fn desc(column: impl Into<String>) -> Self {
        Self::new(column, SortDirection::Desc)
    }
}

/// A raw search value bound to one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchTerm {
    /// Column name.
    pub column: String,
    /// Raw, unparsed value as typed by the user.
    pub raw: String,
}

impl SearchTerm {
    /// Creates a search term.
    pub fn new(column: impl Into<String>, raw: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            raw: raw.into(),
        }
    }
}

/// The search terms of one request, in application order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchTerms(Vec<SearchTerm>);

impl SearchTerms {
    /// Creates an empty set of terms.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a term.
    pub fn with(mut self, column: impl Into<String>, raw: impl Into<String>) -> Self {
        self.0.push(SearchTerm::new(column, raw));
        self
    }

    /// Iterates the terms.
    pub fn iter(&self) -> std::slice::Iter<'_, SearchTerm> {
        self.0.iter()
    }

    /// Number of terms.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no terms.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for SearchTerms
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(column, raw)| SearchTerm::new(column, raw))
                .collect(),
        )
    }
}

impl<'a> IntoIterator for &'a SearchTerms {
    type Item = &'a SearchTerm;
    type IntoIter = std::slice::Iter<'a, SearchTerm>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// The requested page: 1-based page number and a positive page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawPageWindow")]
pub struct PageWindow {
    page: u32,
    per_page: u32,
}

/// Wire shape of a page window, clamped through [`PageWindow::new`].
#[derive(Deserialize)]
struct RawPageWindow {
    page: u32,
    per_page: u32,
}

impl From<RawPageWindow> for PageWindow {
    fn from(raw: RawPageWindow) -> Self {
        Self::new(raw.page, raw.per_page)
    }
}

impl PageWindow {
    /// Creates a page window; zero values are raised to 1.
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.max(1),
        }
    }

    /// 1-based page number.
    pub fn page(&self) -> u32 {
        self.page
    }

    /// Page size.
    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    /// Number of rows skipped before this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.per_page)
    }
}

impl Default for PageWindow {
    fn default() -> Self {
        Self::new(1, DatatableConfig::default().default_per_page)
    }
}

/// A complete table request as decoded from caller input.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatatableRequest {
    /// Column name to raw search value.
    #[serde(default)]
    pub search_terms: BTreeMap<String, String>,

    /// Optional order.
    #[serde(default)]
    pub order: Option<OrderSpec>,

    /// Requested page (1-based).
    #[serde(default)]
    pub page: Option<u32>,

    /// Requested page size.
    #[serde(default)]
    pub per_page: Option<u32>,
}

impl DatatableRequest {
    /// Returns the request's search terms.
    pub fn terms(&self) -> SearchTerms {
        self.search_terms
            .iter()
            .map(|(column, raw)| (column.as_str(), raw.as_str()))
            .collect()
    }

    /// Resolves the page window using the configured defaults.
    pub fn page_window(&self, config: &DatatableConfig) -> PageWindow {
        PageWindow::new(
            self.page.unwrap_or(1),
            config.effective_per_page(self.per_page),
        )
    }
}
