//! Column definitions for a table view.
//!
//! A [`ColumnDefinition`] ties a visible column name to the backend field it
//! reads, the [`ColumnType`] that decides how search terms are parsed, and
//! the search/sort options the adapters honour.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::strategy::{OrderStrategy, SearchStrategy};

/// The declared type of a column.
///
/// Every adapter keeps one handler per variant, so adding a type means adding
/// one match arm to the term parser and to each backend's predicate table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ColumnType {
    /// Short text.
    String,
    /// Long text.
    Text,
    /// Whole number.
    Integer,
    /// Decimal number.
    Decimal,
    /// Monetary amount stored as a decimal.
    Currency,
    /// Percentage stored as a decimal.
    Percentage,
    /// True/false flag.
    Boolean,
    /// Calendar date.
    Date,
    /// Date and time.
    Datetime,
    /// A date/datetime column searched by its year only.
    Year,
    /// Monetary amount stored in integer cents.
    Price,
    /// Identifier exposed to clients in obfuscated form.
    ObfuscatedId,
    /// Polymorphic belongs-to: an id field plus a type discriminator field.
    PolymorphicAssociation,
    /// Has-many relationship resolved through the related table.
    OneToMany,
    /// Has-and-belongs-to-many relationship resolved through a join table.
    ManyToMany,
    /// A field that is searched but never displayed or sorted.
    SearchOnlyField,
    /// Enumerated string value (select filter).
    Enumeration,
    /// Integer foreign key matched exactly.
    ForeignKey,
    /// A date compared with a fixed operator instead of an equality range.
    DateRange {
        /// Comparison applied between the field and the parsed term.
        operator: RangeOperator,
    },
    /// A field inside a nested sub-document of the search index.
    Nested {
        /// The nested document path (e.g. `line_items`).
        path: String,
    },
}

impl ColumnType {
    /// Returns the snake_case type name.
    pub fn name(&self) -> &'static str {
        match self {
            ColumnType::String => "string",
            ColumnType::Text => "text",
            ColumnType::Integer => "integer",
            ColumnType::Decimal => "decimal",
            ColumnType::Currency => "currency",
            ColumnType::Percentage => "percentage",
            ColumnType::Boolean => "boolean",
            ColumnType::Date => "date",
            ColumnType::Datetime => "datetime",
            ColumnType::Year => "year",
            ColumnType::Price => "price",
            ColumnType::ObfuscatedId => "obfuscated_id",
            ColumnType::PolymorphicAssociation => "polymorphic_association",
            ColumnType::OneToMany => "one_to_many",
            ColumnType::ManyToMany => "many_to_many",
            ColumnType::SearchOnlyField => "search_only_field",
            ColumnType::Enumeration => "enumeration",
            ColumnType::ForeignKey => "foreign_key",
            ColumnType::DateRange { .. } => "date_range",
            ColumnType::Nested { .. } => "nested",
        }
    }

    /// Returns true for free-text column types.
    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            ColumnType::String | ColumnType::Text | ColumnType::SearchOnlyField
        )
    }

    /// Returns true for relationship columns handled by the association resolver.
    pub fn is_association(&self) -> bool {
        matches!(self, ColumnType::OneToMany | ColumnType::ManyToMany)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Comparison operator of a [`ColumnType::DateRange`] column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeOperator {
    /// Strictly after the term's period.
    Gt,
    /// On or after the start of the term's period.
    Gte,
    /// Strictly before the term's period.
    Lt,
    /// On or before the end of the term's period.
    Lte,
}

impl RangeOperator {
    /// Returns the operator keyword used by range queries.
    pub fn as_str(&self) -> &'static str {
        match self {
            RangeOperator::Gt => "gt",
            RangeOperator::Gte => "gte",
            RangeOperator::Lt => "lt",
            RangeOperator::Lte => "lte",
        }
    }

    /// Returns the SQL comparison operator.
    pub fn sql(&self) -> &'static str {
        match self {
            RangeOperator::Gt => ">",
            RangeOperator::Gte => ">=",
            RangeOperator::Lt => "<",
            RangeOperator::Lte => "<=",
        }
    }

    /// Whether the operator compares against the end of the parsed period.
    ///
    /// `gt` and `lte` look past the whole period, `gte` and `lt` stop at its start.
    pub fn uses_period_end(&self) -> bool {
        matches!(self, RangeOperator::Gt | RangeOperator::Lte)
    }
}

/// How a non-fuzzy text term is compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Case-insensitive equality.
    Exact,
    /// Case-insensitive substring match on the whole value.
    #[default]
    Contains,
}

/// Where a column's predicate is attached on the relational backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetClause {
    /// Row filter (`WHERE`).
    #[default]
    Filter,
    /// Aggregated/grouped value filter (`HAVING`).
    Having,
}

/// Search behaviour of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Split text terms into whitespace tokens that must all be contained.
    #[serde(default = "default_fuzzy")]
    pub fuzzy: bool,

    /// Comparison used when `fuzzy` is off.
    #[serde(default)]
    pub match_mode: MatchMode,

    /// Clause the predicate is attached to.
    #[serde(default)]
    pub target_clause: TargetClause,
}

fn default_fuzzy() -> bool {
    true
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            fuzzy: true,
            match_mode: MatchMode::default(),
            target_clause: TargetClause::default(),
        }
    }
}

impl SearchOptions {
    /// Exact, case-insensitive equality (select-style filter).
    pub fn exact() -> Self {
        Self {
            fuzzy: false,
            match_mode: MatchMode::Exact,
            target_clause: TargetClause::Filter,
        }
    }

    /// Attaches predicates to the `HAVING` clause.
    pub fn having(mut self) -> Self {
        self.target_clause = TargetClause::Having;
        self
    }
}

/// Placement of null values when ordering by a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullOrdering {
    /// Nulls before every non-null value.
    First,
    /// Nulls after every non-null value.
    Last,
    /// Nulls sort as the largest value: last when ascending, first when descending.
    #[default]
    BackendDefault,
}

/// How an association column reads its search term.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AssociationMode {
    /// Comma separated ids of related records.
    #[default]
    IdList,
    /// Free text matched against the related record's text fields.
    TextSearch {
        /// Restrict matching to one related field instead of every text field.
        #[serde(default)]
        field: Option<String>,
    },
}

/// Association settings of a `one_to_many`/`many_to_many` column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct AssociationOptions {
    /// Association name used for reflection; defaults to the column name.
    #[serde(default)]
    pub name: Option<String>,

    /// Term interpretation.
    #[serde(default)]
    pub mode: AssociationMode,
}

/// A registered table-view column.
#[derive(Clone, Serialize, Deserialize)]
pub struct ColumnDefinition {
    /// Unique column name.
    pub name: String,

    /// Native column/field reference on the backend.
    pub backend_field: String,

    /// Declared column type.
    pub column_type: ColumnType,

    /// Search behaviour.
    #[serde(default)]
    pub search: SearchOptions,

    /// Null placement when ordering.
    #[serde(default)]
    pub null_ordering: NullOrdering,

    /// Whether the column may appear in an order spec.
    #[serde(default = "default_sortable")]
    pub sortable: bool,

    /// Field to sort on when it differs from `backend_field`.
    #[serde(default)]
    pub sort_field: Option<String>,

    /// Discriminator field of a polymorphic association.
    #[serde(default)]
    pub type_field: Option<String>,

    /// Association settings for relationship columns.
    #[serde(default)]
    pub association: Option<AssociationOptions>,

    /// Replaces the built-in predicate for this column.
    #[serde(skip)]
    pub search_strategy: Option<Arc<dyn SearchStrategy>>,

    /// Replaces the built-in order clause for this column.
    #[serde(skip)]
    pub order_strategy: Option<Arc<dyn OrderStrategy>>,
}

fn default_sortable() -> bool {
    true
}

impl fmt::Debug for ColumnDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnDefinition")
            .field("name", &self.name)
            .field("backend_field", &self.backend_field)
            .field("column_type", &self.column_type)
            .field("search", &self.search)
            .field("null_ordering", &self.null_ordering)
            .field("sortable", &self.sortable)
            .field("has_search_strategy", &self.search_strategy.is_some())
            .field("has_order_strategy", &self.order_strategy.is_some())
            .finish_non_exhaustive()
    }
}

impl ColumnDefinition {
    /// Creates a column reading the field of the same name.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        let name = name.into();
        Self {
            backend_field: name.clone(),
            name,
            sortable: !matches!(column_type, ColumnType::SearchOnlyField),
            column_type,
            search: SearchOptions::default(),
            null_ordering: NullOrdering::default(),
            sort_field: None,
            type_field: None,
            association: None,
            search_strategy: None,
            order_strategy: None,
        }
    }

    /// Returns the field used in order clauses.
    pub fn sort_field(&self) -> &str {
        self.sort_field.as_deref().unwrap_or(&self.backend_field)
    }

    /// Returns the id field of a polymorphic association.
    ///
    /// `commentable` and `commentable_id` both yield `commentable_id`.
    pub fn polymorphic_id_field(&self) -> String {
        if self.backend_field.ends_with("_id") {
            self.backend_field.clone()
        } else {
            format!("{}_id", self.backend_field)
        }
    }

    /// Returns the type discriminator field of a polymorphic association.
    pub fn polymorphic_type_field(&self) -> String {
        if let Some(field) = &self.type_field {
            return field.clone();
        }
        let stem = self
            .backend_field
            .strip_suffix("_id")
            .unwrap_or(&self.backend_field);
        format!("{}_type", stem)
    }

    /// Returns the association name used for reflection.
    pub fn association_name(&self) -> &str {
        self.association
            .as_ref()
            .and_then(|a| a.name.as_deref())
            .unwrap_or(&self.name)
    }

    /// Returns the association term mode.
    pub fn association_mode(&self) -> AssociationMode {
        self.association
            .as_ref()
            .map(|a| a.mode.clone())
            .unwrap_or_default()
    }
}

/// Optional settings passed to `ColumnRegistryBuilder::define`.
#[derive(Clone, Default)]
pub struct ColumnOptions {
    backend_field: Option<String>,
    search: Option<SearchOptions>,
    null_ordering: Option<NullOrdering>,
    sortable: Option<bool>,
    sort_field: Option<String>,
    type_field: Option<String>,
    association: Option<AssociationOptions>,
    search_strategy: Option<Arc<dyn SearchStrategy>>,
    order_strategy: Option<Arc<dyn OrderStrategy>>,
}

impl ColumnOptions {
    /// Creates empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the backend field (defaults to the column name).
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.backend_field = Some(field.into());
        self
    }

    /// Sets the search options.
    pub fn with_search(mut self, search: SearchOptions) -> Self {
        self.search = Some(search);
        self
    }

    /// Sets null placement for ordering.
    pub fn with_null_ordering(mut self, ordering: NullOrdering) -> Self {
        self.null_ordering = Some(ordering);
        self
    }

    /// Sets whether the column is sortable.
    pub fn sortable(mut self, sortable: bool) -> Self {
        self.sortable = Some(sortable);
        self
    }

    /// Sets a dedicated sort field.
    pub fn with_sort_field(mut self, field: impl Into<String>) -> Self {
        self.sort_field = Some(field.into());
        self
    }

    /// Sets the polymorphic type discriminator field.
    pub fn with_type_field(mut self, field: impl Into<String>) -> Self {
        self.type_field = Some(field.into());
        self
    }

    /// Sets association options.
    pub fn with_association(mut self, association: AssociationOptions) -> Self {
        self.association = Some(association);
        self
    }

    /// Injects a custom search strategy.
    pub fn with_search_strategy(mut self, strategy: Arc<dyn SearchStrategy>) -> Self {
        self.search_strategy = Some(strategy);
        self
    }

    /// Injects a custom order strategy.
    pub fn with_order_strategy(mut self, strategy: Arc<dyn OrderStrategy>) -> Self {
        self.order_strategy = Some(strategy);
        self
    }

    /// Builds the column definition.
    pub fn into_definition(self, name: String, column_type: ColumnType) -> ColumnDefinition {
        let mut column = ColumnDefinition::new(name, column_type);
        if let Some(field) = self.backend_field {
            column.backend_field = field;
        }
        if let Some(search) = self.search {
            column.search = search;
        }
        if let Some(ordering) = self.null_ordering {
            column.null_ordering = ordering;
        }
        if let Some(sortable) = self.sortable {
            column.sortable = sortable;
        }
        column.sort_field = self.sort_field;
        column.type_field = self.type_field;
        column.association = self.association;
        column.search_strategy = self.search_strategy;
        column.order_strategy = self.order_strategy;
        column
    }
}
