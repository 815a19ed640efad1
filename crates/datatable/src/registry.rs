//! The column registry.
//!
//! Columns are defined once per table view through [`ColumnRegistryBuilder`]
//! and the finished [`ColumnRegistry`] is read-only. Registries are cheap to
//! share across requests.

use std::collections::HashMap;

use tracing::debug;

use crate::core::{AssociationKind, AssociationSource};
use crate::error::{DatatableResult, QueryError, RegistryError};
use crate::types::{
    ColumnDefinition, ColumnOptions, ColumnType, OrderSpec, SearchTerms, SortDirection,
};

/// An ordered, immutable set of table-view columns.
#[derive(Debug, Clone, Default)]
pub struct ColumnRegistry {
    columns: Vec<ColumnDefinition>,
    by_name: HashMap<String, usize>,
}

impl ColumnRegistry {
    /// Starts a new registry.
    pub fn builder() -> ColumnRegistryBuilder {
        ColumnRegistryBuilder::default()
    }

    /// Builds a registry from deserialized definitions.
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = ColumnDefinition>,
    ) -> Result<Self, RegistryError> {
        definitions
            .into_iter()
            .try_fold(Self::builder(), ColumnRegistryBuilder::column)
            .map(ColumnRegistryBuilder::build)
    }

    /// Looks up a column by name.
    pub fn lookup(&self, name: &str) -> Option<&ColumnDefinition> {
        self.by_name.get(name).map(|&i| &self.columns[i])
    }

    /// Iterates columns in definition order.
    pub fn iter(&self) -> std::slice::Iter<'_, ColumnDefinition> {
        self.columns.iter()
    }

    /// Returns the column names in definition order.
    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Returns the number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if no column is defined.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Pairs each term with its column, dropping terms for unknown columns.
    pub fn resolve_terms<'a>(
        &'a self,
        terms: &'a SearchTerms,
    ) -> Vec<(&'a ColumnDefinition, &'a str)> {
        terms
            .iter()
            .filter_map(|term| match self.lookup(&term.column) {
                Some(column) => Some((column, term.raw.as_str())),
                None => {
                    debug!(column = %term.column, "Dropping search term for unknown column");
                    None
                }
            })
            .collect()
    }

    /// Resolves an order spec against the registry.
    ///
    /// Unknown columns are ignored. Ordering by a column declared not
    /// sortable is an error.
    pub fn resolve_order(
        &self,
        spec: Option<&OrderSpec>,
    ) -> Result<Option<(&ColumnDefinition, SortDirection)>, QueryError> {
        let Some(spec) = spec else {
            return Ok(None);
        };
        let Some(column) = self.lookup(&spec.column) else {
            debug!(column = %spec.column, "Ignoring order on unknown column");
            return Ok(None);
        };
        if !column.sortable {
            return Err(QueryError::ColumnNotSortable {
                column: column.name.clone(),
            });
        }
        Ok(Some((column, spec.direction)))
    }
}

impl<'a> IntoIterator for &'a ColumnRegistry {
    type Item = &'a ColumnDefinition;
    type IntoIter = std::slice::Iter<'a, ColumnDefinition>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.iter()
    }
}

/// Builder for [`ColumnRegistry`].
#[derive(Debug, Default)]
pub struct ColumnRegistryBuilder {
    columns: Vec<ColumnDefinition>,
    by_name: HashMap<String, usize>,
}

impl ColumnRegistryBuilder {
    /// Defines a column.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateColumn`] if `name` is already defined.
    pub fn define(
        self,
        name: impl Into<String>,
        column_type: ColumnType,
        options: ColumnOptions,
    ) -> Result<Self, RegistryError> {
        self.column(options.into_definition(name.into(), column_type))
    }

    /// Adds a fully built column definition.
    pub fn column(mut self, column: ColumnDefinition) -> Result<Self, RegistryError> {
        if self.by_name.contains_key(&column.name) {
            return Err(RegistryError::DuplicateColumn { name: column.name });
        }
        self.by_name.insert(column.name.clone(), self.columns.len());
        self.columns.push(column);
        Ok(self)
    }

    /// Defines columns by introspecting `table` on `source`.
    ///
    /// Association names become relationship columns, everything else takes
    /// the type the store reports for it.
    pub fn from_store<A>(source: &A, table: &str, names: &[&str]) -> DatatableResult<Self>
    where
        A: AssociationSource + ?Sized,
    {
        let columns = source.columns(table)?;
        let mut builder = Self::default();

        for &name in names {
            let definition = if let Some(association) = source.association(table, name) {
                match association.kind {
                    AssociationKind::BelongsTo => match &association.polymorphic {
                        Some(link) => ColumnOptions::new()
                            .with_field(&association.foreign_key)
                            .with_type_field(&link.type_column)
                            .into_definition(name.to_string(), ColumnType::PolymorphicAssociation),
                        None => ColumnOptions::new()
                            .with_field(&association.foreign_key)
                            .into_definition(name.to_string(), ColumnType::ForeignKey),
                    },
                    AssociationKind::HasMany => {
                        ColumnDefinition::new(name, ColumnType::OneToMany)
                    }
                    AssociationKind::HasAndBelongsToMany => {
                        ColumnDefinition::new(name, ColumnType::ManyToMany)
                    }
                }
            } else if let Some((_, column_type)) = columns.iter().find(|(c, _)| c == name) {
                ColumnDefinition::new(name, column_type.clone())
            } else {
                return Err(RegistryError::UnknownField {
                    table: table.to_string(),
                    name: name.to_string(),
                }
                .into());
            };

            builder = builder.column(definition)?;
        }

        Ok(builder)
    }

    /// Finishes the registry.
    pub fn build(self) -> ColumnRegistry {
        ColumnRegistry {
            columns: self.columns,
            by_name: self.by_name,
        }
    }
}
