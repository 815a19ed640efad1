//! Record store collaborator traits.
//!
//! The relational adapter never talks to a database directly. It asks a
//! [`RecordStore`] to introspect columns, reflect associations, deobfuscate
//! identifiers and run the SQL it compiled.

use serde::{Deserialize, Serialize};

use crate::backends::sql::{Relation, SqlFragment};
use crate::error::DatatableResult;
use crate::types::{ColumnType, Record};

use super::capabilities::BackendCapabilities;

/// Reverses obfuscated identifiers.
pub trait Deobfuscate {
    /// Returns the plain identifier for `token`, or `token` itself when it
    /// cannot be deobfuscated.
    fn deobfuscate(&self, token: &str) -> String;
}

impl<F> Deobfuscate for F
where
    F: Fn(&str) -> String,
{
    fn deobfuscate(&self, token: &str) -> String {
        self(token)
    }
}

/// Identity deobfuscation: every token is treated as invalid.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoObfuscation;

impl Deobfuscate for NoObfuscation {
    fn deobfuscate(&self, token: &str) -> String {
        token.to_string()
    }
}

/// Kind of a reflected association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationKind {
    /// The owner holds the foreign key.
    BelongsTo,
    /// The related table holds a foreign key to the owner.
    HasMany,
    /// Owner and related rows are linked through a join table.
    HasAndBelongsToMany,
}

/// Polymorphic side of an association.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolymorphicLink {
    /// Column holding the type discriminator.
    pub type_column: String,
    /// Type name the discriminator must equal for rows owned by this table.
    pub type_name: String,
}

/// Join table of a many-to-many association.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinTable {
    /// Join table name.
    pub table: String,
    /// Join column referencing the owner.
    pub owner_key: String,
    /// Join column referencing the related table.
    pub related_key: String,
}

/// A reflected association between the owning table and a related table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Association {
    /// Association name.
    pub name: String,
    /// Association kind.
    pub kind: AssociationKind,
    /// Related table.
    pub related_table: String,
    /// Primary key of the owning table.
    pub owner_key: String,
    /// Primary key of the related table.
    pub related_key: String,
    /// Foreign key: on the related table for has-many, on the owner for belongs-to.
    pub foreign_key: String,
    /// Polymorphic discriminator, if any.
    pub polymorphic: Option<PolymorphicLink>,
    /// Join table for has-and-belongs-to-many.
    pub join: Option<JoinTable>,
}

impl Association {
    /// A has-many association where `related_table.foreign_key` references the owner's `id`.
    pub fn has_many(
        name: impl Into<String>,
        related_table: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: AssociationKind::HasMany,
            related_table: related_table.into(),
            owner_key: "id".to_string(),
            related_key: "id".to_string(),
            foreign_key: foreign_key.into(),
            polymorphic: None,
            join: None,
        }
    }

    /// A belongs-to association where the owner's `foreign_key` references `related_table.id`.
    pub fn belongs_to(
        name: impl Into<String>,
        related_table: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            kind: AssociationKind::BelongsTo,
            ..Self::has_many(name, related_table, foreign_key)
        }
    }

    /// A has-and-belongs-to-many association through `join`.
    pub fn has_and_belongs_to_many(
        name: impl Into<String>,
        related_table: impl Into<String>,
        join: JoinTable,
    ) -> Self {
        Self {
            name: name.into(),
            kind: AssociationKind::HasAndBelongsToMany,
            related_table: related_table.into(),
            owner_key: "id".to_string(),
            related_key: "id".to_string(),
            foreign_key: join.owner_key.clone(),
            polymorphic: None,
            join: Some(join),
        }
    }

    /// Marks the association polymorphic.
    pub fn with_polymorphic(
        mut self,
        type_column: impl Into<String>,
        type_name: impl Into<String>,
    ) -> Self {
        self.polymorphic = Some(PolymorphicLink {
            type_column: type_column.into(),
            type_name: type_name.into(),
        });
        self
    }
}

/// How cheaply a relation reports its size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationSize {
    /// A plain row count.
    Exact(u64),
    /// One member count per group of a grouped relation.
    Grouped(Vec<u64>),
    /// The store cannot size this relation directly.
    Unknown,
}

/// Schema and association reflection plus identifier lookups.
///
/// Used by the association resolver from either adapter.
pub trait AssociationSource {
    /// Reflects the association `name` declared on `table`.
    fn association(&self, table: &str, name: &str) -> Option<Association>;

    /// Lists the columns of `table` with their inferred types.
    fn columns(&self, table: &str) -> DatatableResult<Vec<(String, ColumnType)>>;

    /// Runs `sql` and returns the first column of every row as an identifier.
    fn pluck_ids(&self, sql: &SqlFragment) -> DatatableResult<Vec<i64>>;
}

/// The relational record store.
pub trait RecordStore: AssociationSource + Deobfuscate {
    /// Capabilities of the connection.
    fn capabilities(&self) -> BackendCapabilities;

    /// Runs `sql` and returns its rows.
    fn select(&self, sql: &SqlFragment) -> DatatableResult<Vec<Record>>;

    /// Sizes `relation` without materialising it.
    fn size(&self, relation: &Relation) -> DatatableResult<RelationSize>;

    /// Runs a `SELECT COUNT(*)` style query.
    fn count(&self, sql: &SqlFragment) -> DatatableResult<u64>;
}
