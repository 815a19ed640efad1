//! Term parsing.
//!
//! Converts a raw search string into a typed [`ParsedTerm`] according to the
//! column's [`ColumnType`]. Both adapters parse through [`parse_term`] and
//! translate the result into their own predicate form, so the parsing rules
//! are identical across backends.
//!
//! Parsing never fails the request: a [`TermError`] tells the adapter to
//! drop the term.

pub mod date;
pub mod numeric;
pub mod text;

use rust_decimal::Decimal;

use crate::core::Deobfuscate;
use crate::error::TermError;
use crate::types::{ColumnDefinition, ColumnType};

pub use date::{DatePrecision, DateRange};
pub use text::{Pattern, Piece, TextMatch};

/// A search term converted to the column's value domain.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedTerm {
    /// Text comparison.
    Text(TextMatch),
    /// Integer equality.
    Integer(i64),
    /// Decimal equality.
    Decimal(Decimal),
    /// Price equality, in integer cents.
    Cents(i64),
    /// Boolean equality.
    Boolean(bool),
    /// Calendar year of a date field.
    Year(i32),
    /// Inclusive date/time range.
    Range(DateRange),
    /// Deobfuscated identifier.
    Id(i64),
    /// An identifier that failed to deobfuscate: matches nothing.
    NoMatch,
    /// Polymorphic key.
    Polymorphic {
        /// Type discriminator value.
        type_name: String,
        /// Raw id half of the term.
        id: String,
    },
}

/// Parses `raw` for `column`.
///
/// Association columns are not handled here; they go through the
/// association resolver.
pub fn parse_term<D>(
    column: &ColumnDefinition,
    raw: &str,
    deobfuscator: &D,
) -> Result<ParsedTerm, TermError>
where
    D: Deobfuscate + ?Sized,
{
    match &column.column_type {
        ColumnType::String
        | ColumnType::Text
        | ColumnType::SearchOnlyField
        | ColumnType::Nested { .. } => text::parse(raw, &column.search).map(ParsedTerm::Text),
        ColumnType::Enumeration => Ok(ParsedTerm::Text(TextMatch::Equals(
            raw.trim().to_lowercase(),
        ))),
        ColumnType::Integer | ColumnType::ForeignKey => numeric::integer(raw).map(ParsedTerm::Integer),
        ColumnType::Decimal | ColumnType::Currency | ColumnType::Percentage => {
            numeric::decimal(raw).map(ParsedTerm::Decimal)
        }
        ColumnType::Price => numeric::price_cents(raw).map(ParsedTerm::Cents),
        ColumnType::Boolean => Ok(ParsedTerm::Boolean(numeric::boolean(raw))),
        ColumnType::Year => numeric::year(raw).map(ParsedTerm::Year),
        ColumnType::Date | ColumnType::Datetime | ColumnType::DateRange { .. } => {
            date::parse_range(raw).map(ParsedTerm::Range)
        }
        ColumnType::ObfuscatedId => Ok(deobfuscate_id(raw, deobfuscator)),
        ColumnType::PolymorphicAssociation => {
            text::polymorphic(raw).map(|(type_name, id)| ParsedTerm::Polymorphic { type_name, id })
        }
        ColumnType::OneToMany | ColumnType::ManyToMany => Err(TermError::Unsupported {
            column_type: column.column_type.name().to_string(),
            backend: "term parser",
        }),
    }
}

fn deobfuscate_id<D>(raw: &str, deobfuscator: &D) -> ParsedTerm
where
    D: Deobfuscate + ?Sized,
{
    let token = raw.trim();
    let plain = deobfuscator.deobfuscate(token);
    if plain == token {
        return ParsedTerm::NoMatch;
    }
    plain
        .trim()
        .parse()
        .map(ParsedTerm::Id)
        .unwrap_or(ParsedTerm::NoMatch)
}
