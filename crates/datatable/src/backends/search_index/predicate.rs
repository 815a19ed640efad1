//! Search index clause table: one translation per parsed term shape.

use chrono::NaiveDateTime;
use rust_decimal::prelude::ToPrimitive;
use serde_json::{Value, json};

use crate::backends::sql::order::nulls_first;
use crate::parse::{ParsedTerm, Pattern, TextMatch};
use crate::types::{ColumnDefinition, ColumnType, SortDirection};

/// Where a clause is placed in the `bool` query.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexClause {
    /// Scored context (`must`).
    Query(Value),
    /// Unscored context (`filter`).
    Filter(Value),
}

impl IndexClause {
    /// Returns the clause body.
    pub fn into_value(self) -> Value {
        match self {
            IndexClause::Query(value) | IndexClause::Filter(value) => value,
        }
    }
}

/// A clause no document satisfies.
pub fn match_none() -> Value {
    json!({ "bool": { "must_not": [{ "match_all": {} }] } })
}

/// Escapes wildcard metacharacters in literal text.
fn escape_wildcard(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '*' | '?' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn wildcard(field: &str, pattern: &Pattern) -> Value {
    json!({ "wildcard": { field: { "value": pattern.render("*", escape_wildcard) } } })
}

fn term(field: &str, value: impl Into<Value>) -> Value {
    json!({ "term": { field: value.into() } })
}

fn all_of(mut clauses: Vec<Value>) -> Value {
    if clauses.len() == 1 {
        return clauses.remove(0);
    }
    json!({ "bool": { "must": clauses } })
}

fn timestamp(value: NaiveDateTime) -> String {
    value.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()
}

/// Field a column's clauses address; nested columns are qualified by their path.
pub fn clause_field(column: &ColumnDefinition) -> String {
    match &column.column_type {
        ColumnType::Nested { path } if !column.backend_field.starts_with(&format!("{}.", path)) => {
            format!("{}.{}", path, column.backend_field)
        }
        _ => column.backend_field.clone(),
    }
}

/// Builds the clause for a parsed term on `column`.
///
/// `raw` is the term as typed; `search_field` is the precomputed string
/// projection that date and datetime columns are matched against.
pub fn term_clause(
    column: &ColumnDefinition,
    term_value: ParsedTerm,
    raw: &str,
    search_field: &str,
) -> IndexClause {
    let field = clause_field(column);

    match term_value {
        ParsedTerm::Text(text) => text_clause(column, &field, text),
        ParsedTerm::Integer(value) | ParsedTerm::Cents(value) | ParsedTerm::Id(value) => {
            IndexClause::Filter(term(&field, value))
        }
        ParsedTerm::Decimal(value) => {
            let number = value
                .to_f64()
                .map(Value::from)
                .unwrap_or_else(|| Value::String(value.to_string()));
            IndexClause::Filter(term(&field, number))
        }
        ParsedTerm::Boolean(value) => IndexClause::Filter(term(&field, value)),
        ParsedTerm::Year(year) => IndexClause::Filter(json!({
            "range": { field: {
                "gte": format!("{}||/y", year),
                "lte": format!("{}||/y", year),
                "format": "yyyy"
            } }
        })),
        ParsedTerm::Range(range) => match &column.column_type {
            ColumnType::DateRange { operator } => {
                let bound = if operator.uses_period_end() {
                    range.end
                } else {
                    range.start
                };
                IndexClause::Filter(json!({
                    "range": { field: { operator.as_str(): timestamp(bound) } }
                }))
            }
            _ => {
                let needle = raw.trim().to_lowercase();
                IndexClause::Query(wildcard(search_field, &Pattern::contains(needle)))
            }
        },
        ParsedTerm::NoMatch => IndexClause::Filter(match_none()),
        ParsedTerm::Polymorphic { type_name, id } => {
            let id = id.parse::<i64>().map(Value::from).unwrap_or(Value::String(id));
            IndexClause::Filter(all_of(vec![
                term(&column.polymorphic_id_field(), id),
                term(&column.polymorphic_type_field(), type_name),
            ]))
        }
    }
}

fn text_clause(column: &ColumnDefinition, field: &str, text: TextMatch) -> IndexClause {
    match text {
        TextMatch::Blank => IndexClause::Filter(json!({
            "bool": {
                "should": [
                    { "term": { field: "" } },
                    { "bool": { "must_not": [{ "exists": { "field": field } }] } }
                ],
                "minimum_should_match": 1
            }
        })),
        // Select filters on enumerations still match partially
        TextMatch::Equals(value) if column.column_type == ColumnType::Enumeration => {
            IndexClause::Query(wildcard(field, &Pattern::contains(value)))
        }
        TextMatch::Equals(value) => IndexClause::Filter(term(field, value)),
        TextMatch::AllOf(patterns) => IndexClause::Query(all_of(
            patterns.iter().map(|pattern| wildcard(field, pattern)).collect(),
        )),
    }
}

/// Builds the sort clauses for `column`.
///
/// Polymorphic columns sort by their type field, then their id field.
pub fn sort_clauses(column: &ColumnDefinition, direction: SortDirection) -> Vec<Value> {
    let missing = if nulls_first(column.null_ordering, direction) {
        "_first"
    } else {
        "_last"
    };

    let fields = match column.column_type {
        ColumnType::PolymorphicAssociation => vec![
            column.polymorphic_type_field(),
            column.polymorphic_id_field(),
        ],
        _ => vec![column.sort_field().to_string()],
    };

    fields
        .into_iter()
        .map(|field| json!({ field: { "order": direction.as_str(), "missing": missing } }))
        .collect()
}
