//! Relational predicate table: one translation per parsed term shape.

use crate::core::BackendCapabilities;
use crate::parse::{ParsedTerm, TextMatch};
use crate::types::{ColumnDefinition, ColumnType};

use super::fragment::{SqlFragment, SqlParam};

/// Builds the WHERE/HAVING predicate for a parsed term on `column`.
pub fn term_predicate(
    column: &ColumnDefinition,
    term: ParsedTerm,
    capabilities: &BackendCapabilities,
) -> SqlFragment {
    let field = column.backend_field.as_str();

    match term {
        ParsedTerm::Text(text) => text_predicate(field, text, capabilities),
        ParsedTerm::Integer(value) | ParsedTerm::Cents(value) | ParsedTerm::Id(value) => {
            SqlFragment::with_param(format!("{} = ?", field), SqlParam::Integer(value))
        }
        ParsedTerm::Decimal(value) => {
            SqlFragment::with_param(format!("{} = ?", field), SqlParam::Decimal(value))
        }
        ParsedTerm::Boolean(value) => {
            SqlFragment::with_param(format!("{} = ?", field), SqlParam::Bool(value))
        }
        ParsedTerm::Year(year) => SqlFragment::with_param(
            format!("{} = ?", capabilities.dialect.year_expression(field)),
            SqlParam::Integer(i64::from(year)),
        ),
        ParsedTerm::Range(range) => match &column.column_type {
            ColumnType::DateRange { operator } => {
                let bound = if operator.uses_period_end() {
                    range.end
                } else {
                    range.start
                };
                SqlFragment::with_param(
                    format!("{} {} ?", field, operator.sql()),
                    SqlParam::Timestamp(bound),
                )
            }
            ColumnType::Date => SqlFragment::with_params(
                format!("{f} >= ? AND {f} <= ?", f = field),
                vec![
                    SqlParam::Date(range.start_date()),
                    SqlParam::Date(range.end_date()),
                ],
            ),
            _ => SqlFragment::with_params(
                format!("{f} >= ? AND {f} <= ?", f = field),
                vec![
                    SqlParam::Timestamp(range.start),
                    SqlParam::Timestamp(range.end),
                ],
            ),
        },
        ParsedTerm::NoMatch => SqlFragment::never(),
        ParsedTerm::Polymorphic { type_name, id } => {
            let id = id
                .parse::<i64>()
                .map(SqlParam::Integer)
                .unwrap_or(SqlParam::String(id));
            SqlFragment::with_params(
                format!(
                    "{} = ? AND {} = ?",
                    column.polymorphic_id_field(),
                    column.polymorphic_type_field()
                ),
                vec![id, SqlParam::String(type_name)],
            )
        }
    }
}

fn text_predicate(field: &str, text: TextMatch, capabilities: &BackendCapabilities) -> SqlFragment {
    match text {
        TextMatch::Blank => SqlFragment::new(format!("({f} = '' OR {f} IS NULL)", f = field)),
        TextMatch::Equals(value) => SqlFragment::with_param(
            format!("LOWER({}) = LOWER(?)", field),
            SqlParam::String(value),
        ),
        TextMatch::AllOf(patterns) => {
            let comparison = if capabilities.supports_ilike {
                format!("{} ILIKE ? ESCAPE '{}'", field, LIKE_ESCAPE)
            } else {
                format!("LOWER({}) LIKE ? ESCAPE '{}'", field, LIKE_ESCAPE)
            };
            SqlFragment::and_all(patterns.iter().map(|pattern| {
                SqlFragment::with_param(
                    comparison.clone(),
                    SqlParam::String(pattern.render("%", escape_like)),
                )
            }))
            .unwrap_or_default()
        }
    }
}

/// Escape character declared on every LIKE comparison.
///
/// A backslash would need dialect-specific quoting in the `ESCAPE` clause.
pub const LIKE_ESCAPE: char = '!';

/// Escapes LIKE metacharacters so `text` matches itself.
pub fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '%' | '_') || ch == LIKE_ESCAPE {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::core::NoObfuscation;
    use crate::parse::parse_term;
    use crate::types::{ColumnOptions, RangeOperator, SearchOptions};

    fn predicate(column: &ColumnDefinition, raw: &str, caps: &BackendCapabilities) -> SqlFragment {
        let parsed = parse_term(column, raw, &NoObfuscation).unwrap();
        term_predicate(column, parsed, caps)
    }

    #[test]
    fn test_fuzzy_text_conjoins_tokens() {
        let column = ColumnDefinition::new("name", ColumnType::String);
        let sql = predicate(&column, "ann lee", &BackendCapabilities::mysql());
        assert_eq!(
            sql.sql,
            "(LOWER(name) LIKE ? ESCAPE '!') AND (LOWER(name) LIKE ? ESCAPE '!')"
        );
        assert_eq!(
            sql.params,
            vec![SqlParam::string("%ann%"), SqlParam::string("%lee%")]
        );
    }

    #[test]
    fn test_fuzzy_text_ilike() {
        let column = ColumnDefinition::new("name", ColumnType::String);
        let sql = predicate(&column, "ann", &BackendCapabilities::postgres());
        assert_eq!(sql.sql, "name ILIKE ? ESCAPE '!'");
    }

    #[test]
    fn test_like_metacharacters_are_literal() {
        let column = ColumnDefinition::new("name", ColumnType::String);
        let sql = predicate(&column, "a_b 50% x!y", &BackendCapabilities::sqlite());
        assert_eq!(
            sql.params,
            vec![
                SqlParam::string("%a!_b%"),
                SqlParam::string("%50!%%"),
                SqlParam::string("%x!!y%"),
            ]
        );
    }

    #[test]
    fn test_blank_exact_text() {
        let column = ColumnOptions::new()
            .with_search(SearchOptions::exact())
            .into_definition("nickname".to_string(), ColumnType::String);
        let sql = predicate(&column, "null", &BackendCapabilities::sqlite());
        assert_eq!(sql.sql, "(nickname = '' OR nickname IS NULL)");
        assert!(sql.params.is_empty());
    }

    #[test]
    fn test_price_in_cents() {
        let column = ColumnDefinition::new("amount_cents", ColumnType::Price);
        let sql = predicate(&column, "$12.34", &BackendCapabilities::sqlite());
        assert_eq!(sql.params, vec![SqlParam::Integer(1234)]);
    }

    #[test]
    fn test_date_range_inclusive() {
        let column = ColumnDefinition::new("born_on", ColumnType::Date);
        let sql = predicate(&column, "2020-05", &BackendCapabilities::sqlite());
        assert_eq!(sql.sql, "born_on >= ? AND born_on <= ?");
        assert_eq!(
            sql.params,
            vec![
                SqlParam::Date(NaiveDate::from_ymd_opt(2020, 5, 1).unwrap()),
                SqlParam::Date(NaiveDate::from_ymd_opt(2020, 5, 31).unwrap()),
            ]
        );
    }

    #[test]
    fn test_date_range_operator_uses_period_end() {
        let column = ColumnDefinition::new(
            "due_at",
            ColumnType::DateRange {
                operator: RangeOperator::Lte,
            },
        );
        let sql = predicate(&column, "2020", &BackendCapabilities::sqlite());
        assert_eq!(sql.sql, "due_at <= ?");
        let SqlParam::Timestamp(bound) = &sql.params[0] else {
            panic!("expected timestamp");
        };
        assert_eq!(bound.to_string(), "2020-12-31 23:59:59.999");
    }

    #[test]
    fn test_obfuscated_failure_is_unsatisfiable() {
        let column = ColumnDefinition::new("id", ColumnType::ObfuscatedId);
        let sql = predicate(&column, "0", &BackendCapabilities::sqlite());
        assert_eq!(sql.sql, "1 = 0");
    }

    #[test]
    fn test_polymorphic_predicate() {
        let column = ColumnDefinition::new("commentable", ColumnType::PolymorphicAssociation);
        let sql = predicate(&column, "Post_9", &BackendCapabilities::sqlite());
        assert_eq!(sql.sql, "commentable_id = ? AND commentable_type = ?");
        assert_eq!(
            sql.params,
            vec![SqlParam::Integer(9), SqlParam::string("Post")]
        );
    }

    #[test]
    fn test_year_predicate() {
        let column = ColumnDefinition::new("created_at", ColumnType::Year);
        let sql = predicate(&column, "2021", &BackendCapabilities::postgres());
        assert_eq!(sql.sql, "EXTRACT(YEAR FROM created_at) = ?");
    }
}
