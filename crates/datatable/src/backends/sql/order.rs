//! ORDER BY construction with explicit null placement.

use crate::core::BackendCapabilities;
use crate::types::{ColumnDefinition, ColumnType, NullOrdering, SortDirection};

/// Whether nulls go first for `ordering` in `direction`.
///
/// Backend default treats null as the largest value.
pub fn nulls_first(ordering: NullOrdering, direction: SortDirection) -> bool {
    match ordering {
        NullOrdering::First => true,
        NullOrdering::Last => false,
        NullOrdering::BackendDefault => direction == SortDirection::Desc,
    }
}

/// Builds the ORDER BY terms for `column`.
///
/// Polymorphic columns order by their type field, then their id field.
/// Backends without `NULLS FIRST/LAST` get an `IS NULL` key ahead of each
/// real key.
pub fn order_terms(
    column: &ColumnDefinition,
    direction: SortDirection,
    capabilities: &BackendCapabilities,
) -> Vec<String> {
    let fields = match column.column_type {
        ColumnType::PolymorphicAssociation => vec![
            column.polymorphic_type_field(),
            column.polymorphic_id_field(),
        ],
        _ => vec![column.sort_field().to_string()],
    };

    let first = nulls_first(column.null_ordering, direction);
    let mut terms = Vec::with_capacity(fields.len() * 2);
    for field in fields {
        if capabilities.native_null_ordering {
            let nulls = if first { "NULLS FIRST" } else { "NULLS LAST" };
            terms.push(format!("{} {} {}", field, direction.sql(), nulls));
        } else {
            let null_key = if first { "DESC" } else { "ASC" };
            terms.push(format!("({} IS NULL) {}", field, null_key));
            terms.push(format!("{} {}", field, direction.sql()));
        }
    }
    terms
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ColumnOptions;

    #[test]
    fn test_default_null_placement() {
        assert!(!nulls_first(NullOrdering::BackendDefault, SortDirection::Asc));
        assert!(nulls_first(NullOrdering::BackendDefault, SortDirection::Desc));
        assert!(!nulls_first(NullOrdering::Last, SortDirection::Desc));
    }

    #[test]
    fn test_native_null_ordering() {
        let column = ColumnOptions::new()
            .with_null_ordering(NullOrdering::Last)
            .into_definition("score".to_string(), ColumnType::Integer);
        let terms = order_terms(&column, SortDirection::Desc, &BackendCapabilities::postgres());
        assert_eq!(terms, vec!["score DESC NULLS LAST"]);
    }

    #[test]
    fn test_emulated_null_ordering() {
        let column = ColumnOptions::new()
            .with_null_ordering(NullOrdering::Last)
            .into_definition("score".to_string(), ColumnType::Integer);
        let terms = order_terms(&column, SortDirection::Desc, &BackendCapabilities::mysql());
        assert_eq!(terms, vec!["(score IS NULL) ASC", "score DESC"]);
    }

    #[test]
    fn test_polymorphic_orders_type_then_id() {
        let column = ColumnDefinition::new("commentable", ColumnType::PolymorphicAssociation);
        let terms = order_terms(&column, SortDirection::Asc, &BackendCapabilities::postgres());
        assert_eq!(
            terms,
            vec![
                "commentable_type ASC NULLS LAST",
                "commentable_id ASC NULLS LAST"
            ]
        );
    }

    #[test]
    fn test_sort_field_override() {
        let column = ColumnOptions::new()
            .with_sort_field("name_raw")
            .into_definition("name".to_string(), ColumnType::String);
        let terms = order_terms(&column, SortDirection::Asc, &BackendCapabilities::postgres());
        assert_eq!(terms, vec!["name_raw ASC NULLS LAST"]);
    }
}
