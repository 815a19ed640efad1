//! Text and polymorphic term parsing.

use crate::error::TermError;
use crate::types::{MatchMode, SearchOptions};

/// One piece of a wildcard pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Piece {
    /// Matches any run of characters.
    Any,
    /// Matches this text literally.
    Literal(String),
}

/// A case-folded wildcard pattern over a whole field value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pattern(pub Vec<Piece>);

impl Pattern {
    /// Matches values containing `needle`.
    pub fn contains(needle: impl Into<String>) -> Self {
        Pattern(vec![
            Piece::Any,
            Piece::Literal(needle.into()),
            Piece::Any,
        ])
    }

    /// Builds a pattern from a quoted term: each quote becomes a wildcard.
    fn from_quoted(value: &str) -> Self {
        let mut pieces = Vec::new();
        for (i, segment) in value.split('"').enumerate() {
            if i > 0 && pieces.last() != Some(&Piece::Any) {
                pieces.push(Piece::Any);
            }
            if !segment.is_empty() {
                pieces.push(Piece::Literal(segment.to_string()));
            }
        }
        Pattern(pieces)
    }

    /// Renders the pattern with `wildcard` for [`Piece::Any`].
    ///
    /// `escape` is applied to literal text.
    pub fn render(&self, wildcard: &str, escape: impl Fn(&str) -> String) -> String {
        self.0
            .iter()
            .map(|piece| match piece {
                Piece::Any => wildcard.to_string(),
                Piece::Literal(text) => escape(text),
            })
            .collect()
    }
}

/// How a text column matches a term.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TextMatch {
    /// The field is empty or null.
    Blank,
    /// Case-insensitive equality with this (lower-cased) value.
    Equals(String),
    /// Every pattern must match the lower-cased field.
    AllOf(Vec<Pattern>),
}

fn is_blank_token(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "" | "null" | "nil")
}

/// Parses a text term according to the column's search options.
pub fn parse(raw: &str, options: &SearchOptions) -> Result<TextMatch, TermError> {
    let value = raw.to_lowercase();

    if !options.fuzzy {
        if is_blank_token(&value) {
            return Ok(TextMatch::Blank);
        }
        return Ok(match options.match_mode {
            MatchMode::Exact => TextMatch::Equals(value),
            MatchMode::Contains => TextMatch::AllOf(vec![Pattern::contains(value)]),
        });
    }

    let trimmed = value.trim();
    let patterns: Vec<Pattern> =
        if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
            vec![Pattern::from_quoted(trimmed)]
        } else {
            trimmed.split_whitespace().map(Pattern::contains).collect()
        };

    if patterns.is_empty() {
        return Err(TermError::Unparseable {
            column_type: "text".to_string(),
            raw: raw.to_string(),
        });
    }
    Ok(TextMatch::AllOf(patterns))
}

/// Parses `"<TypeName>_<id>"` by splitting on the last underscore.
pub fn polymorphic(raw: &str) -> Result<(String, String), TermError> {
    let unparseable = || TermError::Unparseable {
        column_type: "polymorphic_association".to_string(),
        raw: raw.to_string(),
    };

    let (type_name, id) = raw.trim().rsplit_once('_').ok_or_else(unparseable)?;
    if type_name.is_empty() || id.is_empty() {
        return Err(unparseable());
    }
    Ok((type_name.to_string(), id.to_string()))
}
