//! `column::value` reference level pairs.

use crate::error::{DaaError, Result};
use serde::{Deserialize, Serialize};

/// Separator between the column and the level in a reference level entry.
pub const PAIR_SEPARATOR: &str = "::";

/// A user-supplied baseline for a categorical column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReferenceLevel {
    pub column: String,
    pub value: String,
}

impl ReferenceLevel {
    pub fn new(column: &str, value: &str) -> Self {
        Self {
            column: column.to_string(),
            value: value.to_string(),
        }
    }

    /// Parse a `column::value` entry.
    ///
    /// Exactly one `::` is allowed. A stray `:` touching the separator is
    /// reported separately from a missing or repeated separator so that the
    /// offending token can be found quickly.
    pub fn parse(entry: &str) -> Result<Self> {
        let syntax = |reason: String| DaaError::ReferenceLevelSyntax {
            entry: entry.to_string(),
            reason,
        };

        let (column, value) = match entry.split_once(PAIR_SEPARATOR) {
            Some(pair) => pair,
            None => {
                return Err(syntax(
                    "too few column-value pair separators; expected exactly one '::' \
                     between the column name and the level value"
                        .to_string(),
                ))
            }
        };

        if value.contains(PAIR_SEPARATOR) {
            return Err(syntax(format!(
                "the level value \"{}\" contains an embedded '::'; only one \
                 column-value pair separator is allowed per entry",
                value
            )));
        }
        if column.starts_with(':') {
            return Err(syntax(format!(
                "the column name \"{}\" has a leading ':'",
                column
            )));
        }
        if value.starts_with(':') {
            return Err(syntax(format!(
                "the level value \"{}\" starts with a stray ':' next to the separator",
                value
            )));
        }
        if column.is_empty() {
            return Err(syntax("the column name is empty".to_string()));
        }
        if value.is_empty() {
            return Err(syntax("the level value is empty".to_string()));
        }

        Ok(Self::new(column, value))
    }
}

impl std::fmt::Display for ReferenceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.column, PAIR_SEPARATOR, self.value)
    }
}

impl std::str::FromStr for ReferenceLevel {
    type Err = DaaError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reason(entry: &str) -> String {
        match ReferenceLevel::parse(entry).unwrap_err() {
            DaaError::ReferenceLevelSyntax { reason, .. } => reason,
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_parse_valid() {
        let r = ReferenceLevel::parse("bodysite::tongue").unwrap();
        assert_eq!(r, ReferenceLevel::new("bodysite", "tongue"));
        assert_eq!(r.to_string(), "bodysite::tongue");

        let r: ReferenceLevel = "body_habitat::UBERON:skin".parse().unwrap();
        assert_eq!(r.value, "UBERON:skin");
    }

    #[test]
    fn test_missing_separator() {
        assert!(reason("bodysite-tongue").contains("too few column-value pair separators"));
        assert!(reason("bodysite:tongue").contains("too few"));
    }

    #[test]
    fn test_embedded_separator_in_value() {
        let r = reason("bodysite::tongue::left");
        assert!(r.contains("embedded '::'"));
        assert!(r.contains("tongue::left"));
    }

    #[test]
    fn test_stray_colons() {
        let r = reason(":bodysite::tongue");
        assert!(r.contains("leading ':'"));
        assert!(r.contains(":bodysite"));

        let r = reason("bodysite:::tongue");
        assert!(r.contains("stray ':'"));
        assert!(r.contains(":tongue"));
    }

    #[test]
    fn test_empty_parts() {
        assert!(reason("::tongue").contains("column name is empty"));
        assert!(reason("bodysite::").contains("level value is empty"));
    }
}
