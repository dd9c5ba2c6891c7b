//! Filters and sort keys pushed down to the server
//!
//! The grid treats both as opaque values: it only compares them to decide
//! whether the cache must be reset. The server compiles filters into polars
//! expressions.

use super::error::{DataTableError, Result};
use super::value::CellValue;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Contains,
    StartsWith,
    EndsWith,
    In,
    IsBlank,
    IsNotBlank,
}

impl FilterOp {
    /// Number of operands the op needs, `None` for any number (at least one)
    fn arity(&self) -> Option<usize> {
        match self {
            FilterOp::IsBlank | FilterOp::IsNotBlank => Some(0),
            FilterOp::In => None,
            _ => Some(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Filter {
    Condition {
        column: String,
        op: FilterOp,
        #[serde(default)]
        values: Vec<CellValue>,
    },
    And {
        filters: Vec<Filter>,
    },
    Or {
        filters: Vec<Filter>,
    },
    Not {
        filter: Box<Filter>,
    },
}

impl Filter {
    pub fn condition(column: impl Into<String>, op: FilterOp, values: Vec<CellValue>) -> Self {
        Filter::Condition {
            column: column.into(),
            op,
            values,
        }
    }

    pub fn equals(column: impl Into<String>, value: impl Into<CellValue>) -> Self {
        Filter::condition(column, FilterOp::Equals, vec![value.into()])
    }

    /// Check columns exist and every condition has the operands its op needs
    pub fn validate(&self, known_columns: &[String]) -> Result<()> {
        match self {
            Filter::Condition { column, op, values } => {
                if !known_columns.iter().any(|c| c == column) {
                    return Err(DataTableError::InvalidRequest(format!(
                        "filter references unknown column '{}'",
                        column
                    )));
                }
                let ok = match op.arity() {
                    Some(n) => values.len() == n,
                    None => !values.is_empty(),
                };
                if !ok {
                    return Err(DataTableError::InvalidRequest(format!(
                        "filter {:?} on '{}' has {} operand(s)",
                        op,
                        column,
                        values.len()
                    )));
                }
                Ok(())
            }
            Filter::And { filters } | Filter::Or { filters } => {
                filters.iter().try_for_each(|f| f.validate(known_columns))
            }
            Filter::Not { filter } => filter.validate(known_columns),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortKey {
    pub column: String,
    pub direction: SortOrder,
}

impl SortKey {
    pub fn asc(column: impl Into<String>) -> Self {
        SortKey {
            column: column.into(),
            direction: SortOrder::Asc,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        SortKey {
            column: column.into(),
            direction: SortOrder::Desc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_unknown_column_and_arity() {
        let known = vec!["a".to_string()];
        assert!(Filter::equals("a", 1i64).validate(&known).is_ok());

        let err = Filter::equals("zzz", 1i64).validate(&known).unwrap_err();
        assert!(matches!(err, DataTableError::InvalidRequest(_)));

        let bad = Filter::condition("a", FilterOp::Equals, vec![]);
        assert!(bad.validate(&known).is_err());
    }

    #[test]
    fn test_filter_json_shape() {
        let f = Filter::equals("status", "open");
        let json = serde_json::to_string(&f).unwrap();
        assert_eq!(
            json,
            r#"{"type":"condition","column":"status","op":"Equals","values":["open"]}"#
        );
        let back: Filter = serde_json::from_str(&json).unwrap();
        assert_eq!(back, f);
    }
}
