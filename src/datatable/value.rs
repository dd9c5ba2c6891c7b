//! Cell values crossing the grid boundary
//!
//! Batches stay columnar (polars) on both sides; `CellValue` is only materialized
//! for single-cell reads, event payloads and filter operands.

use polars::prelude::AnyValue;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl CellValue {
    /// Convert a polars scalar into a cell value
    ///
    /// Integer widths collapse to i64, floats to f64; temporal and nested types
    /// use their display form, as do u64 values past i64::MAX.
    pub fn from_any(value: &AnyValue<'_>) -> Self {
        match value {
            AnyValue::Null => CellValue::Null,
            AnyValue::Boolean(b) => CellValue::Bool(*b),
            AnyValue::Int8(v) => CellValue::Int(*v as i64),
            AnyValue::Int16(v) => CellValue::Int(*v as i64),
            AnyValue::Int32(v) => CellValue::Int(*v as i64),
            AnyValue::Int64(v) => CellValue::Int(*v),
            AnyValue::UInt8(v) => CellValue::Int(*v as i64),
            AnyValue::UInt16(v) => CellValue::Int(*v as i64),
            AnyValue::UInt32(v) => CellValue::Int(*v as i64),
            AnyValue::UInt64(v) => match i64::try_from(*v) {
                Ok(v) => CellValue::Int(v),
                Err(_) => CellValue::Text(v.to_string()),
            },
            AnyValue::Float32(v) => CellValue::Float(*v as f64),
            AnyValue::Float64(v) => CellValue::Float(*v),
            AnyValue::String(s) => CellValue::Text((*s).to_string()),
            AnyValue::StringOwned(s) => CellValue::Text(s.to_string()),
            other => CellValue::Text(other.to_string().trim_matches('"').to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Null or an empty string
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Numeric reading of the value; text is parsed
    pub(crate) fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Int(v) => Some(*v as f64),
            CellValue::Float(v) => Some(*v),
            CellValue::Text(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::Bool(b) => write!(f, "{}", b),
            CellValue::Int(v) => write!(f, "{}", v),
            CellValue::Float(v) => write!(f, "{}", v),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Int(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Float(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Bool(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_any_value() {
        assert_eq!(CellValue::from_any(&AnyValue::Int32(7)), CellValue::Int(7));
        assert_eq!(
            CellValue::from_any(&AnyValue::Float32(1.5)),
            CellValue::Float(1.5)
        );
        assert_eq!(
            CellValue::from_any(&AnyValue::String("abc")),
            CellValue::Text("abc".into())
        );
        assert_eq!(CellValue::from_any(&AnyValue::Null), CellValue::Null);
        assert_eq!(
            CellValue::from_any(&AnyValue::UInt64(u64::MAX)),
            CellValue::Text("18446744073709551615".into())
        );
    }

    #[test]
    fn test_numeric_reading() {
        assert_eq!(CellValue::Int(3).as_f64(), Some(3.0));
        assert_eq!(CellValue::Text(" 2.5 ".into()).as_f64(), Some(2.5));
        assert_eq!(CellValue::Text("n/a".into()).as_f64(), None);
        assert_eq!(CellValue::Null.as_f64(), None);
    }

    #[test]
    fn test_serde_untagged() {
        let json = serde_json::to_string(&vec![
            CellValue::Int(7),
            CellValue::Text("X9".into()),
            CellValue::Null,
        ])
        .unwrap();
        assert_eq!(json, r#"[7,"X9",null]"#);

        let back: Vec<CellValue> = serde_json::from_str(&json).unwrap();
        assert_eq!(back[0], CellValue::Int(7));
        assert_eq!(back[2], CellValue::Null);
    }
}
