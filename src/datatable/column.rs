//! Column metadata shared by the builder, the wire and the grid

use polars::prelude::DataType;
use serde::{Deserialize, Serialize};

/// Convention name of the per-row identity column; never rendered
pub const HIDDEN_KEY_COLUMN: &str = "_hiddenKey";

/// Rendering hint for a column's cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColType {
    Number,
    #[default]
    Text,
    Boolean,
    Date,
    DateTime,
    Icon,
    Labels,
    Link,
}

impl ColType {
    /// Type hint for a source column dtype
    pub fn for_dtype(dtype: &DataType) -> Self {
        match dtype {
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64 => ColType::Number,
            DataType::Boolean => ColType::Boolean,
            DataType::Date => ColType::Date,
            DataType::Datetime(_, _) => ColType::DateTime,
            DataType::List(inner) if matches!(inner.as_ref(), DataType::String) => {
                ColType::Labels
            }
            _ => ColType::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
    #[default]
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

impl Align {
    /// Numbers align right, booleans center, everything else left
    pub fn for_col_type(col_type: ColType) -> Self {
        match col_type {
            ColType::Number => Align::Right,
            ColType::Boolean => Align::Center,
            _ => Align::Left,
        }
    }
}

/// Declared metadata for one column, joined to live data by `name`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSpec {
    pub name: String,
    #[serde(default)]
    pub header: Option<String>,
    #[serde(rename = "type", default)]
    pub col_type: ColType,
    #[serde(default)]
    pub order: i32,
    /// Tagged size string, see [`crate::datatable::size`]
    #[serde(default)]
    pub width: Option<String>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default = "default_true")]
    pub sortable: bool,
    #[serde(default)]
    pub sort_direction: SortDirection,
    #[serde(default = "default_true")]
    pub filterable: bool,
    #[serde(default)]
    pub align: Align,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub help: Option<String>,
}

fn default_true() -> bool {
    true
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, col_type: ColType) -> Self {
        ColumnSpec {
            name: name.into(),
            header: None,
            col_type,
            order: 0,
            width: None,
            hidden: false,
            sortable: true,
            sort_direction: SortDirection::None,
            filterable: true,
            align: Align::for_col_type(col_type),
            group: None,
            icon: None,
            help: None,
        }
    }

    /// Header text shown in the grid (falls back to the name)
    pub fn title(&self) -> &str {
        self.header.as_deref().unwrap_or(&self.name)
    }

    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = Some(header.into());
        self
    }

    pub fn with_width(mut self, width: impl Into<String>) -> Self {
        self.width = Some(width.into());
        self
    }

    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn with_sort_direction(mut self, direction: SortDirection) -> Self {
        self.sort_direction = direction;
        self
    }
}

/// Columns whose names start with `_` + letter are scaffolding, not data
pub fn is_scaffold_only(name: &str) -> bool {
    if name == HIDDEN_KEY_COLUMN {
        return true;
    }
    let mut chars = name.chars();
    chars.next() == Some('_') && chars.next().is_some_and(|c| c.is_alphabetic())
}

/// Human label for a field name: `firstName` / `first_name` -> `First Name`
pub fn label_for(name: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for c in name.chars() {
        if c == '_' || c == '-' || c == ' ' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }

    words
        .iter()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_hints() {
        assert_eq!(ColType::for_dtype(&DataType::Int32), ColType::Number);
        assert_eq!(ColType::for_dtype(&DataType::Float64), ColType::Number);
        assert_eq!(ColType::for_dtype(&DataType::Boolean), ColType::Boolean);
        assert_eq!(ColType::for_dtype(&DataType::Date), ColType::Date);
        assert_eq!(ColType::for_dtype(&DataType::String), ColType::Text);
        assert_eq!(
            ColType::for_dtype(&DataType::List(Box::new(DataType::String))),
            ColType::Labels
        );
    }

    #[test]
    fn test_label_for() {
        assert_eq!(label_for("firstName"), "First Name");
        assert_eq!(label_for("first_name"), "First Name");
        assert_eq!(label_for("id"), "Id");
        assert_eq!(label_for("URL"), "URL");
    }

    #[test]
    fn test_scaffold_only_names() {
        assert!(is_scaffold_only("_internal"));
        assert!(is_scaffold_only(HIDDEN_KEY_COLUMN));
        assert!(!is_scaffold_only("_"));
        assert!(!is_scaffold_only("_1"));
        assert!(!is_scaffold_only("name"));
    }

    #[test]
    fn test_column_spec_json_defaults() {
        let spec: ColumnSpec =
            serde_json::from_str(r#"{"name":"price","type":"Number"}"#).unwrap();
        assert_eq!(spec.col_type, ColType::Number);
        assert!(spec.sortable);
        assert!(!spec.hidden);
        assert_eq!(spec.title(), "price");
    }
}
