//! Event payloads dispatched from the grid back to application handlers

use super::value::CellValue;
use serde::{Deserialize, Serialize};

/// Payload for both cell click and cell activation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellClickEventArgs {
    pub row_index: usize,
    pub column_index: usize,
    pub column_name: String,
    pub cell_value: CellValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowActionEventArgs {
    /// Row identity: hidden key, id column value, or the row index
    pub id: CellValue,
    pub tag: String,
}

/// Entry of a row's action menu
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowAction {
    pub label: String,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
}

impl RowAction {
    pub fn new(label: impl Into<String>) -> Self {
        RowAction {
            label: label.into(),
            tag: None,
            icon: None,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// Tag reported to handlers; the label when no tag was set
    pub fn action_id(&self) -> &str {
        self.tag.as_deref().unwrap_or(&self.label)
    }
}
