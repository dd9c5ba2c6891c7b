//! Join declared column metadata with the columns a fetch reported

use crate::datatable::{ColumnInfo, ColumnSize, ColumnSpec};

/// Declared columns drive everything; the server only contributes widths
/// for columns whose declared width is absent or unparsable
pub fn merge_columns(declared: &[ColumnSpec], reported: &[ColumnInfo]) -> Vec<ColumnSpec> {
    declared
        .iter()
        .map(|spec| {
            let mut merged = spec.clone();
            let declared_ok = spec
                .width
                .as_deref()
                .and_then(ColumnSize::parse)
                .is_some();
            if !declared_ok {
                merged.width = reported
                    .iter()
                    .find(|c| c.name == spec.name)
                    .and_then(|c| c.width.clone());
            }
            merged
        })
        .collect()
}
