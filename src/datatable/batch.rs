//! Fetch request/response and the columnar row batch they carry

use super::connection::SourceHandle;
use super::query::{Filter, SortKey};
use super::value::CellValue;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Limit substituted for the batch size when a table loads all rows at once
pub const LOAD_ALL_ROWS_LIMIT: usize = 1_000_000;

/// One column-major window of fetch results
#[derive(Debug, Clone, Default)]
pub struct RowBatch {
    frame: DataFrame,
}

impl RowBatch {
    pub fn new(frame: DataFrame) -> Self {
        RowBatch { frame }
    }

    pub fn empty() -> Self {
        RowBatch {
            frame: DataFrame::empty(),
        }
    }

    pub fn num_rows(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    pub fn num_columns(&self) -> usize {
        self.frame.width()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.frame.get_column_index(name)
    }

    /// Cell at (row, column index), `None` when either is out of bounds
    pub fn value(&self, row: usize, column: usize) -> Option<CellValue> {
        if row >= self.num_rows() {
            return None;
        }
        let col = self.frame.get_columns().get(column)?;
        col.get(row).ok().map(|v| CellValue::from_any(&v))
    }

    pub fn value_by_name(&self, row: usize, name: &str) -> Option<CellValue> {
        self.value(row, self.column_index(name)?)
    }

    /// Row materialized in column order
    pub fn row(&self, row: usize) -> Option<Vec<CellValue>> {
        if row >= self.num_rows() {
            return None;
        }
        (0..self.num_columns())
            .map(|c| self.value(row, c))
            .collect()
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn into_frame(self) -> DataFrame {
        self.frame
    }
}

impl From<DataFrame> for RowBatch {
    fn from(frame: DataFrame) -> Self {
        RowBatch::new(frame)
    }
}

/// Column as reported by the fetch service, with its calculated width
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub width: Option<String>,
}

/// One windowed query against a registered source
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub source_id: SourceHandle,
    pub offset: usize,
    pub limit: usize,
    pub filter: Option<Filter>,
    pub sort: Vec<SortKey>,
}

impl FetchRequest {
    pub fn new(source_id: SourceHandle, offset: usize, limit: usize) -> Self {
        FetchRequest {
            source_id,
            offset,
            limit,
            filter: None,
            sort: Vec::new(),
        }
    }

    pub fn with_filter(mut self, filter: Option<Filter>) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_sort(mut self, sort: Vec<SortKey>) -> Self {
        self.sort = sort;
        self
    }
}

#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub columns: Vec<ColumnInfo>,
    pub batch: RowBatch,
    pub has_more: bool,
}
