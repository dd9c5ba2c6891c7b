//! Append-only columnar row cache
//!
//! Batches are kept exactly as fetched (column-major) and never re-fetched.
//! `batch_starts[i]` is the global index of the first row of `batches[i]`, so a
//! lookup is a binary search plus a fast path for the batch hit last time.

use crate::datatable::error::{DataTableError, Result};
use crate::datatable::{CellValue, RowBatch};
use std::cell::Cell;
use tracing::debug;

#[derive(Debug, Default)]
pub struct ColumnarCache {
    batches: Vec<RowBatch>,
    batch_starts: Vec<usize>,
    visible_rows: usize,
    columns: Vec<String>,
    last_hit: Cell<usize>,
}

impl ColumnarCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total cached rows
    pub fn visible_rows(&self) -> usize {
        self.visible_rows
    }

    pub fn is_empty(&self) -> bool {
        self.visible_rows == 0
    }

    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Append a batch that starts at `offset`
    ///
    /// `offset` must equal the current row count. A mismatch is a controller
    /// bug: it panics in debug builds and leaves the cache untouched otherwise.
    pub fn append(&mut self, offset: usize, batch: RowBatch) -> Result<()> {
        debug_assert_eq!(
            offset, self.visible_rows,
            "batch appended at {} but cache holds {} rows",
            offset, self.visible_rows
        );
        if offset != self.visible_rows {
            return Err(DataTableError::Contiguity {
                expected: self.visible_rows,
                actual: offset,
            });
        }

        let names = batch.column_names();
        if self.columns.is_empty() {
            self.columns = names;
        } else if batch.num_columns() > 0 && names != self.columns {
            return Err(DataTableError::SchemaMismatch(format!(
                "expected columns {:?}, got {:?}",
                self.columns, names
            )));
        }

        if batch.is_empty() {
            return Ok(());
        }

        let rows = batch.num_rows();
        self.batch_starts.push(self.visible_rows);
        self.batches.push(batch);
        self.visible_rows += rows;
        debug!(
            offset,
            rows,
            total = self.visible_rows,
            batches = self.batches.len(),
            "cache append"
        );
        Ok(())
    }

    /// Drop everything; safe to call repeatedly
    pub fn reset(&mut self) {
        self.batches.clear();
        self.batch_starts.clear();
        self.columns.clear();
        self.visible_rows = 0;
        self.last_hit.set(0);
    }

    fn locate(&self, index: usize) -> Option<(usize, usize)> {
        if index >= self.visible_rows {
            return None;
        }

        let hint = self.last_hit.get();
        if let (Some(&start), Some(batch)) = (self.batch_starts.get(hint), self.batches.get(hint)) {
            if index >= start && index < start + batch.num_rows() {
                return Some((hint, index - start));
            }
        }

        let batch = match self.batch_starts.binary_search(&index) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        self.last_hit.set(batch);
        Some((batch, index - self.batch_starts[batch]))
    }

    /// Row in column order, `None` past the end
    pub fn row_at(&self, index: usize) -> Option<Vec<CellValue>> {
        let (batch, local) = self.locate(index)?;
        self.batches[batch].row(local)
    }

    pub fn value_at(&self, index: usize, column: &str) -> Option<CellValue> {
        let col = self.column_index(column)?;
        let (batch, local) = self.locate(index)?;
        self.batches[batch].value(local, col)
    }
}
