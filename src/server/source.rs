//! Queryable sources behind a handle
//!
//! A source answers one windowed scan at a time: filter, then sort, then slice.
//! Frame sources run filter and sort as a single lazy polars plan.
//! It reports the post-filter row count when that is cheap to know, which lets
//! the fetch service skip the one-row peek.

use super::predicate;
use crate::datatable::error::{DataTableError, Result};
use crate::datatable::query::{Filter, SortKey, SortOrder};
use crate::datatable::{CellValue, RowBatch};
use polars::prelude::*;
use std::sync::{Arc, PoisonError, RwLock};

/// Window requested from a source
#[derive(Debug, Clone, Copy)]
pub struct ScanWindow<'a> {
    pub offset: usize,
    pub limit: usize,
    pub filter: Option<&'a Filter>,
    pub sort: &'a [SortKey],
}

impl ScanWindow<'_> {
    pub fn has_pushdown(&self) -> bool {
        self.filter.is_some() || !self.sort.is_empty()
    }
}

pub struct ScanResult {
    pub frame: DataFrame,
    /// Row count after filtering, when known without scanning everything
    pub total_rows: Option<usize>,
}

pub trait TableSource: Send + Sync {
    /// Column names and dtypes, in source order
    fn columns(&self) -> Vec<(String, DataType)>;

    fn scan(&self, window: &ScanWindow<'_>) -> Result<ScanResult>;
}

/// One row of a fetched frame, handed to identity selectors
pub struct RowRef<'a> {
    batch: &'a RowBatch,
    row: usize,
}

impl<'a> RowRef<'a> {
    pub fn new(batch: &'a RowBatch, row: usize) -> Self {
        RowRef { batch, row }
    }

    pub fn index(&self) -> usize {
        self.row
    }

    pub fn get(&self, column: &str) -> Option<CellValue> {
        self.batch.value_by_name(self.row, column)
    }
}

/// Computes a row's identity for the hidden key column
pub type RowIdentity = Arc<dyn Fn(&RowRef<'_>) -> Option<CellValue> + Send + Sync>;

/// Identity taken from the value of one column
pub fn column_identity(column: impl Into<String>) -> RowIdentity {
    let column = column.into();
    Arc::new(move |row: &RowRef<'_>| row.get(&column).filter(|v| !v.is_null()))
}

fn frame_columns(df: &DataFrame) -> Vec<(String, DataType)> {
    df.get_columns()
        .iter()
        .map(|c| (c.name().to_string(), c.dtype().clone()))
        .collect()
}

fn check_sort_columns(sort: &[SortKey], known: &[String]) -> Result<()> {
    match sort.iter().find(|k| !known.contains(&k.column)) {
        Some(key) => Err(DataTableError::InvalidRequest(format!(
            "sort references unknown column '{}'",
            key.column
        ))),
        None => Ok(()),
    }
}

/// Stable multi-key sort, nulls last
fn sorted(plan: LazyFrame, sort: &[SortKey]) -> LazyFrame {
    if sort.is_empty() {
        return plan;
    }
    let by: Vec<Expr> = sort.iter().map(|k| col(k.column.as_str())).collect();
    let descending: Vec<bool> = sort.iter().map(|k| k.direction == SortOrder::Desc).collect();
    plan.sort_by_exprs(
        by,
        SortMultipleOptions::default()
            .with_order_descending_multi(descending)
            .with_nulls_last(true)
            .with_maintain_order(true),
    )
}

/// Rows `offset..offset + limit` of `df`, empty past the end
fn window_of(df: DataFrame, offset: usize, limit: usize) -> Result<DataFrame> {
    if offset >= df.height() {
        return Ok(df.clear());
    }
    let start = i64::try_from(offset)
        .map_err(|_| DataTableError::InvalidRequest(format!("offset {} out of range", offset)))?;
    Ok(df.slice(start, limit))
}

/// A live in-memory frame
///
/// The frame can be replaced or appended to between fetches; every scan sees
/// the frame as it is at that moment.
pub struct FrameSource {
    frame: RwLock<DataFrame>,
}

impl FrameSource {
    pub fn new(frame: DataFrame) -> Self {
        FrameSource {
            frame: RwLock::new(frame),
        }
    }

    pub fn replace(&self, frame: DataFrame) {
        *self.frame.write().unwrap_or_else(PoisonError::into_inner) = frame;
    }

    pub fn append(&self, rows: &DataFrame) -> Result<()> {
        let mut guard = self.frame.write().unwrap_or_else(PoisonError::into_inner);
        guard.vstack_mut(rows)?;
        Ok(())
    }

    pub fn height(&self) -> usize {
        self.snapshot().height()
    }

    fn snapshot(&self) -> DataFrame {
        self.frame
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl TableSource for FrameSource {
    fn columns(&self) -> Vec<(String, DataType)> {
        frame_columns(&self.snapshot())
    }

    fn scan(&self, window: &ScanWindow<'_>) -> Result<ScanResult> {
        let df = self.snapshot();
        let schema = df.schema().clone();
        let known: Vec<String> = schema.iter_names().map(|n| n.to_string()).collect();
        check_sort_columns(window.sort, &known)?;

        let mut plan = df.lazy();
        if let Some(filter) = window.filter {
            filter.validate(&known)?;
            plan = plan.filter(predicate::compile(filter, &schema)?);
        }
        let df = sorted(plan, window.sort).collect()?;

        let total = df.height();
        Ok(ScanResult {
            frame: window_of(df, window.offset, window.limit)?,
            total_rows: Some(total),
        })
    }
}

type PageGenerator = dyn Fn(usize, usize) -> Result<DataFrame> + Send + Sync;

/// An unbounded source produced page by page
///
/// There is no cheap count and no pushdown: filtered or sorted scans are
/// rejected as unsupported.
pub struct PagedSource {
    schema: Vec<(String, DataType)>,
    generator: Box<PageGenerator>,
}

impl PagedSource {
    pub fn new<F>(schema: Vec<(String, DataType)>, generator: F) -> Self
    where
        F: Fn(usize, usize) -> Result<DataFrame> + Send + Sync + 'static,
    {
        PagedSource {
            schema,
            generator: Box::new(generator),
        }
    }
}

impl TableSource for PagedSource {
    fn columns(&self) -> Vec<(String, DataType)> {
        self.schema.clone()
    }

    fn scan(&self, window: &ScanWindow<'_>) -> Result<ScanResult> {
        if window.has_pushdown() {
            return Err(DataTableError::Unsupported(
                "paged sources cannot filter or sort".to_string(),
            ));
        }
        let frame = (self.generator)(window.offset, window.limit)?;
        // Generators may overshoot; never hand back more than asked for
        let frame = if frame.height() > window.limit {
            frame.slice(0, window.limit)
        } else {
            frame
        };
        Ok(ScanResult {
            frame,
            total_rows: None,
        })
    }
}

/// Drops columns from another source's output after filter and sort ran
///
/// Filters and sort keys may still reference the dropped columns.
pub struct ProjectedSource {
    inner: Arc<dyn TableSource>,
    removed: Vec<String>,
}

impl ProjectedSource {
    pub fn new(inner: Arc<dyn TableSource>, removed: Vec<String>) -> Self {
        ProjectedSource { inner, removed }
    }

    /// Remove the scaffolding-only columns (`_` followed by a letter)
    pub fn without_scaffolding(inner: Arc<dyn TableSource>) -> Self {
        let removed = inner
            .columns()
            .into_iter()
            .map(|(name, _)| name)
            .filter(|name| crate::datatable::column::is_scaffold_only(name))
            .collect();
        ProjectedSource::new(inner, removed)
    }

    pub fn removed(&self) -> &[String] {
        &self.removed
    }
}

impl TableSource for ProjectedSource {
    fn columns(&self) -> Vec<(String, DataType)> {
        self.inner
            .columns()
            .into_iter()
            .filter(|(name, _)| !self.removed.contains(name))
            .collect()
    }

    fn scan(&self, window: &ScanWindow<'_>) -> Result<ScanResult> {
        let result = self.inner.scan(window)?;
        let keep: Vec<PlSmallStr> = result
            .frame
            .get_column_names()
            .into_iter()
            .filter(|name| !self.removed.iter().any(|r| r.as_str() == name.as_str()))
            .cloned()
            .collect();
        Ok(ScanResult {
            frame: result.frame.select(keep)?,
            total_rows: result.total_rows,
        })
    }
}
