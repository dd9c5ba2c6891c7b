//! Windowed fetch over registered sources
//!
//! Stateless: every call resolves the handle, scans the live source and
//! computes `has_more` from the source's count or a one-row peek.

use super::registry::SourceRegistry;
use super::source::{RowIdentity, RowRef, ScanWindow};
use crate::datatable::error::{DataTableError, Result};
use crate::datatable::{ColumnInfo, FetchRequest, FetchResponse, RowBatch, HIDDEN_KEY_COLUMN};
use polars::prelude::*;
use tracing::debug;

const MIN_CALCULATED_WIDTH: usize = 80;
const MAX_CALCULATED_WIDTH: usize = 400;
const CHAR_WIDTH_PX: usize = 8;
const CELL_PADDING_PX: usize = 32;

#[derive(Clone)]
pub struct FetchService {
    registry: SourceRegistry,
}

impl FetchService {
    pub fn new(registry: SourceRegistry) -> Self {
        FetchService { registry }
    }

    pub fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse> {
        if request.limit == 0 {
            return Err(DataTableError::InvalidRequest(
                "limit must be greater than zero".to_string(),
            ));
        }

        let resolved = self.registry.resolve(&request.source_id)?;

        // Ask for one extra row; only used when the source has no count
        let window = ScanWindow {
            offset: request.offset,
            limit: request.limit.saturating_add(1),
            filter: request.filter.as_ref(),
            sort: &request.sort,
        };
        let scan = resolved.source.scan(&window)?;

        let mut frame = scan.frame;
        let peeked_extra = frame.height() > request.limit;
        if peeked_extra {
            frame = frame.slice(0, request.limit);
        }
        let returned = frame.height();

        let has_more = returned > 0
            && match scan.total_rows {
                Some(total) => request.offset.saturating_add(returned) < total,
                None => peeked_extra,
            };

        if let Some(identity) = &resolved.identity {
            frame = with_hidden_key(frame, identity)?;
        }

        let columns = if frame.width() > 0 {
            calculated_columns(&frame)
        } else {
            resolved
                .source
                .columns()
                .into_iter()
                .map(|(name, _)| ColumnInfo { name, width: None })
                .collect()
        };

        debug!(
            handle = %request.source_id,
            offset = request.offset,
            limit = request.limit,
            returned,
            has_more,
            "fetch served"
        );

        Ok(FetchResponse {
            columns,
            batch: RowBatch::new(frame),
            has_more,
        })
    }
}

fn with_hidden_key(frame: DataFrame, identity: &RowIdentity) -> Result<DataFrame> {
    let batch = RowBatch::new(frame);
    let keys: Vec<Option<String>> = (0..batch.num_rows())
        .map(|row| identity(&RowRef::new(&batch, row)).map(|v| v.to_string()))
        .collect();

    let mut frame = batch.into_frame();
    frame.with_column(Series::new(HIDDEN_KEY_COLUMN.into(), keys))?;
    Ok(frame)
}

/// Width estimate per column from header and value lengths in this batch
fn calculated_columns(frame: &DataFrame) -> Vec<ColumnInfo> {
    let batch = RowBatch::new(frame.clone());
    frame
        .get_columns()
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            let name = column.name().to_string();
            let longest_value = (0..batch.num_rows())
                .filter_map(|row| batch.value(row, idx))
                .map(|v| v.to_string().chars().count())
                .max()
                .unwrap_or(0);
            let chars = longest_value.max(name.chars().count());
            let px = (chars * CHAR_WIDTH_PX + CELL_PADDING_PX)
                .clamp(MIN_CALCULATED_WIDTH, MAX_CALCULATED_WIDTH);
            ColumnInfo {
                name,
                width: Some(format!("Px:{}", px)),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatable::{CellValue, Filter, SourceHandle};
    use crate::server::source::{column_identity, FrameSource, PagedSource, TableSource};
    use std::sync::Arc;

    fn numbers(n: i64) -> Arc<dyn TableSource> {
        let values: Vec<i64> = (0..n).collect();
        Arc::new(FrameSource::new(df!("n" => values).unwrap()))
    }

    fn setup(
        source: Arc<dyn TableSource>,
        identity: Option<RowIdentity>,
    ) -> (FetchService, SourceHandle) {
        let registry = SourceRegistry::new();
        let handle = registry.register(source, identity);
        (FetchService::new(registry), handle)
    }

    #[test]
    fn test_pages_of_forty_five() {
        let (service, handle) = setup(numbers(45), None);

        let mut seen = Vec::new();
        for offset in [0usize, 20, 40] {
            let response = service
                .fetch(&FetchRequest::new(handle.clone(), offset, 20))
                .unwrap();
            seen.push((response.batch.num_rows(), response.has_more));
        }
        assert_eq!(seen, vec![(20, true), (20, true), (5, false)]);
    }

    #[test]
    fn test_has_more_exact_at_batch_multiple() {
        let (service, handle) = setup(numbers(40), None);
        let response = service
            .fetch(&FetchRequest::new(handle.clone(), 20, 20))
            .unwrap();
        assert_eq!(response.batch.num_rows(), 20);
        assert!(!response.has_more);

        let response = service.fetch(&FetchRequest::new(handle, 40, 20)).unwrap();
        assert!(response.batch.is_empty());
        assert!(!response.has_more);
    }

    #[test]
    fn test_offset_far_past_end() {
        let (service, handle) = setup(numbers(45), None);
        for offset in [45usize, 1_000, usize::MAX] {
            let response = service
                .fetch(&FetchRequest::new(handle.clone(), offset, 20))
                .unwrap();
            assert!(response.batch.is_empty(), "offset {}", offset);
            assert!(!response.has_more, "offset {}", offset);
        }
    }

    #[test]
    fn test_peek_for_uncounted_source() {
        let source = Arc::new(PagedSource::new(
            vec![("n".to_string(), DataType::Int64)],
            |offset, limit| {
                let end = (offset + limit).min(45);
                let values: Vec<i64> = (offset.min(end) as i64..end as i64).collect();
                Ok(df!("n" => values)?)
            },
        ));
        let (service, handle) = setup(source, None);

        let first = service
            .fetch(&FetchRequest::new(handle.clone(), 0, 20))
            .unwrap();
        assert_eq!(first.batch.num_rows(), 20);
        assert!(first.has_more);

        let last = service.fetch(&FetchRequest::new(handle, 40, 20)).unwrap();
        assert_eq!(last.batch.num_rows(), 5);
        assert!(!last.has_more);
    }

    #[test]
    fn test_zero_limit_and_unknown_handle() {
        let (service, handle) = setup(numbers(5), None);
        assert!(matches!(
            service.fetch(&FetchRequest::new(handle, 0, 0)),
            Err(DataTableError::InvalidRequest(_))
        ));
        let err = service
            .fetch(&FetchRequest::new(SourceHandle::generate(), 0, 10))
            .err()
            .unwrap();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_filter_applies_before_window() {
        let (service, handle) = setup(numbers(45), None);
        let request = FetchRequest::new(handle, 0, 20).with_filter(Some(Filter::condition(
            "n",
            crate::datatable::FilterOp::GreaterThanOrEqual,
            vec![CellValue::Int(40)],
        )));
        let response = service.fetch(&request).unwrap();
        assert_eq!(response.batch.num_rows(), 5);
        assert_eq!(response.batch.value(0, 0), Some(CellValue::Int(40)));
        assert!(!response.has_more);
    }

    #[test]
    fn test_hidden_key_column_appended() {
        let source = Arc::new(FrameSource::new(
            df!("code" => &["A1", "B2"], "qty" => &[1i64, 2]).unwrap(),
        ));
        let (service, handle) = setup(source, Some(column_identity("code")));
        let response = service.fetch(&FetchRequest::new(handle, 0, 10)).unwrap();

        assert_eq!(
            response.batch.value_by_name(1, HIDDEN_KEY_COLUMN),
            Some(CellValue::Text("B2".into()))
        );
        assert!(response.columns.iter().any(|c| c.name == HIDDEN_KEY_COLUMN));
    }

    #[test]
    fn test_calculated_widths_are_clamped() {
        let long = "x".repeat(200);
        let source = Arc::new(FrameSource::new(
            df!("a" => &[1i64], "description" => &[long.as_str()]).unwrap(),
        ));
        let (service, handle) = setup(source, None);
        let response = service.fetch(&FetchRequest::new(handle, 0, 10)).unwrap();

        assert_eq!(response.columns[0].width.as_deref(), Some("Px:80"));
        assert_eq!(response.columns[1].width.as_deref(), Some("Px:400"));
    }
}
