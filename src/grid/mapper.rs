//! Rendered grid coordinates back to logical columns and row identity

use super::arrangement::ColumnArrangement;
use super::cache::ColumnarCache;
use super::link::{classify_link, Navigation};
use crate::config::DataTableConfig;
use crate::datatable::{
    CellClickEventArgs, CellValue, ColType, ColumnSpec, RowAction, RowActionEventArgs,
    HIDDEN_KEY_COLUMN,
};

/// Outcome of an interaction, ready to dispatch
#[derive(Debug, Clone, PartialEq)]
pub enum GridEvent {
    CellClick(CellClickEventArgs),
    CellActivated(CellClickEventArgs),
    Navigate(Navigation),
    RowAction(RowActionEventArgs),
}

pub struct CoordinateMapper<'a> {
    arrangement: &'a ColumnArrangement,
    cache: &'a ColumnarCache,
    config: &'a DataTableConfig,
}

impl<'a> CoordinateMapper<'a> {
    pub fn new(
        arrangement: &'a ColumnArrangement,
        cache: &'a ColumnarCache,
        config: &'a DataTableConfig,
    ) -> Self {
        CoordinateMapper {
            arrangement,
            cache,
            config,
        }
    }

    /// Filler rows pad the container below the cached data
    pub fn is_filler(&self, row: usize) -> bool {
        row >= self.cache.visible_rows()
    }

    fn column(&self, display_col: usize, row: usize) -> Option<&'a ColumnSpec> {
        if self.is_filler(row) {
            return None;
        }
        self.arrangement.column_at(display_col)
    }

    /// `(column name, row)` for a rendered cell
    pub fn logical(&self, display_col: usize, row: usize) -> Option<(&'a str, usize)> {
        self.column(display_col, row)
            .map(|spec| (spec.name.as_str(), row))
    }

    pub fn cell_value(&self, display_col: usize, row: usize) -> Option<CellValue> {
        let spec = self.column(display_col, row)?;
        Some(self.cache.value_at(row, &spec.name).unwrap_or_default())
    }

    /// Hidden key, then the configured id column, then the row index
    pub fn row_identity(&self, row: usize) -> Option<CellValue> {
        if self.is_filler(row) {
            return None;
        }
        let from_hidden = self
            .cache
            .value_at(row, HIDDEN_KEY_COLUMN)
            .filter(|v| !v.is_blank());
        let from_id_column = || {
            self.config
                .id_column_name
                .as_deref()
                .and_then(|name| self.cache.value_at(row, name))
                .filter(|v| !v.is_blank())
        };
        Some(
            from_hidden
                .or_else(from_id_column)
                .unwrap_or(CellValue::Int(row as i64)),
        )
    }

    fn click_args(&self, display_col: usize, row: usize) -> Option<CellClickEventArgs> {
        let spec = self.column(display_col, row)?;
        Some(CellClickEventArgs {
            row_index: row,
            column_index: display_col,
            column_name: spec.name.clone(),
            cell_value: self.cache.value_at(row, &spec.name).unwrap_or_default(),
        })
    }

    /// Single click: link cells navigate, other cells raise a click event
    /// when click events are enabled
    pub fn click(&self, display_col: usize, row: usize) -> Option<GridEvent> {
        let spec = self.column(display_col, row)?;
        if spec.col_type == ColType::Link {
            let target = self.cache.value_at(row, &spec.name)?;
            return classify_link(&target.to_string()).map(GridEvent::Navigate);
        }
        if !self.config.enable_cell_click_events {
            return None;
        }
        self.click_args(display_col, row).map(GridEvent::CellClick)
    }

    /// Double click / enter
    pub fn activate(&self, display_col: usize, row: usize) -> Option<GridEvent> {
        if !self.config.enable_cell_click_events {
            return None;
        }
        self.click_args(display_col, row)
            .map(GridEvent::CellActivated)
    }

    pub fn row_action(&self, row: usize, action: &RowAction) -> Option<GridEvent> {
        let id = self.row_identity(row)?;
        Some(GridEvent::RowAction(RowActionEventArgs {
            id,
            tag: action.action_id().to_string(),
        }))
    }

    /// Selection is refused on filler rows and link cells
    pub fn accepts_selection(&self, display_col: usize, row: usize) -> bool {
        self.column(display_col, row)
            .is_some_and(|spec| spec.col_type != ColType::Link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ViewportConfig;
    use crate::datatable::RowBatch;
    use polars::prelude::*;
    use std::time::Instant;

    struct Fixture {
        arrangement: ColumnArrangement,
        cache: ColumnarCache,
        config: DataTableConfig,
    }

    impl Fixture {
        fn new(frame: DataFrame, columns: Vec<ColumnSpec>, config: DataTableConfig) -> Self {
            let mut arrangement = ColumnArrangement::new(&config, &ViewportConfig::default());
            arrangement.declare(columns, Instant::now());
            let mut cache = ColumnarCache::new();
            cache.append(0, RowBatch::new(frame)).unwrap();
            Fixture {
                arrangement,
                cache,
                config,
            }
        }

        fn mapper(&self) -> CoordinateMapper<'_> {
            CoordinateMapper::new(&self.arrangement, &self.cache, &self.config)
        }
    }

    fn clicks_enabled() -> DataTableConfig {
        DataTableConfig {
            enable_cell_click_events: true,
            ..Default::default()
        }
    }

    fn people(with_key: bool) -> Fixture {
        let mut frame = df!(
            "name" => (0..10).map(|i| format!("n{}", i)).collect::<Vec<_>>(),
            "site" => (0..10).map(|_| "https://example.com".to_string()).collect::<Vec<_>>()
        )
        .unwrap();
        if with_key {
            let keys: Vec<String> = (0..10).map(|i| format!("X{}", i)).collect();
            frame
                .with_column(Series::new(HIDDEN_KEY_COLUMN.into(), keys))
                .unwrap();
        }
        let columns = vec![
            ColumnSpec::new("name", ColType::Text),
            ColumnSpec::new("site", ColType::Link),
        ];
        Fixture::new(frame, columns, clicks_enabled())
    }

    #[test]
    fn test_filler_rows_are_inert() {
        let f = people(false);
        let m = f.mapper();
        assert!(m.is_filler(10));
        assert_eq!(m.click(0, 15), None);
        assert_eq!(m.activate(0, 15), None);
        assert_eq!(m.row_action(15, &RowAction::new("Edit")), None);
        assert!(!m.accepts_selection(0, 15));
        assert_eq!(m.logical(0, 10), None);
    }

    #[test]
    fn test_row_identity_fallback() {
        let f = people(false);
        assert_eq!(
            f.mapper().row_action(7, &RowAction::new("Edit").with_tag("edit")),
            Some(GridEvent::RowAction(RowActionEventArgs {
                id: CellValue::Int(7),
                tag: "edit".into()
            }))
        );

        let f = people(true);
        assert_eq!(
            f.mapper().row_identity(9),
            Some(CellValue::Text("X9".into()))
        );
    }

    #[test]
    fn test_id_column_fallback() {
        let frame = df!("code" => &["A", ""], "qty" => &[1i64, 2]).unwrap();
        let config = DataTableConfig {
            id_column_name: Some("code".into()),
            ..Default::default()
        };
        let f = Fixture::new(frame, vec![ColumnSpec::new("qty", ColType::Number)], config);
        let m = f.mapper();
        assert_eq!(m.row_identity(0), Some(CellValue::Text("A".into())));
        // Blank id value falls back to the index
        assert_eq!(m.row_identity(1), Some(CellValue::Int(1)));
    }

    #[test]
    fn test_display_to_logical_skips_hidden() {
        let frame = df!("a" => &[1i64], "b" => &[2i64], "c" => &[3i64]).unwrap();
        let columns = vec![
            ColumnSpec::new("a", ColType::Number),
            ColumnSpec::new("b", ColType::Number).with_hidden(true),
            ColumnSpec::new("c", ColType::Number),
        ];
        let f = Fixture::new(frame, columns, clicks_enabled());
        let m = f.mapper();
        assert_eq!(m.logical(1, 0), Some(("c", 0)));
        assert_eq!(m.cell_value(1, 0), Some(CellValue::Int(3)));
        assert_eq!(
            m.click(1, 0),
            Some(GridEvent::CellClick(CellClickEventArgs {
                row_index: 0,
                column_index: 1,
                column_name: "c".into(),
                cell_value: CellValue::Int(3),
            }))
        );
    }

    #[test]
    fn test_link_cells_navigate_and_refuse_selection() {
        let f = people(false);
        let m = f.mapper();
        assert_eq!(
            m.click(1, 0),
            Some(GridEvent::Navigate(Navigation::NewContext(
                "https://example.com/".into()
            )))
        );
        assert!(!m.accepts_selection(1, 0));
        assert!(m.accepts_selection(0, 0));
    }

    #[test]
    fn test_unsafe_link_is_silent() {
        let frame = df!("site" => &["javascript:alert(1)"]).unwrap();
        let f = Fixture::new(
            frame,
            vec![ColumnSpec::new("site", ColType::Link)],
            clicks_enabled(),
        );
        assert_eq!(f.mapper().click(0, 0), None);
    }

    #[test]
    fn test_click_events_disabled() {
        let frame = df!("a" => &[1i64]).unwrap();
        let f = Fixture::new(
            frame,
            vec![ColumnSpec::new("a", ColType::Number)],
            DataTableConfig::default(),
        );
        assert_eq!(f.mapper().click(0, 0), None);
        assert_eq!(f.mapper().activate(0, 0), None);
    }
}
