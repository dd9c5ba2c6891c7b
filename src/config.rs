//! Table, server and viewport configuration
//!
//! `DataTableConfig` travels to the grid as camelCase JSON. It can also be
//! read from a flat string property map, where every key has an explicit
//! default and invalid values fall back to it with a warning.
//! `ServerConfig` comes from `GRIDSTREAM_*` environment variables.

use crate::datatable::error::{DataTableError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Rows per fetch when nothing else is configured
pub const DEFAULT_BATCH_SIZE: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SelectionMode {
    #[default]
    Cells,
    Rows,
    Columns,
}

impl SelectionMode {
    fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "cells" => Some(Self::Cells),
            "rows" => Some(Self::Rows),
            "columns" => Some(Self::Columns),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DataTableConfig {
    pub batch_size: usize,
    /// Fetch with a single oversized window instead of batches
    pub load_all_rows: bool,
    pub allow_sorting: bool,
    pub allow_filtering: bool,
    pub allow_column_reordering: bool,
    pub allow_column_resizing: bool,
    pub allow_copy_selection: bool,
    pub selection_mode: SelectionMode,
    pub show_index_column: bool,
    pub show_groups: bool,
    pub show_column_type_icons: bool,
    pub show_vertical_borders: bool,
    pub enable_cell_click_events: bool,
    pub enable_row_hover: bool,
    pub show_search: bool,
    /// Number of leading display columns that stay pinned
    pub freeze_columns: Option<usize>,
    pub id_column_name: Option<String>,
}

impl Default for DataTableConfig {
    fn default() -> Self {
        DataTableConfig {
            batch_size: DEFAULT_BATCH_SIZE,
            load_all_rows: false,
            allow_sorting: true,
            allow_filtering: true,
            allow_column_reordering: true,
            allow_column_resizing: true,
            allow_copy_selection: true,
            selection_mode: SelectionMode::Cells,
            show_index_column: false,
            show_groups: false,
            show_column_type_icons: true,
            show_vertical_borders: false,
            enable_cell_click_events: false,
            enable_row_hover: false,
            show_search: false,
            freeze_columns: None,
            id_column_name: None,
        }
    }
}

impl DataTableConfig {
    /// Read from a property map, key names as in the JSON form
    pub fn from_properties(properties: &HashMap<String, String>) -> Self {
        let props = PropertyReader::new(properties);
        let d = DataTableConfig::default();

        let batch_size = match props.get_usize("batchSize", d.batch_size) {
            0 => {
                warn!("batchSize must be positive, using default: {}", d.batch_size);
                d.batch_size
            }
            n => n,
        };

        let selection_mode = props
            .get_raw("selectionMode")
            .map(|raw| {
                SelectionMode::parse(raw).unwrap_or_else(|| {
                    warn!(
                        "Invalid selectionMode '{}', using default: {:?}",
                        raw, d.selection_mode
                    );
                    d.selection_mode
                })
            })
            .unwrap_or(d.selection_mode);

        DataTableConfig {
            batch_size,
            load_all_rows: props.get_bool("loadAllRows", d.load_all_rows),
            allow_sorting: props.get_bool("allowSorting", d.allow_sorting),
            allow_filtering: props.get_bool("allowFiltering", d.allow_filtering),
            allow_column_reordering: props
                .get_bool("allowColumnReordering", d.allow_column_reordering),
            allow_column_resizing: props.get_bool("allowColumnResizing", d.allow_column_resizing),
            allow_copy_selection: props.get_bool("allowCopySelection", d.allow_copy_selection),
            selection_mode,
            show_index_column: props.get_bool("showIndexColumn", d.show_index_column),
            show_groups: props.get_bool("showGroups", d.show_groups),
            show_column_type_icons: props
                .get_bool("showColumnTypeIcons", d.show_column_type_icons),
            show_vertical_borders: props.get_bool("showVerticalBorders", d.show_vertical_borders),
            enable_cell_click_events: props
                .get_bool("enableCellClickEvents", d.enable_cell_click_events),
            enable_row_hover: props.get_bool("enableRowHover", d.enable_row_hover),
            show_search: props.get_bool("showSearch", d.show_search),
            freeze_columns: props
                .get_raw("freezeColumns")
                .map(|_| props.get_usize("freezeColumns", 0))
                .filter(|n| *n > 0),
            id_column_name: props.get_raw("idColumnName").map(str::to_string),
        }
    }

    /// Rows requested per fetch, honouring load-all mode
    pub fn fetch_limit(&self) -> usize {
        if self.load_all_rows {
            crate::datatable::LOAD_ALL_ROWS_LIMIT
        } else {
            self.batch_size.max(1)
        }
    }
}

/// Typed access to a string property map with explicit defaults
pub struct PropertyReader<'a> {
    properties: &'a HashMap<String, String>,
}

impl<'a> PropertyReader<'a> {
    pub fn new(properties: &'a HashMap<String, String>) -> Self {
        debug!("PropertyReader: {} properties", properties.len());
        PropertyReader { properties }
    }

    /// Raw value; empty strings count as not set
    pub fn get_raw(&self, name: &str) -> Option<&'a str> {
        self.properties
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn get_string(&self, name: &str, default: &str) -> String {
        self.get_raw(name).unwrap_or(default).to_string()
    }

    pub fn get_usize(&self, name: &str, default: usize) -> usize {
        match self.get_raw(name) {
            Some(raw) => raw.parse::<usize>().unwrap_or_else(|_| {
                warn!(
                    "Invalid integer value for '{}': '{}', using default: {}",
                    name, raw, default
                );
                default
            }),
            None => default,
        }
    }

    pub fn get_bool(&self, name: &str, default: bool) -> bool {
        match self.get_raw(name) {
            Some("true") => true,
            Some("false") => false,
            Some(other) => {
                warn!(
                    "Invalid boolean value for '{}': '{}', using default: {}",
                    name, other, default
                );
                default
            }
            None => default,
        }
    }
}

/// Server process settings
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub address: String,
    pub port: u16,
    /// Handles unused for this long are reaped
    pub idle_timeout: Duration,
    pub max_sources: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            address: "127.0.0.1".to_string(),
            port: 5010,
            idle_timeout: Duration::from_secs(30 * 60),
            max_sources: None,
        }
    }
}

impl ServerConfig {
    /// Read `GRIDSTREAM_ADDRESS`, `GRIDSTREAM_PORT`,
    /// `GRIDSTREAM_IDLE_TIMEOUT_SECS` and `GRIDSTREAM_MAX_SOURCES`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ServerConfig::from_env`] with an injectable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ServerConfig::default();

        let address = lookup("GRIDSTREAM_ADDRESS").unwrap_or(defaults.address);
        let port = parse_var(&lookup, "GRIDSTREAM_PORT")?.unwrap_or(defaults.port);
        let idle_timeout = parse_var::<u64, _>(&lookup, "GRIDSTREAM_IDLE_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.idle_timeout);
        let max_sources = parse_var::<usize, _>(&lookup, "GRIDSTREAM_MAX_SOURCES")?;

        if idle_timeout.is_zero() {
            return Err(DataTableError::Config(
                "GRIDSTREAM_IDLE_TIMEOUT_SECS must be positive".into(),
            ));
        }

        Ok(ServerConfig {
            address,
            port,
            idle_timeout,
            max_sources,
        })
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| DataTableError::Config(format!("{} has invalid value '{}'", key, raw))),
        None => Ok(None),
    }
}

/// Layout constants the prefetch and arrangement logic depend on
#[derive(Debug, Clone, PartialEq)]
pub struct ViewportConfig {
    pub row_height: f64,
    /// Rows from the end of the cache at which scrolling triggers a fetch
    pub scroll_threshold: usize,
    pub resize_debounce: Duration,
    /// Declarations arriving this soon after a reorder are deferred
    pub reorder_settle: Duration,
    pub group_header_height: f64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        ViewportConfig {
            row_height: 34.0,
            scroll_threshold: 10,
            resize_debounce: Duration::from_millis(50),
            reorder_settle: Duration::from_millis(100),
            group_header_height: 36.0,
        }
    }
}
