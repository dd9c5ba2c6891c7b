//! Fluent construction of a bound data table
//!
//! `TableBuilder::new` scaffolds one `ColumnSpec` per source column from its
//! dtype and name; the fluent methods override that metadata. Problems such as
//! unknown column names are collected and reported by `build`.

use super::connection::DataTableConnectionService;
use super::registry::SourceScope;
use super::source::{column_identity, ProjectedSource, RowIdentity, TableSource};
use crate::config::DataTableConfig;
use crate::datatable::column::{is_scaffold_only, label_for};
use crate::datatable::error::{DataTableError, Result};
use crate::datatable::{
    Align, CellClickEventArgs, CellValue, ColType, ColumnSize, ColumnSpec, ConnectionDescriptor,
    RowAction, RowActionEventArgs, SortDirection,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub type CellHandler = Box<dyn Fn(&CellClickEventArgs) + Send + Sync>;
pub type RowActionHandler = Box<dyn Fn(&RowActionEventArgs) + Send + Sync>;
pub type CellAction = Box<dyn Fn(&CellValue) + Send + Sync>;

struct BuilderColumn {
    spec: ColumnSpec,
    removed: bool,
}

pub struct TableBuilder {
    source: Arc<dyn TableSource>,
    columns: Vec<BuilderColumn>,
    config: DataTableConfig,
    identity: Option<RowIdentity>,
    id_column: Option<String>,
    row_actions: Vec<RowAction>,
    on_cell_click: Option<CellHandler>,
    on_cell_activated: Option<CellHandler>,
    on_row_action: Option<RowActionHandler>,
    cell_actions: HashMap<String, CellAction>,
    errors: Vec<String>,
}

impl TableBuilder {
    /// Scaffold column metadata from the source's columns
    pub fn new(source: Arc<dyn TableSource>) -> Self {
        let fields = source.columns();
        let first_order = fields.len() as i32;

        let columns = fields
            .into_iter()
            .enumerate()
            .map(|(i, (name, dtype))| {
                let col_type = ColType::for_dtype(&dtype);
                let removed = is_scaffold_only(&name);
                let mut spec = ColumnSpec::new(name.as_str(), col_type).with_header(label_for(&name));
                spec.order = first_order + i as i32;
                BuilderColumn { spec, removed }
            })
            .collect();

        TableBuilder {
            source,
            columns,
            config: DataTableConfig::default(),
            identity: None,
            id_column: None,
            row_actions: Vec::new(),
            on_cell_click: None,
            on_cell_activated: None,
            on_row_action: None,
            cell_actions: HashMap::new(),
            errors: Vec::new(),
        }
    }

    fn update<F>(mut self, name: &str, f: F) -> Self
    where
        F: FnOnce(&mut BuilderColumn),
    {
        match self.columns.iter_mut().find(|c| c.spec.name == name) {
            Some(column) => f(column),
            None => self.errors.push(format!("unknown column '{}'", name)),
        }
        self
    }

    pub fn header(self, name: &str, label: impl Into<String>) -> Self {
        let label = label.into();
        self.update(name, |c| c.spec.header = Some(label))
    }

    pub fn width(self, name: &str, width: ColumnSize) -> Self {
        self.update(name, |c| c.spec.width = Some(width.to_string()))
    }

    pub fn align(self, name: &str, align: Align) -> Self {
        self.update(name, |c| c.spec.align = align)
    }

    pub fn sortable(self, name: &str, sortable: bool) -> Self {
        self.update(name, |c| c.spec.sortable = sortable)
    }

    pub fn filterable(self, name: &str, filterable: bool) -> Self {
        self.update(name, |c| c.spec.filterable = filterable)
    }

    pub fn icon(self, name: &str, icon: impl Into<String>) -> Self {
        let icon = icon.into();
        self.update(name, |c| c.spec.icon = Some(icon))
    }

    pub fn help(self, name: &str, help: impl Into<String>) -> Self {
        let help = help.into();
        self.update(name, |c| c.spec.help = Some(help))
    }

    pub fn group(self, name: &str, group: impl Into<String>) -> Self {
        let group = group.into();
        self.update(name, |c| c.spec.group = Some(group))
    }

    pub fn sort_direction(self, name: &str, direction: SortDirection) -> Self {
        self.update(name, |c| c.spec.sort_direction = direction)
    }

    pub fn type_hint(self, name: &str, col_type: ColType) -> Self {
        self.update(name, |c| c.spec.col_type = col_type)
    }

    /// Put the named columns first, in this order; also brings back removed ones
    pub fn order(mut self, names: &[&str]) -> Self {
        for (i, name) in names.iter().enumerate() {
            self = self.update(name, |c| {
                c.removed = false;
                c.spec.order = i as i32;
            });
        }
        self
    }

    pub fn hidden(mut self, names: &[&str]) -> Self {
        for name in names {
            self = self.update(name, |c| c.spec.hidden = true);
        }
        self
    }

    pub fn config<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut DataTableConfig),
    {
        f(&mut self.config);
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        if batch_size == 0 {
            self.errors.push("batch size must be positive".to_string());
        } else {
            self.config.batch_size = batch_size;
        }
        self
    }

    pub fn load_all_rows(mut self, load_all: bool) -> Self {
        self.config.load_all_rows = load_all;
        self
    }

    /// Use the named column's value as row identity
    pub fn id_column(mut self, name: &str) -> Self {
        if self.columns.iter().any(|c| c.spec.name == name) {
            self.identity = Some(column_identity(name));
            self.id_column = Some(name.to_string());
        } else {
            self.errors.push(format!("unknown id column '{}'", name));
        }
        self
    }

    /// Custom identity selector
    pub fn identity(mut self, identity: RowIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn row_actions(mut self, actions: Vec<RowAction>) -> Self {
        self.row_actions = actions;
        self
    }

    pub fn on_cell_click<F>(mut self, handler: F) -> Self
    where
        F: Fn(&CellClickEventArgs) + Send + Sync + 'static,
    {
        self.on_cell_click = Some(Box::new(handler));
        self
    }

    pub fn on_cell_activated<F>(mut self, handler: F) -> Self
    where
        F: Fn(&CellClickEventArgs) + Send + Sync + 'static,
    {
        self.on_cell_activated = Some(Box::new(handler));
        self
    }

    pub fn on_row_action<F>(mut self, handler: F) -> Self
    where
        F: Fn(&RowActionEventArgs) + Send + Sync + 'static,
    {
        self.on_row_action = Some(Box::new(handler));
        self
    }

    /// Run `action` with the cell value whenever a cell of `name` is activated
    pub fn on_cell_action<F>(mut self, name: &str, action: F) -> Self
    where
        F: Fn(&CellValue) + Send + Sync + 'static,
    {
        if self.columns.iter().any(|c| c.spec.name == name) {
            self.cell_actions.insert(name.to_string(), Box::new(action));
        } else {
            self.errors.push(format!("unknown column '{}'", name));
        }
        self
    }

    /// Register the source and produce the bound table
    pub fn build(self, service: &DataTableConnectionService) -> Result<(SourceScope, DataTable)> {
        if !self.errors.is_empty() {
            return Err(DataTableError::InvalidRequest(self.errors.join("; ")));
        }

        let mut config = self.config;
        if self.on_cell_click.is_some()
            || self.on_cell_activated.is_some()
            || !self.cell_actions.is_empty()
        {
            config.enable_cell_click_events = true;
        }
        if let Some(id) = &self.id_column {
            config.id_column_name = Some(id.clone());
        }

        let mut visible: Vec<ColumnSpec> = Vec::new();
        let mut removed: Vec<String> = Vec::new();
        for column in self.columns {
            if column.removed {
                // The identity selector still needs its column on the wire
                if self.id_column.as_deref() != Some(column.spec.name.as_str()) {
                    removed.push(column.spec.name);
                }
            } else {
                visible.push(column.spec);
            }
        }
        visible.sort_by_key(|c| c.order);

        let source: Arc<dyn TableSource> = if removed.is_empty() {
            self.source
        } else {
            debug!(?removed, "projecting out removed columns");
            Arc::new(ProjectedSource::new(self.source, removed))
        };

        let (scope, connection) = service.add_source(source, self.identity);
        let table = DataTable {
            connection,
            columns: visible,
            config,
            row_actions: self.row_actions,
            on_cell_click: self.on_cell_click,
            on_cell_activated: self.on_cell_activated,
            on_row_action: self.on_row_action,
            cell_actions: self.cell_actions,
        };
        Ok((scope, table))
    }
}

/// A table bound to a registered source, ready to hand to a grid
pub struct DataTable {
    connection: ConnectionDescriptor,
    columns: Vec<ColumnSpec>,
    config: DataTableConfig,
    row_actions: Vec<RowAction>,
    on_cell_click: Option<CellHandler>,
    on_cell_activated: Option<CellHandler>,
    on_row_action: Option<RowActionHandler>,
    cell_actions: HashMap<String, CellAction>,
}

impl DataTable {
    pub fn connection(&self) -> &ConnectionDescriptor {
        &self.connection
    }

    /// Declared columns sorted by order, removed columns excluded
    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn config(&self) -> &DataTableConfig {
        &self.config
    }

    pub fn row_actions(&self) -> &[RowAction] {
        &self.row_actions
    }

    /// Returns whether a handler ran
    pub fn dispatch_cell_click(&self, args: &CellClickEventArgs) -> bool {
        match &self.on_cell_click {
            Some(handler) => {
                handler(args);
                true
            }
            None => false,
        }
    }

    /// Column cell action first, then the activation handler
    pub fn dispatch_cell_activated(&self, args: &CellClickEventArgs) -> bool {
        let mut handled = false;
        if let Some(action) = self.cell_actions.get(&args.column_name) {
            action(&args.cell_value);
            handled = true;
        }
        if let Some(handler) = &self.on_cell_activated {
            handler(args);
            handled = true;
        }
        handled
    }

    pub fn dispatch_row_action(&self, args: &RowActionEventArgs) -> bool {
        match &self.on_row_action {
            Some(handler) => {
                handler(args);
                true
            }
            None => false,
        }
    }
}
