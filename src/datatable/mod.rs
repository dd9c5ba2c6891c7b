//! Data model shared by the server and the grid
//!
//! Everything that crosses the handle boundary lives here: handles and
//! descriptors, column metadata, filter/sort specs, row batches and the wire
//! encoding of a windowed query.

pub mod batch;
pub mod column;
pub mod connection;
pub mod error;
pub mod events;
pub mod query;
pub mod size;
pub mod value;
pub mod wire;

pub use batch::{ColumnInfo, FetchRequest, FetchResponse, RowBatch, LOAD_ALL_ROWS_LIMIT};
pub use column::{Align, ColType, ColumnSpec, SortDirection, HIDDEN_KEY_COLUMN};
pub use connection::{ConnectionDescriptor, SourceHandle};
pub use error::{DataTableError, Result};
pub use events::{CellClickEventArgs, RowAction, RowActionEventArgs};
pub use query::{Filter, FilterOp, SortKey, SortOrder};
pub use size::ColumnSize;
pub use value::CellValue;
