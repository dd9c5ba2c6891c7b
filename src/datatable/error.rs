use polars::prelude::PolarsError;
use thiserror::Error;

/// Errors raised by the data table engine, on both the serving and the grid side
#[derive(Debug, Error)]
pub enum DataTableError {
    /// The source handle was never registered or has already been disposed
    #[error("Connection not found: {0}")]
    ConnectionNotFound(String),

    /// Malformed fetch request (zero limit, unknown column, ...)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The source cannot honour the requested pushdown
    #[error("Unsupported by source: {0}")]
    Unsupported(String),

    /// Columnar engine error
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    /// Wire payload could not be decoded
    #[error("Wire decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    /// Transport failure between grid and server
    #[error("Transport error: {0}")]
    Transport(String),

    /// Configuration error (missing env vars, invalid values, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A batch was appended at an offset that breaks cache contiguity
    #[error("Cache contiguity violated: expected offset {expected}, got {actual}")]
    Contiguity { expected: usize, actual: usize },

    /// A batch arrived with different columns than the cached batches
    #[error("Batch schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl DataTableError {
    /// True when the error means the handle is gone rather than the data being empty
    pub fn is_not_found(&self) -> bool {
        matches!(self, DataTableError::ConnectionNotFound(_))
    }
}

/// Type alias for Results using DataTableError
pub type Result<T> = std::result::Result<T, DataTableError>;
