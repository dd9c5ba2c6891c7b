//! Binary wire contract for windowed queries
//!
//! Messages are declared by hand with prost derives so no protoc step is
//! needed. Batches stay column-major on the wire: one validity vector and one
//! typed value vector per column.
//!
//! ```text
//! QueryRequest  { source_id, offset, limit, filter_json?, sort[] }
//! QueryResponse { columns[{name, width?}], rows: WireBatch, has_more }
//! WireBatch     { row_count, columns[{name, dtype, validity[], values}] }
//! ```

use super::batch::{ColumnInfo, FetchRequest, FetchResponse, RowBatch};
use super::connection::SourceHandle;
use super::error::{DataTableError, Result};
use super::query::{Filter, SortKey, SortOrder};
use super::value::CellValue;
use polars::prelude::*;
use prost::Message;

/// RPC path the query messages are exchanged on
pub const QUERY_PATH: &str = "/datatable.DataTableService/Query";

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueryRequest {
    #[prost(string, tag = "1")]
    pub source_id: String,
    #[prost(int64, tag = "2")]
    pub offset: i64,
    #[prost(int64, tag = "3")]
    pub limit: i64,
    /// JSON-encoded [`Filter`]
    #[prost(string, optional, tag = "4")]
    pub filter_json: Option<String>,
    #[prost(message, repeated, tag = "5")]
    pub sort: Vec<WireSortKey>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WireSortKey {
    #[prost(string, tag = "1")]
    pub column: String,
    #[prost(bool, tag = "2")]
    pub descending: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueryResponse {
    #[prost(message, repeated, tag = "1")]
    pub columns: Vec<WireColumnInfo>,
    #[prost(message, optional, tag = "2")]
    pub rows: Option<WireBatch>,
    #[prost(bool, tag = "3")]
    pub has_more: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WireColumnInfo {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, optional, tag = "2")]
    pub width: Option<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WireBatch {
    #[prost(uint64, tag = "1")]
    pub row_count: u64,
    #[prost(message, repeated, tag = "2")]
    pub columns: Vec<WireColumn>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum WireDtype {
    Bool = 0,
    Int64 = 1,
    Float64 = 2,
    Text = 3,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WireColumn {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(enumeration = "WireDtype", tag = "2")]
    pub dtype: i32,
    #[prost(bool, repeated, tag = "3")]
    pub validity: Vec<bool>,
    #[prost(oneof = "wire_column::Values", tags = "4, 5, 6, 7")]
    pub values: Option<wire_column::Values>,
}

pub mod wire_column {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Values {
        #[prost(message, tag = "4")]
        Bools(super::BoolValues),
        #[prost(message, tag = "5")]
        Ints(super::Int64Values),
        #[prost(message, tag = "6")]
        Floats(super::Float64Values),
        #[prost(message, tag = "7")]
        Texts(super::TextValues),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BoolValues {
    #[prost(bool, repeated, tag = "1")]
    pub values: Vec<bool>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Int64Values {
    #[prost(int64, repeated, tag = "1")]
    pub values: Vec<i64>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Float64Values {
    #[prost(double, repeated, tag = "1")]
    pub values: Vec<f64>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TextValues {
    #[prost(string, repeated, tag = "1")]
    pub values: Vec<String>,
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

impl QueryRequest {
    pub fn from_fetch(request: &FetchRequest) -> Result<Self> {
        let filter_json = request
            .filter
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| DataTableError::InvalidRequest(format!("filter not encodable: {}", e)))?;

        Ok(QueryRequest {
            source_id: request.source_id.to_string(),
            offset: i64::try_from(request.offset).unwrap_or(i64::MAX),
            limit: i64::try_from(request.limit).unwrap_or(i64::MAX),
            filter_json,
            sort: request
                .sort
                .iter()
                .map(|k| WireSortKey {
                    column: k.column.clone(),
                    descending: k.direction == SortOrder::Desc,
                })
                .collect(),
        })
    }

    pub fn into_fetch(self) -> Result<FetchRequest> {
        if self.offset < 0 || self.limit < 0 {
            return Err(DataTableError::InvalidRequest(format!(
                "negative window: offset={} limit={}",
                self.offset, self.limit
            )));
        }
        let filter = self
            .filter_json
            .as_deref()
            .map(serde_json::from_str::<Filter>)
            .transpose()
            .map_err(|e| DataTableError::InvalidRequest(format!("malformed filter: {}", e)))?;

        Ok(FetchRequest {
            source_id: SourceHandle::from(self.source_id),
            offset: self.offset as usize,
            limit: self.limit as usize,
            filter,
            sort: self
                .sort
                .into_iter()
                .map(|k| SortKey {
                    column: k.column,
                    direction: if k.descending {
                        SortOrder::Desc
                    } else {
                        SortOrder::Asc
                    },
                })
                .collect(),
        })
    }
}

pub fn encode_request(request: &FetchRequest) -> Result<Vec<u8>> {
    Ok(QueryRequest::from_fetch(request)?.encode_to_vec())
}

pub fn decode_request(bytes: &[u8]) -> Result<FetchRequest> {
    QueryRequest::decode(bytes)?.into_fetch()
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

pub fn encode_response(response: &FetchResponse) -> Result<Vec<u8>> {
    let message = QueryResponse {
        columns: response
            .columns
            .iter()
            .map(|c| WireColumnInfo {
                name: c.name.clone(),
                width: c.width.clone(),
            })
            .collect(),
        rows: Some(frame_to_wire(response.batch.frame())?),
        has_more: response.has_more,
    };
    Ok(message.encode_to_vec())
}

pub fn decode_response(bytes: &[u8]) -> Result<FetchResponse> {
    let message = QueryResponse::decode(bytes)?;
    let batch = match message.rows {
        Some(rows) => RowBatch::new(wire_to_frame(rows)?),
        None => RowBatch::empty(),
    };
    Ok(FetchResponse {
        columns: message
            .columns
            .into_iter()
            .map(|c| ColumnInfo {
                name: c.name,
                width: c.width,
            })
            .collect(),
        batch,
        has_more: message.has_more,
    })
}

/// Encode a frame column by column
///
/// Booleans, integers and floats keep their kind; everything else is sent as
/// its display text. An unsigned 64-bit column goes as integers while every
/// value fits in i64, and as text otherwise.
pub fn frame_to_wire(df: &DataFrame) -> Result<WireBatch> {
    let mut columns = Vec::with_capacity(df.width());

    for col in df.get_columns() {
        let series = col.as_materialized_series();
        columns.push(series_to_wire(series)?);
    }

    Ok(WireBatch {
        row_count: df.height() as u64,
        columns,
    })
}

fn series_to_wire(series: &Series) -> Result<WireColumn> {
    let name = series.name().to_string();
    let dtype = series.dtype();

    let (wire_dtype, validity, values) = match dtype {
        DataType::Boolean => {
            let (validity, values) = split_validity(series.bool()?.into_iter());
            (WireDtype::Bool, validity, wire_column::Values::Bools(BoolValues { values }))
        }
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32 => {
            let cast = series.cast(&DataType::Int64)?;
            let (validity, values) = split_validity(cast.i64()?.into_iter());
            (WireDtype::Int64, validity, wire_column::Values::Ints(Int64Values { values }))
        }
        DataType::UInt64 => {
            let unsigned = series.u64()?;
            if unsigned.into_iter().flatten().all(|v| i64::try_from(v).is_ok()) {
                let cast = series.cast(&DataType::Int64)?;
                let (validity, values) = split_validity(cast.i64()?.into_iter());
                (WireDtype::Int64, validity, wire_column::Values::Ints(Int64Values { values }))
            } else {
                // Past i64::MAX: exact digits as text rather than a rounded float
                let (validity, values) =
                    split_validity(unsigned.into_iter().map(|v| v.map(|v| v.to_string())));
                (WireDtype::Text, validity, wire_column::Values::Texts(TextValues { values }))
            }
        }
        DataType::Float32 | DataType::Float64 => {
            let cast = series.cast(&DataType::Float64)?;
            let (validity, values) = split_validity(cast.f64()?.into_iter());
            (
                WireDtype::Float64,
                validity,
                wire_column::Values::Floats(Float64Values { values }),
            )
        }
        DataType::String => {
            let (validity, values) =
                split_validity(series.str()?.into_iter().map(|v| v.map(str::to_string)));
            (WireDtype::Text, validity, wire_column::Values::Texts(TextValues { values }))
        }
        _ => {
            let texts = (0..series.len()).map(|i| match series.get(i) {
                Ok(AnyValue::Null) | Err(_) => None,
                Ok(v) => Some(CellValue::from_any(&v).to_string()),
            });
            let (validity, values) = split_validity(texts);
            (WireDtype::Text, validity, wire_column::Values::Texts(TextValues { values }))
        }
    };

    Ok(WireColumn {
        name,
        dtype: wire_dtype as i32,
        validity,
        values: Some(values),
    })
}

fn split_validity<T: Default>(iter: impl Iterator<Item = Option<T>>) -> (Vec<bool>, Vec<T>) {
    let mut validity = Vec::new();
    let mut values = Vec::new();
    for v in iter {
        validity.push(v.is_some());
        values.push(v.unwrap_or_default());
    }
    (validity, values)
}

fn join_validity<T>(values: Vec<T>, validity: &[bool]) -> Vec<Option<T>> {
    values
        .into_iter()
        .zip(validity.iter())
        .map(|(v, &valid)| if valid { Some(v) } else { None })
        .collect()
}

pub fn wire_to_frame(batch: WireBatch) -> Result<DataFrame> {
    let expected = batch.row_count as usize;
    let mut columns = Vec::with_capacity(batch.columns.len());

    for col in batch.columns {
        let values = col.values.ok_or_else(|| {
            DataTableError::SchemaMismatch(format!("column '{}' carries no values", col.name))
        })?;

        let len = match &values {
            wire_column::Values::Bools(v) => v.values.len(),
            wire_column::Values::Ints(v) => v.values.len(),
            wire_column::Values::Floats(v) => v.values.len(),
            wire_column::Values::Texts(v) => v.values.len(),
        };
        if len != expected || col.validity.len() != expected {
            return Err(DataTableError::SchemaMismatch(format!(
                "column '{}' has {} values / {} validity entries, expected {}",
                col.name,
                len,
                col.validity.len(),
                expected
            )));
        }

        let name: PlSmallStr = col.name.as_str().into();
        let series = match values {
            wire_column::Values::Bools(v) => Series::new(name, join_validity(v.values, &col.validity)),
            wire_column::Values::Ints(v) => Series::new(name, join_validity(v.values, &col.validity)),
            wire_column::Values::Floats(v) => {
                Series::new(name, join_validity(v.values, &col.validity))
            }
            wire_column::Values::Texts(v) => {
                Series::new(name, join_validity(v.values, &col.validity))
            }
        };
        columns.push(series.into_column());
    }

    Ok(DataFrame::new(columns)?)
}
