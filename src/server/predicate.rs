//! Filters compiled to polars expressions
//!
//! Each condition is filled to a plain boolean, so a null cell never matches a
//! comparison and `Not` only ever inverts true/false.

use crate::datatable::error::{DataTableError, Result};
use crate::datatable::{CellValue, Filter, FilterOp};
use polars::prelude::*;

/// Whitespace-only text counts as blank
const BLANK_PATTERN: &str = r"^\s*$";

/// Build the predicate for `filter` against a frame with `schema`
pub fn compile(filter: &Filter, schema: &Schema) -> Result<Expr> {
    match filter {
        Filter::Condition { column, op, values } => {
            let dtype = schema.get(column.as_str()).ok_or_else(|| {
                DataTableError::InvalidRequest(format!(
                    "filter references unknown column '{}'",
                    column
                ))
            })?;
            Ok(condition(column, dtype, *op, values).fill_null(lit(false)))
        }
        Filter::And { filters } => fold(filters, schema, true, |a, b| a.and(b)),
        Filter::Or { filters } => fold(filters, schema, false, |a, b| a.or(b)),
        Filter::Not { filter } => Ok(compile(filter, schema)?.not()),
    }
}

fn fold(
    filters: &[Filter],
    schema: &Schema,
    empty: bool,
    join: fn(Expr, Expr) -> Expr,
) -> Result<Expr> {
    let mut joined: Option<Expr> = None;
    for filter in filters {
        let expr = compile(filter, schema)?;
        joined = Some(match joined {
            Some(acc) => join(acc, expr),
            None => expr,
        });
    }
    Ok(joined.unwrap_or_else(|| lit(empty)))
}

fn condition(column: &str, dtype: &DataType, op: FilterOp, operands: &[CellValue]) -> Expr {
    let target = col(column);
    match op {
        FilterOp::IsBlank => blank(target, dtype),
        FilterOp::IsNotBlank => blank(target, dtype).not(),
        FilterOp::Contains | FilterOp::StartsWith | FilterOp::EndsWith => {
            let Some(needle) = operands.first().filter(|v| !v.is_null()) else {
                return lit(false);
            };
            let needle = lit(needle.to_string().to_lowercase());
            let haystack = as_text(target, dtype).str().to_lowercase();
            match op {
                FilterOp::Contains => haystack.str().contains_literal(needle),
                FilterOp::StartsWith => haystack.str().starts_with(needle),
                _ => haystack.str().ends_with(needle),
            }
        }
        FilterOp::In => operands
            .iter()
            .map(|o| compare(target.clone(), dtype, FilterOp::Equals, o))
            .reduce(|a, b| a.or(b))
            .unwrap_or_else(|| lit(false)),
        _ => match operands.first() {
            Some(operand) => compare(target, dtype, op, operand),
            None => lit(false),
        },
    }
}

fn compare(target: Expr, dtype: &DataType, op: FilterOp, operand: &CellValue) -> Expr {
    let Some(value) = operand_literal(dtype, operand) else {
        return lit(false);
    };
    let target = if dtype.is_primitive_numeric() || dtype.is_bool() {
        target
    } else {
        as_text(target, dtype)
    };
    match op {
        FilterOp::Equals => target.eq(value),
        FilterOp::NotEquals => target.neq(value),
        FilterOp::GreaterThan => target.gt(value),
        FilterOp::GreaterThanOrEqual => target.gt_eq(value),
        FilterOp::LessThan => target.lt(value),
        FilterOp::LessThanOrEqual => target.lt_eq(value),
        _ => lit(false),
    }
}

/// Operand as a literal of the column's kind; `None` when it cannot match
fn operand_literal(dtype: &DataType, operand: &CellValue) -> Option<Expr> {
    if operand.is_null() {
        return None;
    }
    if dtype.is_primitive_numeric() {
        return match operand {
            CellValue::Int(v) => Some(lit(*v)),
            CellValue::Float(v) => Some(lit(*v)),
            other => other.as_f64().map(lit),
        };
    }
    if dtype.is_bool() {
        return match operand {
            CellValue::Bool(b) => Some(lit(*b)),
            CellValue::Text(s) => s.trim().parse::<bool>().ok().map(lit),
            _ => None,
        };
    }
    Some(lit(operand.to_string()))
}

fn as_text(target: Expr, dtype: &DataType) -> Expr {
    if dtype.is_string() {
        target
    } else {
        target.cast(DataType::String)
    }
}

fn blank(target: Expr, dtype: &DataType) -> Expr {
    if dtype.is_string() {
        target
            .clone()
            .is_null()
            .or(target.str().contains(lit(BLANK_PATTERN), false))
    } else {
        target.is_null()
    }
}
