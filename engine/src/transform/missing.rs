//! Missing-value handling.
//!
//! Survey respondents skip questions; the resulting null cells can be
//! filled with a constant or the column mean, or their rows dropped
//! entirely. Filling never silently invents a value for a column that
//! has no data at all: the mean of an all-null column is a
//! [`DomainError`], not zero.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, FormatError, PipelineResult};
use crate::table::{ColumnType, Table, Value};

/// What to write into null cells.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FillWith {
    /// A fixed replacement value.
    Value { value: Value },

    /// The arithmetic mean of the column's non-null values.
    Mean,
}

/// Replace null cells of one column, leaving other columns and row order
/// untouched.
///
/// Filling with [`FillWith::Mean`] retypes the column to float (the mean
/// of an integer column is generally fractional).
pub fn fill_null(table: &Table, column: &str, with: &FillWith) -> PipelineResult<Table> {
    let idx = table.schema().require(column)?;
    let ty = table.schema().defs()[idx].ty;

    let (replacement, new_ty) = match with {
        FillWith::Value { value } => {
            let value_ty = value.column_type().ok_or(FormatError::TypeMismatch {
                column: column.to_string(),
                expected: ty.to_string(),
                value: String::new(),
            })?;
            (value.clone(), ty.unify(value_ty))
        }
        FillWith::Mean => {
            let mean = column_mean(table, idx)
                .ok_or_else(|| DomainError::EmptyColumnMean(column.to_string()))?;
            (Value::Float(mean), ColumnType::Float)
        }
    };

    let mut rebuilt = Table::new(retyped_schema(table, idx, new_ty));
    for row in table.rows() {
        let mut row = row.clone();
        if row[idx].is_null() {
            row[idx] = replacement.clone();
        } else if new_ty == ColumnType::Float {
            if let Some(f) = row[idx].as_f64() {
                row[idx] = Value::Float(f);
            }
        }
        rebuilt.push_row(row)?;
    }
    Ok(rebuilt)
}

/// Drop every row whose cell in the given column is null, preserving the
/// order of the remaining rows.
pub fn drop_null(table: &Table, column: &str) -> PipelineResult<Table> {
    let idx = table.schema().require(column)?;
    let mut rebuilt = Table::new(table.schema().clone());
    for row in table.rows() {
        if !row[idx].is_null() {
            rebuilt.push_row(row.clone())?;
        }
    }
    Ok(rebuilt)
}

fn column_mean(table: &Table, idx: usize) -> Option<f64> {
    let mut sum = 0.0;
    let mut count = 0usize;
    for row in table.rows() {
        if let Some(v) = row[idx].as_f64() {
            sum += v;
            count += 1;
        }
    }
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

fn retyped_schema(table: &Table, idx: usize, ty: ColumnType) -> crate::table::Schema {
    let mut schema = crate::table::Schema::new();
    for (i, def) in table.schema().defs().iter().enumerate() {
        let col_ty = if i == idx { ty } else { def.ty };
        // Names come from an existing schema, so re-pushing cannot clash.
        let _ = schema.push(def.name.clone(), col_ty);
    }
    schema
}
