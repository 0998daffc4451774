//! Threshold classification.
//!
//! Maps a numeric column onto text labels by descending thresholds, the
//! way an advisory report buckets farms into "High" / "Moderate" / "Low"
//! efficiency bands.

use serde::{Deserialize, Serialize};

use crate::error::{FormatError, FormatResult};
use crate::table::{ColumnType, Table, Value};

/// One classification band: values `>= min` (and below any earlier
/// band) get `label`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassRule {
    pub min: f64,
    pub label: String,
}

impl ClassRule {
    pub fn new(min: f64, label: impl Into<String>) -> Self {
        Self {
            min,
            label: label.into(),
        }
    }
}

/// Append a text column labeling each row by the first rule whose `min`
/// the source value reaches; values below every rule get `fallback`.
/// Null source cells stay null.
///
/// Rules are checked in the given order, so callers list them with the
/// highest threshold first.
///
/// # Example
/// ```ignore
/// let rules = vec![ClassRule::new(0.08, "Efficient")];
/// let labeled = classify(&table, "FEI", &rules, "Inefficient", "Efficiency_Class")?;
/// ```
pub fn classify(
    table: &Table,
    source: &str,
    rules: &[ClassRule],
    fallback: &str,
    name: &str,
) -> FormatResult<Table> {
    let idx = table.schema().require(source)?;
    let ty = table.schema().defs()[idx].ty;
    if !matches!(ty, ColumnType::Int | ColumnType::Float) {
        return Err(FormatError::NonNumeric {
            column: source.to_string(),
            ty: ty.to_string(),
        });
    }

    let values = table
        .rows()
        .iter()
        .map(|row| match row[idx].as_f64() {
            None => Value::Null,
            Some(v) => {
                let label = rules
                    .iter()
                    .find(|rule| v >= rule.min)
                    .map(|rule| rule.label.as_str())
                    .unwrap_or(fallback);
                Value::Text(label.to_string())
            }
        })
        .collect();
    table.with_column(name, ColumnType::Text, values)
}
