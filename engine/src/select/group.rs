//! Group-aggregate.
//!
//! Collapses rows sharing a key into one row per distinct key, with one
//! aggregate column per requested `(source, aggregation)` pair. Keys
//! keep first-appearance order, echoing the source row order.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, FormatError, PipelineResult};
use crate::table::{ColumnType, Schema, Table, Value};

/// Supported aggregation functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregate {
    Sum,
    Mean,
    Count,
}

impl Aggregate {
    fn suffix(self) -> &'static str {
        match self {
            Aggregate::Sum => "sum",
            Aggregate::Mean => "mean",
            Aggregate::Count => "count",
        }
    }
}

/// One requested aggregate: a source column, a function, and an optional
/// output column name (defaults to `{column}_{function}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggSpec {
    pub column: String,
    pub agg: Aggregate,
    #[serde(default)]
    pub output: Option<String>,
}

impl AggSpec {
    pub fn new(column: impl Into<String>, agg: Aggregate) -> Self {
        Self {
            column: column.into(),
            agg,
            output: None,
        }
    }

    pub fn named(column: impl Into<String>, agg: Aggregate, output: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            agg,
            output: Some(output.into()),
        }
    }

    pub fn output_name(&self) -> String {
        self.output
            .clone()
            .unwrap_or_else(|| format!("{}_{}", self.column, self.agg.suffix()))
    }
}

/// Transient row grouping: key cells plus member row indices, in
/// first-appearance order. Discarded once the aggregates are computed.
struct Groups {
    keys: Vec<Vec<Value>>,
    members: Vec<Vec<usize>>,
}

impl Groups {
    fn build(table: &Table, key_indices: &[usize]) -> Groups {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut groups = Groups {
            keys: Vec::new(),
            members: Vec::new(),
        };
        for (row_idx, row) in table.rows().iter().enumerate() {
            let key: String = key_indices
                .iter()
                .map(|&i| row[i].group_key())
                .collect::<Vec<_>>()
                .join("\u{1f}");
            let slot = *index.entry(key).or_insert_with(|| {
                groups
                    .keys
                    .push(key_indices.iter().map(|&i| row[i].clone()).collect());
                groups.members.push(Vec::new());
                groups.keys.len() - 1
            });
            groups.members[slot].push(row_idx);
        }
        groups
    }
}

/// Group a table by one or more key columns and aggregate.
///
/// Aggregates skip null cells. The mean of a group with no non-null
/// values is undefined and raises a [`DomainError`]; it is never
/// silently reported as zero. A sum over no non-null values is null,
/// and a count over them is zero.
///
/// # Example
/// ```ignore
/// let summary = group_by(
///     &table,
///     &["Crop"],
///     &[
///         AggSpec::named("Yield", Aggregate::Sum, "Total_Yield"),
///         AggSpec::named("Yield", Aggregate::Mean, "Average_Yield"),
///     ],
/// )?;
/// ```
pub fn group_by<S: AsRef<str>>(
    table: &Table,
    keys: &[S],
    aggregations: &[AggSpec],
) -> PipelineResult<Table> {
    let mut key_indices = Vec::with_capacity(keys.len());
    for key in keys {
        key_indices.push(table.schema().require(key.as_ref())?);
    }

    let mut agg_indices = Vec::with_capacity(aggregations.len());
    for spec in aggregations {
        let idx = table.schema().require(&spec.column)?;
        let ty = table.schema().defs()[idx].ty;
        if spec.agg != Aggregate::Count && ty == ColumnType::Text {
            return Err(FormatError::NonNumeric {
                column: spec.column.clone(),
                ty: ty.to_string(),
            }
            .into());
        }
        agg_indices.push(idx);
    }

    let mut schema = Schema::new();
    for &i in &key_indices {
        let def = &table.schema().defs()[i];
        schema.push(def.name.clone(), def.ty)?;
    }
    for (spec, &idx) in aggregations.iter().zip(&agg_indices) {
        let ty = match spec.agg {
            Aggregate::Sum => table.schema().defs()[idx].ty,
            Aggregate::Mean => ColumnType::Float,
            Aggregate::Count => ColumnType::Int,
        };
        schema.push(spec.output_name(), ty)?;
    }

    let groups = Groups::build(table, &key_indices);

    let mut result = Table::new(schema);
    for (key, members) in groups.keys.iter().zip(&groups.members) {
        let mut row: Vec<Value> = key.clone();
        for (spec, &idx) in aggregations.iter().zip(&agg_indices) {
            row.push(aggregate_cells(table, members, idx, spec, key)?);
        }
        result.push_row(row)?;
    }
    Ok(result)
}

fn aggregate_cells(
    table: &Table,
    members: &[usize],
    column: usize,
    spec: &AggSpec,
    key: &[Value],
) -> PipelineResult<Value> {
    let cells = members.iter().map(|&i| &table.rows()[i][column]);
    match spec.agg {
        Aggregate::Count => {
            let count = cells.filter(|c| !c.is_null()).count();
            Ok(Value::Int(count as i64))
        }
        Aggregate::Sum => {
            if table.schema().defs()[column].ty == ColumnType::Int {
                let mut sum = 0i64;
                let mut seen = false;
                for cell in cells {
                    if let Value::Int(i) = cell {
                        sum += i;
                        seen = true;
                    }
                }
                Ok(if seen { Value::Int(sum) } else { Value::Null })
            } else {
                let mut sum = 0.0;
                let mut seen = false;
                for cell in cells {
                    if let Some(v) = cell.as_f64() {
                        sum += v;
                        seen = true;
                    }
                }
                Ok(if seen { Value::Float(sum) } else { Value::Null })
            }
        }
        Aggregate::Mean => {
            let mut sum = 0.0;
            let mut count = 0usize;
            for cell in cells {
                if let Some(v) = cell.as_f64() {
                    sum += v;
                    count += 1;
                }
            }
            if count == 0 {
                let rendered: Vec<String> = key.iter().map(|v| v.render()).collect();
                return Err(DomainError::EmptyGroupMean {
                    column: spec.column.clone(),
                    key: rendered.join(", "),
                }
                .into());
            }
            Ok(Value::Float(sum / count as f64))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;

    fn crop_table() -> Table {
        let schema = Schema::from_defs(vec![
            ("Crop", ColumnType::Text),
            ("Yield", ColumnType::Float),
        ])
        .unwrap();
        Table::from_rows(
            schema,
            vec![
                vec![Value::Text("Rice".into()), Value::Float(4.8)],
                vec![Value::Text("Corn".into()), Value::Float(2.1)],
                vec![Value::Text("Rice".into()), Value::Float(10.2)],
                vec![Value::Text("Banana".into()), Value::Float(7.5)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_group_sum_matches_worked_example() {
        let summary = group_by(
            &crop_table(),
            &["Crop"],
            &[AggSpec::named("Yield", Aggregate::Sum, "Total_Yield")],
        )
        .unwrap();

        // First-appearance key order: Rice, Corn, Banana.
        assert_eq!(summary.n_rows(), 3);
        assert_eq!(summary.cell(0, "Crop").unwrap(), &Value::Text("Rice".into()));
        let rice = summary.cell(0, "Total_Yield").unwrap().as_f64().unwrap();
        assert!((rice - 15.0).abs() < 1e-9);
        assert_eq!(summary.cell(1, "Total_Yield").unwrap(), &Value::Float(2.1));
        assert_eq!(summary.cell(2, "Total_Yield").unwrap(), &Value::Float(7.5));
    }

    #[test]
    fn test_single_group_sum_equals_column_sum() {
        let schema = Schema::from_defs(vec![
            ("Region", ColumnType::Text),
            ("Production_mt", ColumnType::Float),
        ])
        .unwrap();
        let table = Table::from_rows(
            schema,
            vec![
                vec![Value::Text("III".into()), Value::Float(4.8)],
                vec![Value::Text("III".into()), Value::Float(2.1)],
                vec![Value::Text("III".into()), Value::Float(10.2)],
            ],
        )
        .unwrap();

        let summary = group_by(
            &table,
            &["Region"],
            &[AggSpec::new("Production_mt", Aggregate::Sum)],
        )
        .unwrap();
        assert_eq!(summary.n_rows(), 1);
        let total = summary
            .cell(0, "Production_mt_sum")
            .unwrap()
            .as_f64()
            .unwrap();
        assert!((total - 17.1).abs() < 1e-9);
    }

    #[test]
    fn test_mean_and_count_skip_nulls() {
        let schema = Schema::from_defs(vec![
            ("Crop", ColumnType::Text),
            ("Yield", ColumnType::Float),
        ])
        .unwrap();
        let table = Table::from_rows(
            schema,
            vec![
                vec![Value::Text("Rice".into()), Value::Float(4.0)],
                vec![Value::Text("Rice".into()), Value::Null],
                vec![Value::Text("Rice".into()), Value::Float(8.0)],
            ],
        )
        .unwrap();

        let summary = group_by(
            &table,
            &["Crop"],
            &[
                AggSpec::new("Yield", Aggregate::Mean),
                AggSpec::new("Yield", Aggregate::Count),
            ],
        )
        .unwrap();
        assert_eq!(summary.cell(0, "Yield_mean").unwrap(), &Value::Float(6.0));
        assert_eq!(summary.cell(0, "Yield_count").unwrap(), &Value::Int(2));
    }

    #[test]
    fn test_mean_of_all_null_group_is_domain_error() {
        let schema = Schema::from_defs(vec![
            ("Crop", ColumnType::Text),
            ("Yield", ColumnType::Float),
        ])
        .unwrap();
        let table = Table::from_rows(
            schema,
            vec![vec![Value::Text("Rice".into()), Value::Null]],
        )
        .unwrap();

        let err = group_by(
            &table,
            &["Crop"],
            &[AggSpec::new("Yield", Aggregate::Mean)],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Domain(DomainError::EmptyGroupMean { .. })
        ));
    }

    #[test]
    fn test_sum_over_text_column_rejected() {
        let err = group_by(
            &crop_table(),
            &["Crop"],
            &[AggSpec::new("Crop", Aggregate::Sum)],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Format(FormatError::NonNumeric { .. })
        ));
    }

    #[test]
    fn test_int_sum_stays_int() {
        let schema = Schema::from_defs(vec![
            ("Crop", ColumnType::Text),
            ("Labor_days", ColumnType::Int),
        ])
        .unwrap();
        let table = Table::from_rows(
            schema,
            vec![
                vec![Value::Text("Tomato".into()), Value::Int(15)],
                vec![Value::Text("Tomato".into()), Value::Int(12)],
            ],
        )
        .unwrap();

        let summary = group_by(
            &table,
            &["Crop"],
            &[AggSpec::new("Labor_days", Aggregate::Sum)],
        )
        .unwrap();
        assert_eq!(summary.cell(0, "Labor_days_sum").unwrap(), &Value::Int(27));
    }

    #[test]
    fn test_multi_key_grouping() {
        let schema = Schema::from_defs(vec![
            ("Region", ColumnType::Text),
            ("Crop", ColumnType::Text),
            ("Production_mt", ColumnType::Float),
        ])
        .unwrap();
        let table = Table::from_rows(
            schema,
            vec![
                vec![
                    Value::Text("III".into()),
                    Value::Text("Rice".into()),
                    Value::Float(10.2),
                ],
                vec![
                    Value::Text("IV-A".into()),
                    Value::Text("Rice".into()),
                    Value::Float(4.8),
                ],
                vec![
                    Value::Text("III".into()),
                    Value::Text("Rice".into()),
                    Value::Float(2.0),
                ],
            ],
        )
        .unwrap();

        let summary = group_by(
            &table,
            &["Region", "Crop"],
            &[AggSpec::new("Production_mt", Aggregate::Sum)],
        )
        .unwrap();
        assert_eq!(summary.n_rows(), 2);
        assert_eq!(
            summary.cell(0, "Production_mt_sum").unwrap(),
            &Value::Float(12.2)
        );
    }
}
