//! Pipeline recipes.
//!
//! A [`Recipe`] is an ordered list of pipeline [`Step`]s written down as
//! data (serde-tagged JSON), so an exercise's whole
//! load → derive → filter/group → rank chain can be saved, shared and
//! replayed. Execution is strictly sequential and stops at the first
//! error; no step catches or retries another's failure.
//!
//! ## Example recipe
//!
//! ```json
//! {
//!   "description": "Total yield per crop, best first",
//!   "steps": [
//!     { "step": "derive", "name": "Yield",
//!       "expr": { "type": "div",
//!                 "left": { "type": "column", "name": "Production_mt" },
//!                 "right": { "type": "column", "name": "Farm_Area_ha" } } },
//!     { "step": "group_by", "keys": ["Crop"],
//!       "aggregations": [ { "column": "Yield", "agg": "sum", "output": "Total_Yield" } ] },
//!     { "step": "sort", "by": "Total_Yield", "order": "descending" }
//!   ]
//! }
//! ```

pub mod registry;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, PipelineResult};
use crate::rank::{head, sort, SortOrder};
use crate::select::filter::{filter, Predicate};
use crate::select::group::{group_by, AggSpec};
use crate::table::{Schema, Table};
use crate::transform::classify::{classify, ClassRule};
use crate::transform::derive::{degrees_to_km, derive, euclidean_distance};
use crate::transform::expr::Expr;
use crate::transform::missing::{drop_null, fill_null, FillWith};

pub use registry::{RecipeRegistry, StoredRecipe};

/// One pipeline stage, as data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    /// Append a column computed from an arithmetic expression.
    Derive { name: String, expr: Expr },

    /// Append the planar Euclidean distance between two coordinate pairs.
    Distance {
        lat1: String,
        lon1: String,
        lat2: String,
        lon2: String,
        name: String,
    },

    /// Append a kilometer conversion of a degree-valued column.
    DegreesToKm { source: String, name: String },

    /// Replace null cells in one column.
    FillNull { column: String, with: FillWith },

    /// Drop rows with a null cell in one column.
    DropNull { column: String },

    /// Append a text label column from numeric thresholds.
    Classify {
        source: String,
        rules: Vec<ClassRule>,
        fallback: String,
        name: String,
    },

    /// Keep only rows matching a predicate.
    Filter { predicate: Predicate },

    /// Collapse rows sharing a key into aggregates.
    GroupBy {
        keys: Vec<String>,
        aggregations: Vec<AggSpec>,
    },

    /// Stable sort by a column.
    Sort {
        by: String,
        #[serde(default)]
        order: SortOrder,
    },

    /// Keep the first N rows.
    Head { count: usize },

    /// Keep only the named columns, in order.
    Select { columns: Vec<String> },
}

impl Step {
    /// Columns this step reads from its input table.
    fn references(&self) -> Vec<String> {
        match self {
            Step::Derive { expr, .. } => expr.columns(),
            Step::Distance {
                lat1,
                lon1,
                lat2,
                lon2,
                ..
            } => vec![lat1.clone(), lon1.clone(), lat2.clone(), lon2.clone()],
            Step::DegreesToKm { source, .. } => vec![source.clone()],
            Step::FillNull { column, .. } | Step::DropNull { column } => vec![column.clone()],
            Step::Classify { source, .. } => vec![source.clone()],
            Step::Filter { predicate } => predicate.columns(),
            Step::GroupBy { keys, aggregations } => {
                let mut columns = keys.clone();
                columns.extend(aggregations.iter().map(|a| a.column.clone()));
                columns
            }
            Step::Sort { by, .. } => vec![by.clone()],
            Step::Head { .. } => vec![],
            Step::Select { columns } => columns.clone(),
        }
    }

    /// Columns this step adds to (or, for resetting steps, replaces in)
    /// its output table.
    fn produces(&self) -> Vec<String> {
        match self {
            Step::Derive { name, .. }
            | Step::Distance { name, .. }
            | Step::DegreesToKm { name, .. }
            | Step::Classify { name, .. } => vec![name.clone()],
            Step::GroupBy { keys, aggregations } => {
                let mut columns = keys.clone();
                columns.extend(aggregations.iter().map(|a| a.output_name()));
                columns
            }
            Step::Select { columns } => columns.clone(),
            _ => vec![],
        }
    }

    /// Whether the output schema is exactly `produces()` rather than the
    /// input schema plus `produces()`.
    fn resets_columns(&self) -> bool {
        matches!(self, Step::GroupBy { .. } | Step::Select { .. })
    }

    /// Run this step against a table.
    fn apply(&self, table: &Table) -> PipelineResult<Table> {
        match self {
            Step::Derive { name, expr } => Ok(derive(table, name, expr)?),
            Step::Distance {
                lat1,
                lon1,
                lat2,
                lon2,
                name,
            } => Ok(euclidean_distance(table, lat1, lon1, lat2, lon2, name)?),
            Step::DegreesToKm { source, name } => Ok(degrees_to_km(table, source, name)?),
            Step::FillNull { column, with } => fill_null(table, column, with),
            Step::DropNull { column } => drop_null(table, column),
            Step::Classify {
                source,
                rules,
                fallback,
                name,
            } => Ok(classify(table, source, rules, fallback, name)?),
            Step::Filter { predicate } => Ok(filter(table, predicate)?),
            Step::GroupBy { keys, aggregations } => group_by(table, keys, aggregations),
            Step::Sort { by, order } => Ok(sort(table, by, *order)?),
            Step::Head { count } => Ok(head(table, *count)),
            Step::Select { columns } => Ok(table.select(columns)?),
        }
    }
}

/// An ordered, replayable pipeline definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    /// Version of the recipe format.
    #[serde(default = "default_version")]
    pub version: String,

    /// Human-readable description.
    #[serde(default)]
    pub description: String,

    /// Steps, executed in order.
    pub steps: Vec<Step>,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Recipe {
    pub fn new(description: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            version: default_version(),
            description: description.into(),
            steps,
        }
    }

    /// Parse a recipe from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize to a pretty JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Columns the input table must provide: everything referenced by a
    /// step before some earlier step produced it.
    pub fn required_columns(&self) -> Vec<String> {
        let mut produced: HashSet<String> = HashSet::new();
        let mut required = Vec::new();
        let mut reset_seen = false;
        for step in &self.steps {
            for reference in step.references() {
                // References after a group-by/select can only name
                // recipe-produced columns, never input columns.
                if !produced.contains(&reference) && !reset_seen {
                    required.push(reference);
                }
            }
            if step.resets_columns() {
                produced = step.produces().into_iter().collect();
                reset_seen = true;
            } else {
                produced.extend(step.produces());
            }
        }
        required.sort();
        required.dedup();
        required
    }

    /// Check every step's references against the evolving schema,
    /// collecting all missing columns.
    pub fn validate_columns(&self, schema: &Schema) -> Result<(), DomainError> {
        let mut available: HashSet<String> =
            schema.names().into_iter().map(String::from).collect();
        let mut missing = Vec::new();
        for step in &self.steps {
            for reference in step.references() {
                if !available.contains(&reference) {
                    missing.push(reference);
                }
            }
            if step.resets_columns() {
                available = step.produces().into_iter().collect();
            } else {
                available.extend(step.produces());
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            missing.sort();
            missing.dedup();
            Err(DomainError::MissingColumns { columns: missing })
        }
    }

    /// Execute the recipe against a table, step by step. The first
    /// failing step aborts the run.
    pub fn run(&self, table: &Table) -> PipelineResult<Table> {
        self.validate_columns(table.schema())?;
        let mut current = table.clone();
        for step in &self.steps {
            current = step.apply(&current)?;
        }
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::select::group::Aggregate;
    use crate::table::{ColumnType, Value};

    fn farm_table() -> Table {
        let schema = Schema::from_defs(vec![
            ("Crop", ColumnType::Text),
            ("Farm_Area_ha", ColumnType::Float),
            ("Production_mt", ColumnType::Float),
        ])
        .unwrap();
        Table::from_rows(
            schema,
            vec![
                vec![
                    Value::Text("Rice".into()),
                    Value::Float(1.2),
                    Value::Float(4.8),
                ],
                vec![
                    Value::Text("Corn".into()),
                    Value::Float(0.8),
                    Value::Float(2.1),
                ],
                vec![
                    Value::Text("Rice".into()),
                    Value::Float(2.5),
                    Value::Float(10.2),
                ],
                vec![
                    Value::Text("Banana".into()),
                    Value::Float(1.0),
                    Value::Float(7.5),
                ],
            ],
        )
        .unwrap()
    }

    fn yield_recipe() -> Recipe {
        Recipe::new(
            "Total production per crop, best first",
            vec![
                Step::Derive {
                    name: "Yield".into(),
                    expr: Expr::col("Production_mt").div(Expr::col("Farm_Area_ha")),
                },
                Step::GroupBy {
                    keys: vec!["Crop".into()],
                    aggregations: vec![AggSpec::named(
                        "Production_mt",
                        Aggregate::Sum,
                        "Total_Production_mt",
                    )],
                },
                Step::Sort {
                    by: "Total_Production_mt".into(),
                    order: SortOrder::Descending,
                },
                Step::Head { count: 2 },
            ],
        )
    }

    #[test]
    fn test_run_end_to_end() {
        let result = yield_recipe().run(&farm_table()).unwrap();

        assert_eq!(result.n_rows(), 2);
        assert_eq!(result.cell(0, "Crop").unwrap(), &Value::Text("Rice".into()));
        let rice = result
            .cell(0, "Total_Production_mt")
            .unwrap()
            .as_f64()
            .unwrap();
        assert!((rice - 15.0).abs() < 1e-9);
        assert_eq!(
            result.cell(1, "Crop").unwrap(),
            &Value::Text("Banana".into())
        );
    }

    #[test]
    fn test_required_columns() {
        assert_eq!(
            yield_recipe().required_columns(),
            vec!["Crop", "Farm_Area_ha", "Production_mt"]
        );
    }

    #[test]
    fn test_validate_tracks_derived_columns() {
        // "Yield" is produced by the first step, so referencing it later
        // is fine even though the input table has no such column.
        let recipe = Recipe::new(
            "",
            vec![
                Step::Derive {
                    name: "Yield".into(),
                    expr: Expr::col("Production_mt").div(Expr::col("Farm_Area_ha")),
                },
                Step::Sort {
                    by: "Yield".into(),
                    order: SortOrder::Descending,
                },
            ],
        );
        assert!(recipe.validate_columns(farm_table().schema()).is_ok());
    }

    #[test]
    fn test_validate_reports_missing_columns() {
        let recipe = Recipe::new(
            "",
            vec![Step::Sort {
                by: "Distance".into(),
                order: SortOrder::Ascending,
            }],
        );
        let err = recipe
            .validate_columns(farm_table().schema())
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::MissingColumns { columns } if columns == vec!["Distance".to_string()]
        ));
    }

    #[test]
    fn test_group_by_resets_columns() {
        // After the group-by only Crop and the aggregate remain, so a
        // later reference to Production_mt is invalid.
        let recipe = Recipe::new(
            "",
            vec![
                Step::GroupBy {
                    keys: vec!["Crop".into()],
                    aggregations: vec![AggSpec::new("Production_mt", Aggregate::Sum)],
                },
                Step::Sort {
                    by: "Production_mt".into(),
                    order: SortOrder::Ascending,
                },
            ],
        );
        assert!(recipe.validate_columns(farm_table().schema()).is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let recipe = yield_recipe();
        let json = recipe.to_json().unwrap();
        let parsed = Recipe::from_json(&json).unwrap();
        assert_eq!(parsed.version, recipe.version);
        assert_eq!(parsed.steps.len(), recipe.steps.len());
        assert_eq!(parsed.required_columns(), recipe.required_columns());
    }

    #[test]
    fn test_run_stops_at_first_error() {
        let recipe = Recipe::new(
            "",
            vec![
                Step::Filter {
                    predicate: Predicate::matches("Crop", "["),
                },
                Step::Head { count: 1 },
            ],
        );
        assert!(recipe.run(&farm_table()).is_err());
    }
}
