//! Row filtering.
//!
//! A [`Predicate`] is a serde-tagged boolean expression over one row's
//! columns. Filtering keeps matching rows in their original order and is
//! idempotent: filtering a filtered table with the same predicate is a
//! no-op.

use std::cmp::Ordering;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{FormatError, FormatResult};
use crate::table::{Schema, Table, Value};

/// Comparison operator for [`Predicate::Compare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

/// A boolean predicate over one row.
///
/// Null cells never satisfy a comparison or pattern match; only
/// [`Predicate::IsNull`] selects them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Predicate {
    /// Compare a column against a literal value.
    Compare {
        column: String,
        op: CompareOp,
        value: Value,
    },

    /// Regex match against a text column.
    Matches { column: String, pattern: String },

    IsNull { column: String },

    NotNull { column: String },

    /// Conjunction.
    All { predicates: Vec<Predicate> },

    /// Disjunction.
    Any { predicates: Vec<Predicate> },

    Not { predicate: Box<Predicate> },
}

impl Predicate {
    pub fn lt(column: impl Into<String>, value: Value) -> Predicate {
        Predicate::Compare {
            column: column.into(),
            op: CompareOp::Lt,
            value,
        }
    }

    pub fn gt(column: impl Into<String>, value: Value) -> Predicate {
        Predicate::Compare {
            column: column.into(),
            op: CompareOp::Gt,
            value,
        }
    }

    pub fn eq(column: impl Into<String>, value: Value) -> Predicate {
        Predicate::Compare {
            column: column.into(),
            op: CompareOp::Eq,
            value,
        }
    }

    pub fn matches(column: impl Into<String>, pattern: impl Into<String>) -> Predicate {
        Predicate::Matches {
            column: column.into(),
            pattern: pattern.into(),
        }
    }

    pub fn all(predicates: Vec<Predicate>) -> Predicate {
        Predicate::All { predicates }
    }

    pub fn any(predicates: Vec<Predicate>) -> Predicate {
        Predicate::Any { predicates }
    }

    pub fn not(predicate: Predicate) -> Predicate {
        Predicate::Not {
            predicate: Box::new(predicate),
        }
    }

    /// All column names referenced by this predicate, deduplicated.
    pub fn columns(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_columns(&mut names);
        names.sort();
        names.dedup();
        names
    }

    fn collect_columns(&self, into: &mut Vec<String>) {
        match self {
            Predicate::Compare { column, .. }
            | Predicate::Matches { column, .. }
            | Predicate::IsNull { column }
            | Predicate::NotNull { column } => into.push(column.clone()),
            Predicate::All { predicates } | Predicate::Any { predicates } => {
                for p in predicates {
                    p.collect_columns(into);
                }
            }
            Predicate::Not { predicate } => predicate.collect_columns(into),
        }
    }

    /// Resolve column indices and compile patterns, failing fast on an
    /// unknown column or a malformed regex.
    fn compile(&self, schema: &Schema) -> FormatResult<Matcher> {
        Ok(match self {
            Predicate::Compare { column, op, value } => Matcher::Compare {
                index: schema.require(column)?,
                op: *op,
                value: value.clone(),
            },
            Predicate::Matches { column, pattern } => Matcher::Matches {
                index: schema.require(column)?,
                regex: Regex::new(pattern).map_err(|e| FormatError::InvalidPattern {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })?,
            },
            Predicate::IsNull { column } => Matcher::IsNull {
                index: schema.require(column)?,
            },
            Predicate::NotNull { column } => Matcher::NotNull {
                index: schema.require(column)?,
            },
            Predicate::All { predicates } => Matcher::All(
                predicates
                    .iter()
                    .map(|p| p.compile(schema))
                    .collect::<FormatResult<_>>()?,
            ),
            Predicate::Any { predicates } => Matcher::Any(
                predicates
                    .iter()
                    .map(|p| p.compile(schema))
                    .collect::<FormatResult<_>>()?,
            ),
            Predicate::Not { predicate } => Matcher::Not(Box::new(predicate.compile(schema)?)),
        })
    }
}

/// A predicate resolved against a schema: indices instead of names,
/// compiled regexes instead of pattern strings.
enum Matcher {
    Compare {
        index: usize,
        op: CompareOp,
        value: Value,
    },
    Matches {
        index: usize,
        regex: Regex,
    },
    IsNull {
        index: usize,
    },
    NotNull {
        index: usize,
    },
    All(Vec<Matcher>),
    Any(Vec<Matcher>),
    Not(Box<Matcher>),
}

impl Matcher {
    fn matches(&self, row: &[Value]) -> bool {
        match self {
            Matcher::Compare { index, op, value } => {
                let ord = match compare_cells(&row[*index], value) {
                    Some(ord) => ord,
                    // Null or type-mismatched comparisons are false.
                    None => return false,
                };
                match op {
                    CompareOp::Lt => ord == Ordering::Less,
                    CompareOp::Le => ord != Ordering::Greater,
                    CompareOp::Gt => ord == Ordering::Greater,
                    CompareOp::Ge => ord != Ordering::Less,
                    CompareOp::Eq => ord == Ordering::Equal,
                    CompareOp::Ne => ord != Ordering::Equal,
                }
            }
            Matcher::Matches { index, regex } => row[*index]
                .as_str()
                .map(|s| regex.is_match(s))
                .unwrap_or(false),
            Matcher::IsNull { index } => row[*index].is_null(),
            Matcher::NotNull { index } => !row[*index].is_null(),
            Matcher::All(inner) => inner.iter().all(|m| m.matches(row)),
            Matcher::Any(inner) => inner.iter().any(|m| m.matches(row)),
            Matcher::Not(inner) => !inner.matches(row),
        }
    }
}

/// Numeric cells compare numerically across int/float; text compares
/// lexically; anything involving null or mixed kinds is incomparable.
fn compare_cells(cell: &Value, value: &Value) -> Option<Ordering> {
    match (cell.as_f64(), value.as_f64()) {
        (Some(a), Some(b)) => a.partial_cmp(&b),
        _ => match (cell.as_str(), value.as_str()) {
            (Some(a), Some(b)) => Some(a.cmp(b)),
            _ => None,
        },
    }
}

/// Keep only the rows matching the predicate, preserving row order.
pub fn filter(table: &Table, predicate: &Predicate) -> FormatResult<Table> {
    let matcher = predicate.compile(table.schema())?;
    let indices: Vec<usize> = table
        .rows()
        .iter()
        .enumerate()
        .filter(|(_, row)| matcher.matches(row))
        .map(|(i, _)| i)
        .collect();
    Ok(table.take_rows(&indices))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{ColumnType, Schema};

    fn pairs_table() -> Table {
        let schema = Schema::from_defs(vec![
            ("Farm1", ColumnType::Text),
            ("Distance", ColumnType::Float),
            ("Distance_km", ColumnType::Float),
        ])
        .unwrap();
        Table::from_rows(
            schema,
            vec![
                vec![
                    Value::Text("Farm A".into()),
                    Value::Float(0.14866),
                    Value::Float(16.5),
                ],
                vec![
                    Value::Text("Farm B".into()),
                    Value::Float(0.18867),
                    Value::Float(20.9),
                ],
                vec![Value::Text("Farm C".into()), Value::Null, Value::Null],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_threshold_filter() {
        // The worked pair is inside 0.15 degrees but outside 16.0 km.
        let by_degrees = filter(
            &pairs_table(),
            &Predicate::lt("Distance", Value::Float(0.15)),
        )
        .unwrap();
        assert_eq!(by_degrees.n_rows(), 1);
        assert_eq!(
            by_degrees.cell(0, "Farm1").unwrap(),
            &Value::Text("Farm A".into())
        );

        let by_km = filter(
            &pairs_table(),
            &Predicate::lt("Distance_km", Value::Float(16.0)),
        )
        .unwrap();
        assert_eq!(by_km.n_rows(), 0);
    }

    #[test]
    fn test_filter_is_idempotent() {
        let predicate = Predicate::gt("Distance", Value::Float(0.15));
        let once = filter(&pairs_table(), &predicate).unwrap();
        let twice = filter(&once, &predicate).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_null_never_matches_comparison() {
        let le_any = filter(
            &pairs_table(),
            &Predicate::lt("Distance", Value::Float(f64::MAX)),
        )
        .unwrap();
        assert_eq!(le_any.n_rows(), 2);

        let nulls = filter(
            &pairs_table(),
            &Predicate::IsNull {
                column: "Distance".into(),
            },
        )
        .unwrap();
        assert_eq!(nulls.n_rows(), 1);
    }

    #[test]
    fn test_text_equality_and_regex() {
        let eq = filter(
            &pairs_table(),
            &Predicate::eq("Farm1", Value::Text("Farm B".into())),
        )
        .unwrap();
        assert_eq!(eq.n_rows(), 1);

        let re = filter(&pairs_table(), &Predicate::matches("Farm1", "^Farm [AB]$")).unwrap();
        assert_eq!(re.n_rows(), 2);
    }

    #[test]
    fn test_combinators() {
        let predicate = Predicate::all(vec![
            Predicate::NotNull {
                column: "Distance".into(),
            },
            Predicate::not(Predicate::eq("Farm1", Value::Text("Farm A".into()))),
        ]);
        let result = filter(&pairs_table(), &predicate).unwrap();
        assert_eq!(result.n_rows(), 1);
        assert_eq!(
            result.cell(0, "Farm1").unwrap(),
            &Value::Text("Farm B".into())
        );
    }

    #[test]
    fn test_unknown_column_fails_fast() {
        let err = filter(&pairs_table(), &Predicate::lt("Dist", Value::Float(1.0))).unwrap_err();
        assert!(matches!(err, FormatError::UnknownColumn(_)));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = filter(&pairs_table(), &Predicate::matches("Farm1", "([")).unwrap_err();
        assert!(matches!(err, FormatError::InvalidPattern { .. }));
    }

    #[test]
    fn test_predicate_json_round_trip() {
        let predicate = Predicate::any(vec![
            Predicate::lt("Distance", Value::Float(0.15)),
            Predicate::matches("Farm1", "C$"),
        ]);
        let json = serde_json::to_string(&predicate).unwrap();
        let parsed: Predicate = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.columns(), predicate.columns());
    }
}
