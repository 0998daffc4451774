//! Arithmetic expression DSL.
//!
//! An [`Expr`] describes an element-wise computation over a row's numeric
//! columns. Expressions are plain data (serde-tagged), so a derivation
//! can be written down in a recipe JSON file and replayed later.
//!
//! Numeric policy, applied uniformly: a null operand propagates null,
//! and division by zero yields the IEEE sentinel (`inf`, or `NaN` for
//! `0/0`) rather than failing the pipeline. Survey data legitimately
//! contains zero denominators (a farm with zero labor days), so the
//! sentinel lands in the derived cell and the caller decides what to do
//! with it.

use serde::{Deserialize, Serialize};

use crate::error::{FormatError, FormatResult};
use crate::table::{Schema, Value};

/// An arithmetic expression over named columns.
///
/// # Example
/// ```ignore
/// // Yield_mt_per_ha = Production_mt / Farm_Area_ha
/// let expr = Expr::col("Production_mt").div(Expr::col("Farm_Area_ha"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Expr {
    /// Reference to a numeric column.
    Column { name: String },

    /// A numeric literal.
    Literal { value: f64 },

    Add { left: Box<Expr>, right: Box<Expr> },

    Sub { left: Box<Expr>, right: Box<Expr> },

    Mul { left: Box<Expr>, right: Box<Expr> },

    /// Division; a zero divisor produces an infinite or NaN sentinel.
    Div { left: Box<Expr>, right: Box<Expr> },

    Sqrt { of: Box<Expr> },

    Pow { base: Box<Expr>, exponent: f64 },

    /// Round to a fixed number of decimal digits.
    Round { of: Box<Expr>, digits: u32 },
}

impl Expr {
    pub fn col(name: impl Into<String>) -> Expr {
        Expr::Column { name: name.into() }
    }

    pub fn lit(value: f64) -> Expr {
        Expr::Literal { value }
    }

    pub fn add(self, right: Expr) -> Expr {
        Expr::Add {
            left: Box::new(self),
            right: Box::new(right),
        }
    }

    pub fn sub(self, right: Expr) -> Expr {
        Expr::Sub {
            left: Box::new(self),
            right: Box::new(right),
        }
    }

    pub fn mul(self, right: Expr) -> Expr {
        Expr::Mul {
            left: Box::new(self),
            right: Box::new(right),
        }
    }

    pub fn div(self, right: Expr) -> Expr {
        Expr::Div {
            left: Box::new(self),
            right: Box::new(right),
        }
    }

    pub fn sqrt(self) -> Expr {
        Expr::Sqrt { of: Box::new(self) }
    }

    pub fn pow(self, exponent: f64) -> Expr {
        Expr::Pow {
            base: Box::new(self),
            exponent,
        }
    }

    pub fn round(self, digits: u32) -> Expr {
        Expr::Round {
            of: Box::new(self),
            digits,
        }
    }

    /// All column names referenced by this expression, deduplicated.
    pub fn columns(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_columns(&mut names);
        names.sort();
        names.dedup();
        names
    }

    fn collect_columns(&self, into: &mut Vec<String>) {
        match self {
            Expr::Column { name } => into.push(name.clone()),
            Expr::Literal { .. } => {}
            Expr::Add { left, right }
            | Expr::Sub { left, right }
            | Expr::Mul { left, right }
            | Expr::Div { left, right } => {
                left.collect_columns(into);
                right.collect_columns(into);
            }
            Expr::Sqrt { of } | Expr::Round { of, .. } => of.collect_columns(into),
            Expr::Pow { base, .. } => base.collect_columns(into),
        }
    }

    /// Check that every referenced column exists and is numeric.
    pub fn validate(&self, schema: &Schema) -> FormatResult<()> {
        for name in self.columns() {
            let idx = schema.require(&name)?;
            let ty = schema.defs()[idx].ty;
            if !matches!(ty, crate::table::ColumnType::Int | crate::table::ColumnType::Float) {
                return Err(FormatError::NonNumeric {
                    column: name,
                    ty: ty.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Evaluate against one row. `None` means null (a null operand).
    ///
    /// The schema must have been validated first; an unknown column here
    /// evaluates to null rather than panicking.
    pub fn eval(&self, schema: &Schema, row: &[Value]) -> Option<f64> {
        match self {
            Expr::Column { name } => {
                let idx = schema.index_of(name)?;
                row.get(idx)?.as_f64()
            }
            Expr::Literal { value } => Some(*value),
            Expr::Add { left, right } => Some(left.eval(schema, row)? + right.eval(schema, row)?),
            Expr::Sub { left, right } => Some(left.eval(schema, row)? - right.eval(schema, row)?),
            Expr::Mul { left, right } => Some(left.eval(schema, row)? * right.eval(schema, row)?),
            // IEEE division: x/0 is ±inf, 0/0 is NaN. Deliberate.
            Expr::Div { left, right } => Some(left.eval(schema, row)? / right.eval(schema, row)?),
            Expr::Sqrt { of } => Some(of.eval(schema, row)?.sqrt()),
            Expr::Pow { base, exponent } => Some(base.eval(schema, row)?.powf(*exponent)),
            Expr::Round { of, digits } => {
                let factor = 10f64.powi(*digits as i32);
                Some((of.eval(schema, row)? * factor).round() / factor)
            }
        }
    }
}
