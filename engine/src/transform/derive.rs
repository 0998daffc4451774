//! Derived columns.
//!
//! Evaluates an [`Expr`] once per row and appends the result as a new
//! float column, leaving every existing column untouched.

use crate::error::FormatResult;
use crate::table::{ColumnType, Table, Value};

use super::expr::Expr;

/// Planar degree-to-kilometer conversion factor, valid at small scale.
pub const KM_PER_DEGREE: f64 = 111.0;

/// Append a derived column computed from an arithmetic expression.
///
/// The output has the same row count and order as the input; null
/// operands produce null cells, numeric edge cases produce sentinel
/// values (see [`Expr::eval`]).
///
/// # Example
/// ```ignore
/// let with_yield = derive(
///     &table,
///     "Yield_mt_per_ha",
///     &Expr::col("Production_mt").div(Expr::col("Farm_Area_ha")),
/// )?;
/// ```
pub fn derive(table: &Table, name: &str, expr: &Expr) -> FormatResult<Table> {
    expr.validate(table.schema())?;
    let values = table
        .rows()
        .iter()
        .map(|row| match expr.eval(table.schema(), row) {
            Some(v) => Value::Float(v),
            None => Value::Null,
        })
        .collect();
    table.with_column(name, ColumnType::Float, values)
}

/// Append the planar Euclidean distance between two coordinate pairs:
/// `sqrt((lat2-lat1)^2 + (lon2-lon1)^2)`, in degrees.
///
/// A small-scale approximation; use [`degrees_to_km`] for an approximate
/// kilometer figure.
pub fn euclidean_distance(
    table: &Table,
    lat1: &str,
    lon1: &str,
    lat2: &str,
    lon2: &str,
    name: &str,
) -> FormatResult<Table> {
    let expr = Expr::col(lat2)
        .sub(Expr::col(lat1))
        .pow(2.0)
        .add(Expr::col(lon2).sub(Expr::col(lon1)).pow(2.0))
        .sqrt();
    derive(table, name, &expr)
}

/// Append a kilometer conversion of a degree-valued column
/// (multiplication by [`KM_PER_DEGREE`]).
pub fn degrees_to_km(table: &Table, source: &str, name: &str) -> FormatResult<Table> {
    derive(table, name, &Expr::col(source).mul(Expr::lit(KM_PER_DEGREE)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FormatError;
    use crate::table::Schema;

    fn farm_table() -> Table {
        let schema = Schema::from_defs(vec![
            ("Region", ColumnType::Text),
            ("Farm_Area_ha", ColumnType::Float),
            ("Production_mt", ColumnType::Float),
        ])
        .unwrap();
        Table::from_rows(
            schema,
            vec![
                vec![
                    Value::Text("III".into()),
                    Value::Float(2.5),
                    Value::Float(10.2),
                ],
                vec![
                    Value::Text("III".into()),
                    Value::Float(1.0),
                    Value::Float(7.5),
                ],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_derive_yield() {
        let expr = Expr::col("Production_mt").div(Expr::col("Farm_Area_ha"));
        let table = derive(&farm_table(), "Yield", &expr).unwrap();

        assert_eq!(table.n_cols(), 4);
        let yields = table.column("Yield").unwrap();
        assert!((yields[0].as_f64().unwrap() - 4.08).abs() < 1e-9);
        assert!((yields[1].as_f64().unwrap() - 7.5).abs() < 1e-9);
    }

    #[test]
    fn test_derive_rejects_duplicate_name() {
        let expr = Expr::col("Production_mt");
        let err = derive(&farm_table(), "Region", &expr).unwrap_err();
        assert!(matches!(err, FormatError::DuplicateColumn(_)));
    }

    #[test]
    fn test_distance_matches_worked_example() {
        let schema = Schema::from_defs(vec![
            ("Lat1", ColumnType::Float),
            ("Lon1", ColumnType::Float),
            ("Lat2", ColumnType::Float),
            ("Lon2", ColumnType::Float),
        ])
        .unwrap();
        let pairs = Table::from_rows(
            schema,
            vec![vec![
                Value::Float(12.34),
                Value::Float(121.0),
                Value::Float(12.45),
                Value::Float(121.1),
            ]],
        )
        .unwrap();

        let with_distance =
            euclidean_distance(&pairs, "Lat1", "Lon1", "Lat2", "Lon2", "Distance").unwrap();
        let d = with_distance.cell(0, "Distance").unwrap().as_f64().unwrap();
        assert!((d - 0.14866).abs() < 1e-4);

        let with_km = degrees_to_km(&with_distance, "Distance", "Distance_km").unwrap();
        let km = with_km.cell(0, "Distance_km").unwrap().as_f64().unwrap();
        assert!((km - 16.5).abs() < 0.05);
    }
}
