//! Sorting and truncation.
//!
//! Sorting is stable: rows with equal keys keep their original relative
//! order, so sorting ascending and then descending on a tie-free key
//! exactly reverses the rows. Null cells sort last in either direction.

use serde::{Deserialize, Serialize};

use crate::error::FormatResult;
use crate::table::Table;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Stable sort by one column.
pub fn sort(table: &Table, column: &str, order: SortOrder) -> FormatResult<Table> {
    let idx = table.schema().require(column)?;
    let mut indices: Vec<usize> = (0..table.n_rows()).collect();
    indices.sort_by(|&a, &b| {
        let left = &table.rows()[a][idx];
        let right = &table.rows()[b][idx];
        // Nulls are pinned last regardless of direction.
        match (left.is_null(), right.is_null()) {
            (true, true) => std::cmp::Ordering::Equal,
            (true, false) => std::cmp::Ordering::Greater,
            (false, true) => std::cmp::Ordering::Less,
            (false, false) => {
                let ord = left.compare(right);
                match order {
                    SortOrder::Ascending => ord,
                    SortOrder::Descending => ord.reverse(),
                }
            }
        }
    });
    Ok(table.take_rows(&indices))
}

/// The first `n` rows; if `n` exceeds the row count, all rows.
pub fn head(table: &Table, n: usize) -> Table {
    let indices: Vec<usize> = (0..table.n_rows().min(n)).collect();
    table.take_rows(&indices)
}

/// The `n` rows with the highest values in `column`: a descending sort
/// followed by truncation.
pub fn top_n(table: &Table, column: &str, n: usize) -> FormatResult<Table> {
    Ok(head(&sort(table, column, SortOrder::Descending)?, n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{ColumnType, Schema, Value};

    fn efficiency_table() -> Table {
        let schema = Schema::from_defs(vec![
            ("Farm_ID", ColumnType::Int),
            ("Efficiency", ColumnType::Float),
        ])
        .unwrap();
        Table::from_rows(
            schema,
            vec![
                vec![Value::Int(1), Value::Float(812.0)],
                vec![Value::Int(2), Value::Float(1450.5)],
                vec![Value::Int(3), Value::Null],
                vec![Value::Int(4), Value::Float(990.1)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_sort_descending() {
        let sorted = sort(&efficiency_table(), "Efficiency", SortOrder::Descending).unwrap();
        let ids: Vec<_> = sorted
            .column("Farm_ID")
            .unwrap()
            .into_iter()
            .cloned()
            .collect();
        assert_eq!(
            ids,
            vec![Value::Int(2), Value::Int(4), Value::Int(1), Value::Int(3)]
        );
    }

    #[test]
    fn test_nulls_last_in_both_directions() {
        let asc = sort(&efficiency_table(), "Efficiency", SortOrder::Ascending).unwrap();
        assert_eq!(asc.cell(3, "Farm_ID").unwrap(), &Value::Int(3));
        let desc = sort(&efficiency_table(), "Efficiency", SortOrder::Descending).unwrap();
        assert_eq!(desc.cell(3, "Farm_ID").unwrap(), &Value::Int(3));
    }

    #[test]
    fn test_asc_then_desc_reverses_tie_free_rows() {
        let schema = Schema::from_defs(vec![("x", ColumnType::Int)]).unwrap();
        let table = Table::from_rows(
            schema,
            vec![
                vec![Value::Int(3)],
                vec![Value::Int(1)],
                vec![Value::Int(2)],
            ],
        )
        .unwrap();

        let asc = sort(&table, "x", SortOrder::Ascending).unwrap();
        let desc = sort(&asc, "x", SortOrder::Descending).unwrap();

        let mut reversed: Vec<_> = asc.rows().to_vec();
        reversed.reverse();
        assert_eq!(desc.rows(), reversed.as_slice());
    }

    #[test]
    fn test_sort_is_stable() {
        let schema = Schema::from_defs(vec![
            ("Crop", ColumnType::Text),
            ("Farm_ID", ColumnType::Int),
        ])
        .unwrap();
        let table = Table::from_rows(
            schema,
            vec![
                vec![Value::Text("Rice".into()), Value::Int(1)],
                vec![Value::Text("Corn".into()), Value::Int(2)],
                vec![Value::Text("Rice".into()), Value::Int(3)],
            ],
        )
        .unwrap();

        let sorted = sort(&table, "Crop", SortOrder::Ascending).unwrap();
        // Tied "Rice" rows keep source order: 1 before 3.
        assert_eq!(sorted.cell(1, "Farm_ID").unwrap(), &Value::Int(1));
        assert_eq!(sorted.cell(2, "Farm_ID").unwrap(), &Value::Int(3));
    }

    #[test]
    fn test_head_truncation() {
        let table = efficiency_table();
        assert_eq!(head(&table, 2).n_rows(), 2);
        // n beyond the row count returns all rows, no error.
        assert_eq!(head(&table, 100).n_rows(), 4);
        assert_eq!(head(&table, 0).n_rows(), 0);
    }

    #[test]
    fn test_top_n() {
        let top = top_n(&efficiency_table(), "Efficiency", 2).unwrap();
        assert_eq!(top.n_rows(), 2);
        assert_eq!(top.cell(0, "Farm_ID").unwrap(), &Value::Int(2));
        assert_eq!(top.cell(1, "Farm_ID").unwrap(), &Value::Int(4));
    }
}
