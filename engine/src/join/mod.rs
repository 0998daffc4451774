//! Inner join.
//!
//! Combines two tables on a shared key column, the way separate survey
//! extracts (farm owners, crop production) are merged for analysis.
//! Left row order is preserved; each left row is followed by its matches
//! in right-table order. Null keys never match.

use std::collections::HashMap;

use crate::error::{DomainError, PipelineResult};
use crate::table::{Schema, Table, Value};

/// Suffix applied to right-table columns whose names collide with a
/// left-table column.
const RIGHT_SUFFIX: &str = "_right";

/// Inner join of two tables on `key`.
///
/// The key column must exist in both tables ([`DomainError`] otherwise).
/// The output carries every left column, then every right column except
/// the key; colliding right column names get a `_right` suffix.
pub fn inner_join(left: &Table, right: &Table, key: &str) -> PipelineResult<Table> {
    let left_key = left
        .schema()
        .index_of(key)
        .ok_or_else(|| DomainError::JoinKeyMissing {
            key: key.to_string(),
            side: "left",
        })?;
    let right_key = right
        .schema()
        .index_of(key)
        .ok_or_else(|| DomainError::JoinKeyMissing {
            key: key.to_string(),
            side: "right",
        })?;

    let mut schema = Schema::new();
    for def in left.schema().defs() {
        schema.push(def.name.clone(), def.ty)?;
    }
    let mut right_columns = Vec::new();
    for (i, def) in right.schema().defs().iter().enumerate() {
        if i == right_key {
            continue;
        }
        let name = if schema.contains(&def.name) {
            format!("{}{}", def.name, RIGHT_SUFFIX)
        } else {
            def.name.clone()
        };
        schema.push(name, def.ty)?;
        right_columns.push(i);
    }

    // Key value -> right row indices, in right-table order.
    let mut by_key: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, row) in right.rows().iter().enumerate() {
        let cell = &row[right_key];
        if cell.is_null() {
            continue;
        }
        by_key.entry(cell.group_key()).or_default().push(i);
    }

    let mut joined = Table::new(schema);
    for left_row in left.rows() {
        let cell = &left_row[left_key];
        if cell.is_null() {
            continue;
        }
        let Some(matches) = by_key.get(&cell.group_key()) else {
            continue;
        };
        for &right_idx in matches {
            let mut row: Vec<Value> = left_row.clone();
            for &col in &right_columns {
                row.push(right.rows()[right_idx][col].clone());
            }
            joined.push_row(row)?;
        }
    }
    Ok(joined)
}
