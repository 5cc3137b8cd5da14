//! Multilevel flattening of nested cells.
//!
//! Measurement samples are frequently dict- or list-shaped (one sample may
//! carry several measured variables at once). [`normalize`] expands every
//! container-valued cell into hierarchical sub-columns until the table is
//! flat: an explicit fixed-point loop over one-level expansions, with the
//! termination predicate ("no column reported any sub-columns") returned by
//! [`expand_one_level`] directly.

use super::{ColumnPath, Table};
use serde_json::Value;

/// Flatten every nested cell into hierarchical sub-columns.
///
/// Repeatedly applies [`expand_one_level`] until no column contains a
/// container value. A table that is already flat is returned unchanged.
pub fn normalize(table: Table) -> Table {
    let mut current = table;
    loop {
        let (next, expanded) = expand_one_level(current);
        current = next;
        if !expanded {
            return current;
        }
    }
}

/// Expand one nesting level.
///
/// Per column: a mapping cell contributes its keys as sub-columns, a
/// sequence cell contributes its positional indices, and a plain scalar
/// contributes sub-column `0` only when the same column also holds at least
/// one container elsewhere (the mixed-column promotion rule). A column with
/// no container cells at all is re-emitted unchanged. Sub-keys appear in
/// first-seen row order; a cell lacking a sub-key that another row has
/// yields `Null`.
///
/// Returns the expanded table and whether any column actually expanded —
/// the fixed-point termination predicate of [`normalize`].
pub fn expand_one_level(table: Table) -> (Table, bool) {
    let mut result = Table::new();
    let mut any_expanded = false;
    let n_rows = table.n_rows();

    for (path, cells) in table.iter() {
        let plan = scan_column(cells);
        if !plan.has_container {
            // leaf column, nothing to expand
            let _ = result.push_column(path.clone(), cells.to_vec());
            continue;
        }
        any_expanded = true;
        for sub_key in &plan.sub_keys {
            let column: Vec<Value> = (0..n_rows)
                .map(|i| cell_at(&cells[i], sub_key))
                .collect();
            let _ = result.push_column(path.child(sub_key.clone()), column);
        }
    }
    (result, any_expanded)
}

struct ColumnPlan {
    has_container: bool,
    sub_keys: Vec<String>,
}

/// Scan a column's cells for sub-columns, in first-seen order.
fn scan_column(cells: &[Value]) -> ColumnPlan {
    let mut sub_keys: Vec<String> = Vec::new();
    let mut has_container = false;
    let mut has_scalar = false;

    let mut note = |key: String, seen: &mut Vec<String>| {
        if !seen.contains(&key) {
            seen.push(key);
        }
    };

    for cell in cells {
        match cell {
            Value::Object(map) => {
                has_container = true;
                for key in map.keys() {
                    note(key.clone(), &mut sub_keys);
                }
            }
            Value::Array(items) => {
                has_container = true;
                for i in 0..items.len() {
                    note(i.to_string(), &mut sub_keys);
                }
            }
            Value::Null => {}
            _ => has_scalar = true,
        }
    }

    // mixed scalar/container columns promote the scalar to a length-1 "0"
    // slot so the column stays homogeneous in shape
    if has_container && has_scalar {
        note("0".to_string(), &mut sub_keys);
    }

    ColumnPlan {
        has_container,
        sub_keys,
    }
}

/// The value a cell contributes at a given sub-key.
fn cell_at(cell: &Value, sub_key: &str) -> Value {
    match cell {
        Value::Object(map) => map.get(sub_key).cloned().unwrap_or(Value::Null),
        Value::Array(items) => sub_key
            .parse::<usize>()
            .ok()
            .and_then(|i| items.get(i))
            .cloned()
            .unwrap_or(Value::Null),
        Value::Null => Value::Null,
        scalar => {
            if sub_key == "0" {
                scalar.clone()
            } else {
                Value::Null
            }
        }
    }
}

/// Convenience: build a table from a mapping and flatten it.
pub fn multilevel_table(
    mapping: indexmap::IndexMap<String, Value>,
) -> Result<Table, super::TableError> {
    Ok(normalize(Table::from_mapping(mapping)?))
}
