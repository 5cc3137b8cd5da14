//! Path-keyed tabular container.
//!
//! A [`Table`] stores columns keyed by [`ColumnPath`] — a top-level name
//! plus a chain of sub-keys, the flat rendition of pandas-style tuple
//! columns like `('c', 0)`. Columns keep insertion order and share one row
//! count; missing cells are `Value::Null`.

mod normalize;

pub use normalize::{expand_one_level, multilevel_table, normalize};

use indexmap::IndexMap;
use serde_json::Value;
use std::io::{self, Write};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("column `{column}` has {actual} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },
}

/// Hierarchical column key: a top-level column name followed by the
/// sub-keys produced by expanding nested cells.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnPath {
    segments: Vec<String>,
}

impl ColumnPath {
    /// A plain top-level column.
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            segments: vec![name.into()],
        }
    }

    /// Extend with one more sub-key.
    pub fn child(&self, key: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(key.into());
        Self { segments }
    }

    /// The top-level column name.
    pub fn top(&self) -> &str {
        &self.segments[0]
    }

    /// All segments, top-level name first.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Whether this is a plain, unexpanded column.
    pub fn is_plain(&self) -> bool {
        self.segments.len() == 1
    }
}

impl ColumnPath {
    /// Build from explicit segments. Must be non-empty.
    pub fn from_segments(segments: Vec<String>) -> Self {
        debug_assert!(!segments.is_empty());
        Self { segments }
    }
}

impl From<&str> for ColumnPath {
    fn from(name: &str) -> Self {
        ColumnPath::name(name)
    }
}

impl<const N: usize> From<[&str; N]> for ColumnPath {
    fn from(segments: [&str; N]) -> Self {
        Self {
            segments: segments.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl std::fmt::Display for ColumnPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

/// An ordered collection of equal-length columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: IndexMap<ColumnPath, Vec<Value>>,
    n_rows: usize,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a `name → values` mapping. A sequence value becomes a
    /// column; a scalar is broadcast to every row. Column lengths must
    /// agree.
    pub fn from_mapping(mapping: IndexMap<String, Value>) -> Result<Self, TableError> {
        let n_rows = mapping
            .values()
            .filter_map(|v| v.as_array().map(Vec::len))
            .max()
            .unwrap_or(if mapping.is_empty() { 0 } else { 1 });
        let mut table = Table::new();
        for (name, value) in mapping {
            let cells = match value {
                Value::Array(items) => {
                    if items.len() != n_rows {
                        return Err(TableError::LengthMismatch {
                            column: name,
                            expected: n_rows,
                            actual: items.len(),
                        });
                    }
                    items
                }
                scalar => vec![scalar; n_rows],
            };
            table.columns.insert(ColumnPath::name(name), cells);
        }
        table.n_rows = n_rows;
        Ok(table)
    }

    /// Build from per-row mappings. Rows are not assumed rectangular: a key
    /// missing from some rows yields `Null` cells there. Column order is
    /// first-seen key order.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a IndexMap<String, Value>>) -> Self {
        let records: Vec<&IndexMap<String, Value>> = records.into_iter().collect();
        let mut columns: IndexMap<ColumnPath, Vec<Value>> = IndexMap::new();
        for record in &records {
            for key in record.keys() {
                columns
                    .entry(ColumnPath::name(key.clone()))
                    .or_insert_with(|| vec![Value::Null; records.len()]);
            }
        }
        for (i, record) in records.iter().enumerate() {
            for (key, value) in record.iter() {
                if let Some(cells) = columns.get_mut(&ColumnPath::name(key.clone())) {
                    cells[i] = value.clone();
                }
            }
        }
        Self {
            columns,
            n_rows: records.len(),
        }
    }

    /// Parse a JSON document: either a `column → values` mapping or an
    /// array of row records. This is the on-disk form of reference
    /// datasets.
    pub fn from_json_str(text: &str) -> anyhow::Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        match value {
            Value::Object(map) => Ok(Self::from_mapping(map.into_iter().collect())?),
            Value::Array(rows) => {
                let records: Vec<IndexMap<String, Value>> = rows
                    .into_iter()
                    .map(|row| match row {
                        Value::Object(map) => Ok(map.into_iter().collect()),
                        other => Err(anyhow::anyhow!("expected a row object, got {other}")),
                    })
                    .collect::<anyhow::Result<_>>()?;
                Ok(Self::from_records(&records))
            }
            other => Err(anyhow::anyhow!(
                "expected a mapping or an array of records, got {other}"
            )),
        }
    }

    /// Append a column. Length must match unless the table is empty.
    pub fn push_column(
        &mut self,
        path: ColumnPath,
        cells: Vec<Value>,
    ) -> Result<(), TableError> {
        if self.columns.is_empty() {
            self.n_rows = cells.len();
        } else if cells.len() != self.n_rows {
            return Err(TableError::LengthMismatch {
                column: path.to_string(),
                expected: self.n_rows,
                actual: cells.len(),
            });
        }
        self.columns.insert(path, cells);
        Ok(())
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Column cells by path.
    pub fn column(&self, path: &ColumnPath) -> Option<&[Value]> {
        self.columns.get(path).map(Vec::as_slice)
    }

    /// Plain (single-segment) column by top-level name.
    pub fn column_by_name(&self, name: &str) -> Option<&[Value]> {
        self.column(&ColumnPath::name(name))
    }

    /// Whether any column (plain or expanded) carries this top-level name.
    pub fn has_top_level(&self, name: &str) -> bool {
        self.columns.keys().any(|path| path.top() == name)
    }

    /// Column paths in order.
    pub fn column_paths(&self) -> impl Iterator<Item = &ColumnPath> {
        self.columns.keys()
    }

    /// Columns in order with their cells.
    pub fn iter(&self) -> impl Iterator<Item = (&ColumnPath, &[Value])> {
        self.columns.iter().map(|(path, cells)| (path, cells.as_slice()))
    }

    /// One row as a `rendered-path → value` mapping.
    pub fn row(&self, index: usize) -> IndexMap<String, Value> {
        self.columns
            .iter()
            .map(|(path, cells)| (path.to_string(), cells[index].clone()))
            .collect()
    }

    /// All rows, each as a `rendered-path → value` mapping.
    pub fn records(&self) -> Vec<IndexMap<String, Value>> {
        (0..self.n_rows).map(|i| self.row(i)).collect()
    }

    /// Write as CSV: one header row of dot-joined paths, then data rows.
    /// `Null` cells are empty.
    pub fn to_csv<W: Write>(&self, mut writer: W) -> io::Result<()> {
        let header: Vec<String> = self
            .columns
            .keys()
            .map(|path| csv_escape(&path.to_string()))
            .collect();
        writeln!(writer, "{}", header.join(","))?;
        for i in 0..self.n_rows {
            let cells: Vec<String> = self
                .columns
                .values()
                .map(|cells| match &cells[i] {
                    Value::Null => String::new(),
                    value => csv_escape(&crate::value::display(value)),
                })
                .collect();
            writeln!(writer, "{}", cells.join(","))?;
        }
        Ok(())
    }

    /// Render to a CSV string.
    pub fn to_csv_string(&self) -> String {
        let mut buffer = Vec::new();
        // writing to a Vec cannot fail
        let _ = self.to_csv(&mut buffer);
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

fn csv_escape(cell: &str) -> String {
    if cell.contains(',') || cell.contains('"') || cell.contains('\n') {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}
