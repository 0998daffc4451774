//! The in-memory table abstraction.
//!
//! A [`Table`] is an ordered sequence of rows over a fixed, named column
//! [`Schema`]. Every pipeline stage consumes a Table and produces a new
//! one; nothing mutates a Table another component still holds.
//!
//! Scalar cells are [`Value`]s: text, integer, float or null. Rendering
//! and parsing are inverse to each other so an exported table reloads
//! cell-for-cell (see [`Value::render`] and [`Value::parse`]).

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{FormatError, FormatResult};

// =============================================================================
// Scalar values
// =============================================================================

/// A single cell value.
///
/// `Null` represents a missing value (an empty field in delimited input).
/// Arithmetic sentinels (`inf`, `NaN`) are ordinary `Float` values and
/// survive an export/load round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Parse a raw field with numeric inference: integer if possible,
    /// else float, else text. Empty fields are null.
    pub fn parse(raw: &str) -> Value {
        if raw.is_empty() {
            return Value::Null;
        }
        if let Ok(i) = raw.parse::<i64>() {
            return Value::Int(i);
        }
        if let Ok(f) = raw.parse::<f64>() {
            return Value::Float(f);
        }
        Value::Text(raw.to_string())
    }

    /// Parse a raw field as a specific column type.
    ///
    /// Empty fields are null for any type. Returns `None` when the raw
    /// text cannot be read as the requested type.
    pub fn try_parse_as(raw: &str, ty: ColumnType) -> Option<Value> {
        if raw.is_empty() {
            return Some(Value::Null);
        }
        match ty {
            ColumnType::Int => raw.parse::<i64>().ok().map(Value::Int),
            ColumnType::Float => raw.parse::<f64>().ok().map(Value::Float),
            ColumnType::Text => Some(Value::Text(raw.to_string())),
        }
    }

    /// Render the value back to its delimited-text form.
    ///
    /// Inverse of [`Value::parse`]: null is the empty field, and whole
    /// floats keep a trailing `.0` so the column reloads as float.
    pub fn render(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => render_float(*f),
            Value::Text(s) => s.clone(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the value, promoting integers to float.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The column type this value naturally belongs to, if any.
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            Value::Null => None,
            Value::Int(_) => Some(ColumnType::Int),
            Value::Float(_) => Some(ColumnType::Float),
            Value::Text(_) => Some(ColumnType::Text),
        }
    }

    /// Total order used by sorting: numbers first (by numeric value,
    /// NaN after all finite values), then text (lexical), then null.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self.rank(), other.rank()) {
            (a, b) if a != b => a.cmp(&b),
            _ => match (self, other) {
                (Value::Text(a), Value::Text(b)) => a.cmp(b),
                _ => match (self.as_f64(), other.as_f64()) {
                    (Some(a), Some(b)) => a.total_cmp(&b),
                    _ => Ordering::Equal,
                },
            },
        }
    }

    /// Grouping/join key form: integers and whole floats collapse to the
    /// same key, text and numbers never collide.
    pub fn group_key(&self) -> String {
        match self {
            Value::Null => "\u{0}null".to_string(),
            Value::Text(s) => format!("t:{}", s),
            _ => format!("n:{}", self.as_f64().unwrap_or(f64::NAN)),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Int(_) | Value::Float(_) => 0,
            Value::Text(_) => 1,
            Value::Null => 2,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

/// Whole finite floats keep a trailing `.0` so a reloaded column stays
/// float-typed; everything else uses the shortest round-trip form.
fn render_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{:.1}", f)
    } else {
        format!("{}", f)
    }
}

// =============================================================================
// Schema
// =============================================================================

/// Semantic type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Text,
    Int,
    Float,
}

impl ColumnType {
    /// Infer the type of a single non-empty raw field.
    pub fn infer(raw: &str) -> ColumnType {
        if raw.parse::<i64>().is_ok() {
            ColumnType::Int
        } else if raw.parse::<f64>().is_ok() {
            ColumnType::Float
        } else {
            ColumnType::Text
        }
    }

    /// Widen two observed cell types to a common column type.
    pub fn unify(self, other: ColumnType) -> ColumnType {
        use ColumnType::*;
        match (self, other) {
            (Int, Int) => Int,
            (Int, Float) | (Float, Int) | (Float, Float) => Float,
            _ => Text,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Text => "text",
            ColumnType::Int => "int",
            ColumnType::Float => "float",
        };
        write!(f, "{}", name)
    }
}

/// A named, typed column definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub ty: ColumnType,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Ordered column definitions shared by every row of a [`Table`].
///
/// Column lookup is always by name against the declared schema and fails
/// fast with [`FormatError::UnknownColumn`] instead of deferring to a
/// runtime key error.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<ColumnDef>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a schema from `(name, type)` pairs, rejecting duplicates.
    pub fn from_defs<I, S>(defs: I) -> FormatResult<Self>
    where
        I: IntoIterator<Item = (S, ColumnType)>,
        S: Into<String>,
    {
        let mut schema = Schema::new();
        for (name, ty) in defs {
            schema.push(name, ty)?;
        }
        Ok(schema)
    }

    /// Append a column definition, rejecting duplicate names.
    pub fn push(&mut self, name: impl Into<String>, ty: ColumnType) -> FormatResult<()> {
        let name = name.into();
        if self.contains(&name) {
            return Err(FormatError::DuplicateColumn(name));
        }
        self.columns.push(ColumnDef::new(name, ty));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn defs(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Resolve a column name to its index, or fail fast.
    pub fn require(&self, name: &str) -> FormatResult<usize> {
        self.index_of(name)
            .ok_or_else(|| FormatError::UnknownColumn(name.to_string()))
    }

    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.index_of(name).map(|i| self.columns[i].ty)
    }
}

// =============================================================================
// Table
// =============================================================================

/// An ordered sequence of rows sharing a fixed column schema.
///
/// Row insertion order is meaningful (it echoes source order); column
/// order is meaningful for display and export. All rows hold exactly
/// `schema.len()` cells; constructors and row appends enforce this.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    schema: Schema,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// An empty table over the given schema.
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
        }
    }

    /// Build a table from literal rows, validating row widths.
    ///
    /// This is the entry point for the inline record sets used by the
    /// exercise datasets.
    pub fn from_rows(schema: Schema, rows: Vec<Vec<Value>>) -> FormatResult<Self> {
        let mut table = Table::new(schema);
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.schema.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&[Value]> {
        self.rows.get(index).map(|r| r.as_slice())
    }

    /// A single cell addressed by row index and column name.
    pub fn cell(&self, row: usize, column: &str) -> FormatResult<&Value> {
        let col = self.schema.require(column)?;
        self.rows
            .get(row)
            .map(|r| &r[col])
            .ok_or(FormatError::RowIndex {
                index: row,
                rows: self.rows.len(),
            })
    }

    /// All values of one column, in row order.
    pub fn column(&self, name: &str) -> FormatResult<Vec<&Value>> {
        let col = self.schema.require(name)?;
        Ok(self.rows.iter().map(|r| &r[col]).collect())
    }

    /// Append a row, validating its width against the schema.
    pub fn push_row(&mut self, row: Vec<Value>) -> FormatResult<()> {
        if row.len() != self.schema.len() {
            return Err(FormatError::RowWidth {
                expected: self.schema.len(),
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// A new table with one appended column; existing columns are
    /// untouched and row count/order is preserved.
    pub fn with_column(
        &self,
        name: impl Into<String>,
        ty: ColumnType,
        values: Vec<Value>,
    ) -> FormatResult<Table> {
        if values.len() != self.rows.len() {
            return Err(FormatError::ColumnLength {
                expected: self.rows.len(),
                found: values.len(),
            });
        }
        let mut schema = self.schema.clone();
        schema.push(name, ty)?;
        let rows = self
            .rows
            .iter()
            .zip(values)
            .map(|(row, value)| {
                let mut row = row.clone();
                row.push(value);
                row
            })
            .collect();
        Ok(Table { schema, rows })
    }

    /// Column projection: a new table keeping only the named columns, in
    /// the requested order.
    pub fn select<S: AsRef<str>>(&self, columns: &[S]) -> FormatResult<Table> {
        let mut indices = Vec::with_capacity(columns.len());
        let mut schema = Schema::new();
        for column in columns {
            let idx = self.schema.require(column.as_ref())?;
            schema.push(column.as_ref(), self.schema.defs()[idx].ty)?;
            indices.push(idx);
        }
        let rows = self
            .rows
            .iter()
            .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
            .collect();
        Ok(Table { schema, rows })
    }

    /// A new table keeping only the rows at the given indices, in order.
    pub(crate) fn take_rows(&self, indices: &[usize]) -> Table {
        Table {
            schema: self.schema.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }
}

impl fmt::Display for Table {
    /// Aligned text preview with a typed header, for terminal display.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers: Vec<String> = self
            .schema
            .defs()
            .iter()
            .map(|c| format!("{} ({})", c.name, c.ty))
            .collect();
        let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
        let rendered: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.iter().map(|v| v.render()).collect())
            .collect();
        for row in &rendered {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.len());
            }
        }
        for (i, header) in headers.iter().enumerate() {
            if i > 0 {
                write!(f, "  ")?;
            }
            write!(f, "{:<width$}", header, width = widths[i])?;
        }
        writeln!(f)?;
        for row in &rendered {
            for (i, cell) in row.iter().enumerate() {
                if i > 0 {
                    write!(f, "  ")?;
                }
                write!(f, "{:<width$}", cell, width = widths[i])?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
