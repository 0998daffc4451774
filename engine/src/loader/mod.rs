//! Delimited-text loader with encoding and delimiter auto-detection.
//!
//! Turns a CSV file (or raw text/bytes) into a [`Table`], inferring a
//! column type for each column: integer where every non-empty field
//! parses as an integer, float where every non-empty field is numeric,
//! text otherwise. Empty fields load as [`Value::Null`] and do not veto a
//! numeric column.

use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};

use crate::error::{FormatError, NotFoundError, PipelineError, PipelineResult};
use crate::table::{ColumnType, Schema, Table, Value};

/// Result of loading a file, with the detected input characteristics.
#[derive(Debug, Clone)]
pub struct LoadReport {
    /// The loaded table.
    pub table: Table,
    /// Detected or assumed encoding.
    pub encoding: String,
    /// Detected or supplied delimiter.
    pub delimiter: char,
}

/// Detect the encoding of raw bytes.
pub fn detect_encoding(bytes: &[u8]) -> String {
    let (charset, _, _) = chardet::detect(bytes);

    // Normalize charset names
    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        other => other.to_string(),
    }
}

/// Decode bytes to a string using the specified encoding.
pub fn decode_content(bytes: &[u8], encoding: &str) -> Result<String, FormatError> {
    match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => String::from_utf8(bytes.to_vec())
            .map_err(|e| FormatError::Encoding(e.to_string())),
        // WINDOWS_1252 is a superset of ISO-8859-1; never fails.
        "iso-8859-1" | "latin-1" | "latin1" | "windows-1252" | "cp1252" => {
            Ok(encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned())
        }
        _ => Ok(String::from_utf8_lossy(bytes).into_owned()),
    }
}

/// Detect the delimiter by counting candidates in the header line.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let candidates = [',', ';', '\t', '|'];
    let mut best = ',';
    let mut best_count = 0;

    for &sep in &candidates {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best = sep;
        }
    }

    best
}

/// Load a table from a file, auto-detecting encoding and delimiter.
///
/// # Example
/// ```ignore
/// let report = surveytab::load_path("farm_survey_large.csv")?;
/// println!("{} rows, delimiter '{}'", report.table.n_rows(), report.delimiter);
/// ```
pub fn load_path<P: AsRef<Path>>(path: P) -> PipelineResult<LoadReport> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(NotFoundError::new(path).into());
    }
    let bytes = std::fs::read(path)?;
    load_bytes(&bytes)
}

/// Load a table from a file with an explicit delimiter.
pub fn load_path_with_delimiter<P: AsRef<Path>>(
    path: P,
    delimiter: char,
) -> PipelineResult<LoadReport> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(NotFoundError::new(path).into());
    }
    let bytes = std::fs::read(path)?;
    let encoding = detect_encoding(&bytes);
    let content = decode_content(&bytes, &encoding)?;
    let table = load_str(&content, delimiter)?;
    Ok(LoadReport {
        table,
        encoding,
        delimiter,
    })
}

/// Load a table from raw bytes, auto-detecting encoding and delimiter.
pub fn load_bytes(bytes: &[u8]) -> PipelineResult<LoadReport> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding)?;
    let delimiter = detect_delimiter(&content);
    let table = load_str(&content, delimiter)?;
    Ok(LoadReport {
        table,
        encoding,
        delimiter,
    })
}

/// Load a table from text with an explicit delimiter, inferring column
/// types from the values.
pub fn load_str(content: &str, delimiter: char) -> PipelineResult<Table> {
    let (headers, records) = read_records(content, delimiter)?;

    // Infer a type per column from the non-empty fields.
    let mut types: Vec<Option<ColumnType>> = vec![None; headers.len()];
    for record in &records {
        for (i, raw) in record.iter().enumerate() {
            if raw.is_empty() {
                continue;
            }
            let observed = ColumnType::infer(raw);
            types[i] = Some(match types[i] {
                Some(current) => current.unify(observed),
                None => observed,
            });
        }
    }

    let mut schema = Schema::new();
    for (name, ty) in headers.iter().zip(types.iter().copied()) {
        // All-empty columns default to text.
        schema.push(name.clone(), ty.unwrap_or(ColumnType::Text))?;
    }

    let mut table = Table::new(schema);
    for record in &records {
        let row = record
            .iter()
            .enumerate()
            .map(|(i, raw)| {
                Value::try_parse_as(raw, types[i].unwrap_or(ColumnType::Text))
                    .unwrap_or_else(|| Value::Text(raw.to_string()))
            })
            .collect();
        table.push_row(row)?;
    }
    Ok(table)
}

/// Load a table from text against an explicitly supplied schema.
///
/// Every schema column must appear in the header (any order); extra
/// header columns and unparseable values are format errors. Output
/// column order follows the schema, not the file.
pub fn load_str_with_schema(
    content: &str,
    delimiter: char,
    schema: &Schema,
) -> PipelineResult<Table> {
    let (headers, records) = read_records(content, delimiter)?;

    for header in &headers {
        if !schema.contains(header) {
            return Err(FormatError::UnknownColumn(header.clone()).into());
        }
    }
    let mut positions = Vec::with_capacity(schema.len());
    for def in schema.defs() {
        let pos = headers
            .iter()
            .position(|h| h == &def.name)
            .ok_or_else(|| FormatError::UnknownColumn(def.name.clone()))?;
        positions.push(pos);
    }

    let mut table = Table::new(schema.clone());
    for record in &records {
        let mut row = Vec::with_capacity(schema.len());
        for (def, &pos) in schema.defs().iter().zip(&positions) {
            let raw = record.get(pos).unwrap_or("");
            let value =
                Value::try_parse_as(raw, def.ty).ok_or_else(|| FormatError::TypeMismatch {
                    column: def.name.clone(),
                    expected: def.ty.to_string(),
                    value: raw.to_string(),
                })?;
            row.push(value);
        }
        table.push_row(row)?;
    }
    Ok(table)
}

/// Read header and data records, mapping codec errors into the format
/// taxonomy.
fn read_records(content: &str, delimiter: char) -> PipelineResult<(Vec<String>, Vec<StringRecord>)> {
    if content.trim().is_empty() {
        return Err(FormatError::Empty.into());
    }

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .trim(Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(map_csv_error)?
        .iter()
        .map(|h| h.to_string())
        .collect();
    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return Err(FormatError::NoHeader.into());
    }
    let mut seen = Vec::with_capacity(headers.len());
    for header in &headers {
        if seen.contains(&header) {
            return Err(FormatError::DuplicateColumn(header.clone()).into());
        }
        seen.push(header);
    }

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record.map_err(map_csv_error)?;
        // Fully blank lines are not data rows.
        if record.iter().all(|f| f.is_empty()) && record.len() <= 1 {
            continue;
        }
        records.push(record);
    }
    Ok((headers, records))
}

/// Rows with inconsistent field counts become [`FormatError::RaggedRow`];
/// everything else stays a codec error.
fn map_csv_error(err: csv::Error) -> PipelineError {
    match err.kind() {
        csv::ErrorKind::UnequalLengths {
            pos,
            expected_len,
            len,
        } => FormatError::RaggedRow {
            line: pos.as_ref().map(|p| p.line()).unwrap_or(0),
            expected: *expected_len as usize,
            found: *len as usize,
        }
        .into(),
        _ => PipelineError::Csv(err),
    }
}
