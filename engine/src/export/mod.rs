//! Delimited-text export.
//!
//! Serializes a [`Table`] back to CSV: a header row of column names,
//! one line per row, null cells as empty fields, values quoted only when
//! they contain the delimiter, a quote or a newline. Rendering uses the
//! same scalar rules as the loader, so `load(export(T))` reproduces `T`
//! row-for-row and column-for-column (modulo type inference on columns
//! with no values at all).

use std::io::Write;
use std::path::Path;

use csv::WriterBuilder;

use crate::error::PipelineResult;
use crate::table::Table;

/// Write a table to any writer with an explicit delimiter.
pub fn export_writer<W: Write>(table: &Table, writer: W, delimiter: char) -> PipelineResult<()> {
    let mut out = WriterBuilder::new()
        .delimiter(delimiter as u8)
        .from_writer(writer);

    out.write_record(table.schema().names())?;
    for row in table.rows() {
        out.write_record(row.iter().map(|v| v.render()))?;
    }
    out.flush()?;
    Ok(())
}

/// Write a table to a comma-delimited file at `path`.
pub fn export_path<P: AsRef<Path>>(table: &Table, path: P) -> PipelineResult<()> {
    let file = std::fs::File::create(path.as_ref())?;
    export_writer(table, file, ',')
}

/// Render a table to a comma-delimited string.
pub fn export_string(table: &Table) -> PipelineResult<String> {
    let mut buffer = Vec::new();
    export_writer(table, &mut buffer, ',')?;
    // The writer only ever emits UTF-8.
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
