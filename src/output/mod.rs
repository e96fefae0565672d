//! Rendering query results for the terminal.
//!
//! Supported formats:
//! - `json` - pretty-printed array (default)
//! - `nl` - one compact JSON object per line
//! - `csv` / `tsv` - header row plus values, quoted by the `csv` crate
//! - `table` - left-aligned plain-text columns
//!
//! Every renderer returns the full text so callers decide where it goes.

use crate::error::{Error, Result};
use serde_json::Value;

/// Output format for row-returning commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Json,
    Nl,
    Csv,
    Tsv,
    Table,
}

/// Render rows in `format`.
///
/// `columns` fixes the column set and order for the tabular formats; without
/// it the first row's keys are used.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn render(rows: &[Value], format: OutputFormat, columns: Option<&[String]>) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(rows)? + "\n"),
        OutputFormat::Nl => render_nl(rows),
        OutputFormat::Csv => render_delimited(rows, columns, b','),
        OutputFormat::Tsv => render_delimited(rows, columns, b'\t'),
        OutputFormat::Table => Ok(render_table(rows, columns)),
    }
}

fn render_nl(rows: &[Value]) -> Result<String> {
    let mut out = String::new();
    for row in rows {
        out.push_str(&serde_json::to_string(row)?);
        out.push('\n');
    }
    Ok(out)
}

fn column_names(rows: &[Value], columns: Option<&[String]>) -> Vec<String> {
    match columns {
        Some(columns) => columns.to_vec(),
        None => rows
            .first()
            .and_then(Value::as_object)
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default(),
    }
}

/// Text form of a cell: strings raw, null and missing empty, anything else as
/// JSON.
fn cell(row: &Value, column: &str) -> String {
    match row.get(column) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn render_delimited(rows: &[Value], columns: Option<&[String]>, delimiter: u8) -> Result<String> {
    let columns = column_names(rows, columns);
    if columns.is_empty() {
        return Ok(String::new());
    }

    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());
    writer.write_record(&columns)?;
    for row in rows {
        writer.write_record(columns.iter().map(|c| cell(row, c)))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| Error::Other(format!("could not flush CSV output: {e}")))?;
    String::from_utf8(bytes).map_err(|e| Error::Other(e.to_string()))
}

fn render_table(rows: &[Value], columns: Option<&[String]>) -> String {
    let columns = column_names(rows, columns);
    if rows.is_empty() || columns.is_empty() {
        return String::new();
    }

    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| columns.iter().map(|c| cell(row, c)).collect())
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, name)| {
            cells
                .iter()
                .map(|r| r[i].chars().count())
                .chain(std::iter::once(name.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = pad_line(columns.iter().map(String::as_str), &widths);
    let dashes: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&pad_line(dashes.iter().map(String::as_str), &widths));
    for row in &cells {
        out.push_str(&pad_line(row.iter().map(String::as_str), &widths));
    }
    out
}

/// Join left-justified cells with two spaces, without trailing whitespace.
fn pad_line<'a>(values: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let padded: Vec<String> = values
        .zip(widths)
        .map(|(v, &w)| format!("{v:<w$}"))
        .collect();
    let mut line = padded.join("  ");
    line.truncate(line.trim_end().len());
    line.push('\n');
    line
}
