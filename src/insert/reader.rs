//! Row sources for `insert` / `upsert`.
//!
//! Reads CSV, TSV, JSON or newline-delimited JSON from a file or stdin and
//! yields insertion-ordered rows. CSV, TSV and NL are streamed; a JSON array
//! is decoded in one pass. Raw bytes pulled from the source are counted so the
//! progress bar can follow along.

use super::Row;
use crate::error::{Error, Result};
use serde_json::Value;
use std::cell::Cell;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::PathBuf;
use std::rc::Rc;
use std::str::FromStr;

const BUFFER_SIZE: usize = 64 * 1024;
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Input file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Csv,
    Tsv,
    Json,
    Nl,
}

impl InputFormat {
    /// JSON and NL carry their own types, so no detection is needed.
    #[must_use]
    pub const fn is_json(self) -> bool {
        matches!(self, Self::Json | Self::Nl)
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Csv => "CSV",
            Self::Tsv => "TSV",
            Self::Json => "JSON",
            Self::Nl => "NL",
        })
    }
}

/// Character encoding of CSV/TSV input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Encoding {
    #[default]
    Utf8,
    Latin1,
}

impl Encoding {
    const fn name(self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Latin1 => "latin-1",
        }
    }
}

impl FromStr for Encoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" | "utf-8-sig" => Ok(Self::Utf8),
            "latin-1" | "latin1" | "iso-8859-1" | "iso8859-1" => Ok(Self::Latin1),
            _ => Err(Error::InputFormat(format!(
                "Unknown encoding: {s} (supported: utf-8, latin-1)"
            ))),
        }
    }
}

/// Where rows are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Stdin,
    Path(PathBuf),
}

impl From<&str> for InputSource {
    fn from(value: &str) -> Self {
        if value == "-" {
            Self::Stdin
        } else {
            Self::Path(PathBuf::from(value))
        }
    }
}

/// Shared count of raw bytes read from the source.
#[derive(Debug, Clone, Default)]
pub struct ByteCounter(Rc<Cell<u64>>);

impl ByteCounter {
    #[must_use]
    pub fn get(&self) -> u64 {
        self.0.get()
    }

    fn add(&self, n: usize) {
        self.0.set(self.0.get() + n as u64);
    }
}

struct CountingReader<R> {
    inner: R,
    counter: ByteCounter,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.counter.add(n);
        Ok(n)
    }
}

/// Transcodes ISO-8859-1 to UTF-8. Every byte maps to the code point of the
/// same value.
struct Latin1Reader<R> {
    inner: R,
    pending: Vec<u8>,
    pos: usize,
}

impl<R: Read> Latin1Reader<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            pending: Vec::new(),
            pos: 0,
        }
    }
}

impl<R: Read> Read for Latin1Reader<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.pending.len() {
            let mut raw = [0u8; 4096];
            let n = self.inner.read(&mut raw)?;
            if n == 0 {
                return Ok(0);
            }
            self.pending.clear();
            self.pos = 0;
            for &byte in &raw[..n] {
                let mut utf8 = [0u8; 2];
                self.pending
                    .extend_from_slice(char::from(byte).encode_utf8(&mut utf8).as_bytes());
            }
        }

        let n = out.len().min(self.pending.len() - self.pos);
        out[..n].copy_from_slice(&self.pending[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// An open input: its format, its size if known, and a lazy row iterator.
pub struct RowSource {
    pub format: InputFormat,
    /// File size in bytes; `None` for stdin.
    pub total_bytes: Option<u64>,
    pub bytes_read: ByteCounter,
    pub rows: Box<dyn Iterator<Item = Result<Row>>>,
}

impl fmt::Debug for RowSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowSource")
            .field("format", &self.format)
            .field("total_bytes", &self.total_bytes)
            .field("bytes_read", &self.bytes_read.get())
            .finish_non_exhaustive()
    }
}

/// Open a source and start reading rows.
///
/// Without an explicit `format`, files are sniffed and stdin is refused.
///
/// # Errors
///
/// Returns an error if the file cannot be opened, stdin has no explicit
/// format, or the leading bytes cannot be decoded.
pub fn open_rows(
    source: &InputSource,
    format: Option<InputFormat>,
    encoding: Encoding,
) -> Result<RowSource> {
    let (raw, total_bytes): (Box<dyn Read>, Option<u64>) = match source {
        InputSource::Stdin => {
            if format.is_none() {
                return Err(Error::InputFormat(
                    "An explicit format is required - e.g. --csv - when reading from standard input"
                        .to_string(),
                ));
            }
            (Box::new(io::stdin().lock()), None)
        }
        InputSource::Path(path) => {
            let file = File::open(path)?;
            let size = file.metadata()?.len();
            (Box::new(file), Some(size))
        }
    };

    let mut source = from_reader(raw, format, encoding)?;
    source.total_bytes = total_bytes;
    Ok(source)
}

/// Read rows from any reader. `total_bytes` is left unset.
///
/// # Errors
///
/// Returns an error if the format cannot be determined or the leading bytes
/// cannot be decoded.
pub fn from_reader(
    raw: Box<dyn Read>,
    format: Option<InputFormat>,
    encoding: Encoding,
) -> Result<RowSource> {
    let counter = ByteCounter::default();
    let counting = CountingReader {
        inner: raw,
        counter: counter.clone(),
    };
    let decoded: Box<dyn Read> = match encoding {
        Encoding::Utf8 => Box::new(counting),
        Encoding::Latin1 => Box::new(Latin1Reader::new(counting)),
    };

    let mut reader = BufReader::with_capacity(BUFFER_SIZE, decoded);
    if reader.fill_buf()?.starts_with(UTF8_BOM) {
        reader.consume(UTF8_BOM.len());
    }

    let format = match format {
        Some(format) => format,
        None => sniff(reader.fill_buf()?),
    };

    let rows: Box<dyn Iterator<Item = Result<Row>>> = match format {
        InputFormat::Csv => csv_rows(reader, b',', encoding)?,
        InputFormat::Tsv => csv_rows(reader, b'\t', encoding)?,
        InputFormat::Json => json_rows(reader)?,
        InputFormat::Nl => nl_rows(reader),
    };

    Ok(RowSource {
        format,
        total_bytes: None,
        bytes_read: counter,
        rows,
    })
}

/// Guess the format from the first buffered bytes.
fn sniff(head: &[u8]) -> InputFormat {
    let start = head
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(head.len());
    let head = &head[start..];

    match head.first() {
        Some(b'[') => InputFormat::Json,
        Some(b'{') => {
            let first_line = head.split(|&b| b == b'\n').next().unwrap_or_default();
            match serde_json::from_slice::<Value>(first_line) {
                Ok(Value::Object(_)) => InputFormat::Nl,
                _ => InputFormat::Json,
            }
        }
        _ => {
            let first_line = head.split(|&b| b == b'\n').next().unwrap_or_default();
            let tabs = first_line.iter().filter(|&&b| b == b'\t').count();
            let commas = first_line.iter().filter(|&&b| b == b',').count();
            if tabs > commas {
                InputFormat::Tsv
            } else {
                InputFormat::Csv
            }
        }
    }
}

fn csv_error(err: csv::Error, encoding: Encoding) -> Error {
    if matches!(err.kind(), csv::ErrorKind::Utf8 { .. }) {
        Error::Encoding {
            encoding: encoding.name().to_string(),
            message: err.to_string(),
        }
    } else {
        Error::Csv(err)
    }
}

fn csv_rows<R: Read + 'static>(
    reader: R,
    delimiter: u8,
    encoding: Encoding,
) -> Result<Box<dyn Iterator<Item = Result<Row>>>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(reader);
    let headers = csv_reader
        .headers()
        .map_err(|e| csv_error(e, encoding))?
        .clone();

    let rows = csv_reader.into_records().map(move |record| {
        let record = record.map_err(|e| csv_error(e, encoding))?;
        let row: Row = headers
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let value = record
                    .get(i)
                    .map_or(Value::Null, |v| Value::String(v.to_string()));
                (name.to_string(), value)
            })
            .collect();
        Ok(row)
    });

    Ok(Box::new(rows))
}

fn into_row(value: Value, position: usize) -> Result<Row> {
    match value {
        Value::Object(row) => Ok(row),
        other => Err(Error::InputFormat(format!(
            "Row {position} is not a JSON object: {other}"
        ))),
    }
}

fn json_rows<R: Read>(mut reader: R) -> Result<Box<dyn Iterator<Item = Result<Row>>>> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    let text = String::from_utf8(bytes).map_err(|e| Error::Encoding {
        encoding: Encoding::Utf8.name().to_string(),
        message: e.to_string(),
    })?;

    let value: Value = serde_json::from_str(&text)
        .map_err(|e| Error::InputFormat(format!("Invalid JSON input: {e}")))?;

    let values = match value {
        Value::Array(items) => items,
        object @ Value::Object(_) => vec![object],
        other => {
            return Err(Error::InputFormat(format!(
                "JSON input must be an object or an array of objects, got: {other}"
            )));
        }
    };

    Ok(Box::new(
        values
            .into_iter()
            .enumerate()
            .map(|(i, value)| into_row(value, i + 1)),
    ))
}

fn nl_rows<R: BufRead + 'static>(reader: R) -> Box<dyn Iterator<Item = Result<Row>>> {
    let rows = reader
        .lines()
        .enumerate()
        .filter_map(|(i, line)| {
            let line = match line {
                Ok(line) => line,
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    return Some(Err(Error::Encoding {
                        encoding: Encoding::Utf8.name().to_string(),
                        message: format!("line {}: {e}", i + 1),
                    }));
                }
                Err(e) => return Some(Err(Error::Io(e))),
            };
            if line.trim().is_empty() {
                return None;
            }
            Some(
                serde_json::from_str::<Value>(&line)
                    .map_err(|e| Error::InputFormat(format!("Invalid JSON on line {}: {e}", i + 1)))
                    .and_then(|value| into_row(value, i + 1)),
            )
        });
    Box::new(rows)
}
