//! Bulk insert pipeline.
//!
//! ```text
//! RowSource ──► Batches (size / interval) ──► type coercion ──► BatchRequest ──► sink
//! ```
//!
//! Column types are guessed from the first batch of CSV/TSV input and the
//! same guesses are applied to every later batch. Batches are sent one at a
//! time; the first failure aborts the run.

pub mod reader;

pub use reader::{open_rows, ByteCounter, Encoding, InputFormat, InputSource, RowSource};

use crate::error::{Error, Result};
use indexmap::IndexMap;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{Map, Number, Value};
use std::io::IsTerminal;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// One input record.
pub type Row = Map<String, Value>;

/// Default rows per request.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Default maximum time a batch may accumulate before it is sent.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

// ── Batching ──────────────────────────────────────────────────

/// Time source for batch intervals.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// The real clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// Groups a fallible item stream into batches.
///
/// A batch is closed when it holds `size` items, when `interval` has passed
/// since it started filling (checked after each append), or when the source
/// runs out. A source error is yielded once and ends the iteration.
#[derive(Debug)]
pub struct Batches<I, C> {
    source: I,
    size: usize,
    interval: Option<Duration>,
    clock: C,
    done: bool,
}

impl<I, C> Batches<I, C> {
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `size` is zero.
    pub fn new(source: I, size: usize, interval: Option<Duration>, clock: C) -> Result<Self> {
        if size == 0 {
            return Err(Error::InvalidArgument(
                "batch size must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            source,
            size,
            interval,
            clock,
            done: false,
        })
    }
}

impl<T, I, C> Iterator for Batches<I, C>
where
    I: Iterator<Item = Result<T>>,
    C: Clock,
{
    type Item = Result<Vec<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let started = self.clock.now();
        let mut batch = Vec::new();

        loop {
            match self.source.next() {
                None => {
                    self.done = true;
                    break;
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                Some(Ok(item)) => {
                    batch.push(item);
                    if batch.len() >= self.size {
                        break;
                    }
                    if self
                        .interval
                        .is_some_and(|i| self.clock.now().duration_since(started) >= i)
                    {
                        break;
                    }
                }
            }
        }

        (!batch.is_empty()).then_some(Ok(batch))
    }
}

// ── Type detection ────────────────────────────────────────────

/// Guessed column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Float,
    Text,
}

#[derive(Debug, Clone, Copy)]
struct Candidates {
    integer: bool,
    float: bool,
}

impl Default for Candidates {
    fn default() -> Self {
        Self {
            integer: true,
            float: true,
        }
    }
}

/// Tracks which numeric types every value seen in a column could be.
///
/// Blank values (null, empty string) rule nothing out, so a column holding
/// only blanks is reported as [`ColumnType::Integer`].
#[derive(Debug, Clone, Default)]
pub struct TypeTracker {
    columns: IndexMap<String, Candidates>,
}

impl TypeTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, rows: &[Row]) {
        for row in rows {
            for (key, value) in row {
                let candidates = self.columns.entry(key.clone()).or_default();
                match value {
                    Value::Null => {}
                    Value::String(s) if s.is_empty() => {}
                    Value::String(s) => {
                        candidates.integer &= is_integer(s);
                        candidates.float &= parse_float(s).is_some();
                    }
                    Value::Number(n) => {
                        candidates.integer &= n.is_i64() || n.is_u64();
                    }
                    _ => {
                        candidates.integer = false;
                        candidates.float = false;
                    }
                }
            }
        }
    }

    /// Column → guessed type, in first-seen column order.
    #[must_use]
    pub fn types(&self) -> IndexMap<String, ColumnType> {
        self.columns
            .iter()
            .map(|(key, c)| {
                let guessed = if c.integer {
                    ColumnType::Integer
                } else if c.float {
                    ColumnType::Float
                } else {
                    ColumnType::Text
                };
                (key.clone(), guessed)
            })
            .collect()
    }
}

/// Optional sign then digits, of any length.
fn is_integer(s: &str) -> bool {
    let s = s.trim();
    let digits = s.strip_prefix(['+', '-']).unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// `None` past the `u64` range, so such values stay strings.
fn parse_integer(s: &str) -> Option<Number> {
    let s = s.trim();
    s.parse::<i64>()
        .map(Number::from)
        .or_else(|_| s.parse::<u64>().map(Number::from))
        .ok()
}

fn parse_float(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|f| f.is_finite())
}

/// Produce a copy of `row` with string values converted per `types`.
///
/// Empty strings in numeric columns become null. Strings that do not parse,
/// non-string values and columns without a guess are copied unchanged.
#[must_use]
pub fn coerce_row(row: &Row, types: &IndexMap<String, ColumnType>) -> Row {
    row.iter()
        .map(|(key, value)| {
            let coerced = match (value, types.get(key)) {
                (Value::String(s), Some(ColumnType::Integer | ColumnType::Float)) if s.is_empty() => {
                    Value::Null
                }
                (Value::String(s), Some(ColumnType::Integer)) => parse_integer(s)
                    .map_or_else(|| value.clone(), Value::Number),
                (Value::String(s), Some(ColumnType::Float)) => parse_float(s)
                    .and_then(Number::from_f64)
                    .map_or_else(|| value.clone(), Value::Number),
                _ => value.clone(),
            };
            (key.clone(), coerced)
        })
        .collect()
}

// ── Requests ──────────────────────────────────────────────────

/// Which row-writing endpoint to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Insert,
    Upsert,
}

impl WriteMode {
    const fn endpoint(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Upsert => "upsert",
        }
    }
}

/// Options shared by every batch of one run.
#[derive(Debug, Clone)]
pub struct InsertOptions {
    pub table: String,
    pub mode: WriteMode,
    /// Use `/-/create`, creating the table if needed.
    pub create: bool,
    pub replace: bool,
    pub ignore: bool,
    pub alter: bool,
    pub pks: Vec<String>,
}

impl InsertOptions {
    #[must_use]
    pub fn new(table: impl Into<String>, mode: WriteMode) -> Self {
        Self {
            table: table.into(),
            mode,
            create: false,
            replace: false,
            ignore: false,
            alter: false,
            pks: Vec::new(),
        }
    }
}

/// One batch ready to send, relative to the database URL.
#[derive(Debug, Clone, Copy)]
pub struct BatchRequest<'a> {
    pub options: &'a InsertOptions,
    pub rows: &'a [Row],
}

impl BatchRequest<'_> {
    /// Path under the database URL.
    #[must_use]
    pub fn path(&self) -> String {
        if self.options.create {
            "/-/create".to_string()
        } else {
            format!(
                "/{}/-/{}",
                self.options.table,
                self.options.mode.endpoint()
            )
        }
    }

    /// JSON body. Flags are only present when set.
    #[must_use]
    pub fn body(&self) -> Value {
        let options = self.options;
        let mut body = Map::new();

        if options.create {
            body.insert("table".to_string(), Value::String(options.table.clone()));
        }
        body.insert(
            "rows".to_string(),
            Value::Array(self.rows.iter().cloned().map(Value::Object).collect()),
        );
        for (flag, set) in [
            ("replace", options.replace),
            ("ignore", options.ignore),
            ("alter", options.alter),
        ] {
            if set {
                body.insert(flag.to_string(), Value::Bool(true));
            }
        }
        if options.create {
            match options.pks.as_slice() {
                [] => {}
                [pk] => {
                    body.insert("pk".to_string(), Value::String(pk.clone()));
                }
                pks => {
                    body.insert(
                        "pks".to_string(),
                        Value::Array(pks.iter().cloned().map(Value::String).collect()),
                    );
                }
            }
        }

        Value::Object(body)
    }
}

// ── Driver ────────────────────────────────────────────────────

/// Byte-based progress display for file input.
#[derive(Debug)]
pub struct Progress {
    bar: ProgressBar,
    bytes: Option<ByteCounter>,
}

impl Progress {
    /// No output.
    #[must_use]
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
            bytes: None,
        }
    }

    /// A bar sized to the file, or hidden for stdin, JSON input, `--silent`,
    /// or when stderr is not a terminal.
    #[must_use]
    pub fn for_source(source: &RowSource, silent: bool) -> Self {
        let Some(total) = source.total_bytes else {
            return Self::hidden();
        };
        if silent || source.format.is_json() || !std::io::stderr().is_terminal() {
            return Self::hidden();
        }

        let bar = ProgressBar::new(total);
        let style = ProgressStyle::with_template(
            "Inserting rows [{bar:40.cyan/blue}] {percent:>3}% {bytes}/{total_bytes}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        Self {
            bar,
            bytes: Some(source.bytes_read.clone()),
        }
    }

    fn update(&self) {
        if let Some(bytes) = &self.bytes {
            self.bar.set_position(bytes.get());
        }
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

/// What a completed run sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertSummary {
    pub batches: usize,
    pub rows: usize,
}

/// A configured bulk insert.
#[derive(Debug, Clone)]
pub struct BulkInsert {
    pub options: InsertOptions,
    pub batch_size: usize,
    pub interval: Option<Duration>,
    /// Guess numeric column types from the first batch.
    pub detect_types: bool,
}

impl BulkInsert {
    #[must_use]
    pub fn new(options: InsertOptions) -> Self {
        Self {
            options,
            batch_size: DEFAULT_BATCH_SIZE,
            interval: Some(DEFAULT_INTERVAL),
            detect_types: true,
        }
    }

    /// Batch `rows`, coerce types and hand each batch to `sink`.
    ///
    /// # Errors
    ///
    /// Returns the first source or sink error; batches already sent stay sent.
    pub fn run<I, C, F>(
        &self,
        rows: I,
        clock: C,
        progress: &Progress,
        mut sink: F,
    ) -> Result<InsertSummary>
    where
        I: Iterator<Item = Result<Row>>,
        C: Clock,
        F: FnMut(&BatchRequest<'_>) -> Result<()>,
    {
        let mut summary = InsertSummary::default();
        let mut types: Option<IndexMap<String, ColumnType>> = None;

        for batch in Batches::new(rows, self.batch_size, self.interval, clock)? {
            let mut batch = batch?;
            progress.update();

            if self.detect_types {
                let types = types.get_or_insert_with(|| {
                    let mut tracker = TypeTracker::new();
                    tracker.observe(&batch);
                    let guessed = tracker.types();
                    debug!(?guessed, "Detected column types");
                    guessed
                });
                batch = batch.iter().map(|row| coerce_row(row, types)).collect();
            }

            let request = BatchRequest {
                options: &self.options,
                rows: &batch,
            };
            debug!(path = %request.path(), rows = batch.len(), "Sending batch");
            sink(&request)?;

            summary.batches += 1;
            summary.rows += batch.len();
        }

        progress.finish();
        info!(batches = summary.batches, rows = summary.rows, "Insert complete");
        Ok(summary)
    }
}
