//! Structured CSV log of detection results.
//!
//! Every processed result set produces at least one row: one per entity, or a single
//! all-`nan` row when nothing was detected. Downstream checks rely on the row count
//! matching the number of processed frames.

use std::io::Write;

use anyhow::{Context, Result};

use crate::frame::{EntityId, ResultSet};

/// Marker for a missing value. Never an empty cell.
pub const NOT_AVAILABLE: &str = "nan";

pub const TIMESTAMP_COLUMN: &str = "TimeStamp";

/// Decimal places for the leading timestamp column.
pub const TIMESTAMP_PRECISION: usize = 2;
/// Decimal places for pixel coordinates.
pub const COORD_PRECISION: usize = 0;
/// Decimal places for confidences and metrics.
pub const METRIC_PRECISION: usize = 4;

/// Fixed column layout for one entity payload type.
///
/// Columns exclude the leading timestamp, which the log writes itself.
pub trait RowSchema {
    type Entity;

    fn columns(&self) -> Vec<String>;

    /// Fields for one entity, same length and order as `columns()`.
    fn row(&self, id: EntityId, entity: &Self::Entity) -> Vec<String>;
}

/// Fixed-precision number, or `nan` for non-finite values.
pub fn fixed(value: f32, precision: usize) -> String {
    if value.is_finite() {
        format!("{:.*}", precision, value)
    } else {
        NOT_AVAILABLE.to_string()
    }
}

pub fn coord(value: f32) -> String {
    fixed(value, COORD_PRECISION)
}

pub fn metric(value: f32) -> String {
    fixed(value, METRIC_PRECISION)
}

pub fn metric_or_nan(value: Option<f32>) -> String {
    value.map(metric).unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// Rows for one result set at `timestamp_ms`, timestamp first.
pub fn serialize<S: RowSchema + ?Sized>(
    schema: &S,
    results: &ResultSet<S::Entity>,
    timestamp_ms: f64,
) -> Vec<Vec<String>> {
    let timestamp = format!("{:.*}", TIMESTAMP_PRECISION, timestamp_ms);
    if results.is_empty() {
        let width = schema.columns().len();
        let mut row = Vec::with_capacity(width + 1);
        row.push(timestamp);
        row.extend(std::iter::repeat(NOT_AVAILABLE.to_string()).take(width));
        return vec![row];
    }

    results
        .iter()
        .map(|(id, entity)| {
            let mut row = vec![timestamp.clone()];
            row.extend(schema.row(*id, entity));
            row
        })
        .collect()
}

/// CSV sink for result rows. Writes the header on creation.
pub struct ResultLog<W: Write, S: RowSchema> {
    writer: csv::Writer<W>,
    schema: S,
    width: usize,
    rows_written: u64,
}

impl<W: Write, S: RowSchema> ResultLog<W, S> {
    pub fn new(out: W, schema: S) -> Result<Self> {
        let mut header = vec![TIMESTAMP_COLUMN.to_string()];
        header.extend(schema.columns());
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .flexible(false)
            .from_writer(out);
        writer
            .write_record(&header)
            .context("write result log header")?;
        Ok(Self {
            writer,
            schema,
            width: header.len(),
            rows_written: 0,
        })
    }

    /// Append the rows for one result set. Returns the number of rows written.
    pub fn write(&mut self, results: &ResultSet<S::Entity>, timestamp_ms: f64) -> Result<usize> {
        let rows = serialize(&self.schema, results, timestamp_ms);
        for row in &rows {
            debug_assert_eq!(row.len(), self.width);
            self.writer
                .write_record(row)
                .context("write result log row")?;
        }
        self.rows_written += rows.len() as u64;
        Ok(rows.len())
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    pub fn column_count(&self) -> usize {
        self.width
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush().context("flush result log")?;
        Ok(())
    }

    /// Flush and hand back the underlying writer.
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|err| anyhow::anyhow!("flush result log: {}", err.error()))
    }
}
