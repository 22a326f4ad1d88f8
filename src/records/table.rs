use std::collections::HashSet;
use std::path::Path;

use chrono::NaiveDate;

use crate::error::{Context, Result, SyncError};
use crate::utils::write_atomically;

use super::schema::{parse_cell, Record, Schema, Value};

/// Ordered rows of one dataset, laid out by a static schema.
#[derive(Debug, Clone)]
pub struct Table {
    schema: &'static Schema,
    rows: Vec<Record>,
}

impl Table {
    pub fn empty(schema: &'static Schema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
        }
    }

    pub fn from_rows(schema: &'static Schema, rows: Vec<Record>) -> Self {
        Self { schema, rows }
    }

    pub fn schema(&self) -> &'static Schema {
        self.schema
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Value of `column` in every row, in table order.
    pub fn column<'a>(&'a self, column: &str) -> Option<impl Iterator<Item = &'a Value> + 'a> {
        let idx = self.schema.position(column)?;
        Some(self.rows.iter().map(move |row| &row[idx]))
    }

    /// First row whose `column` renders as `needle`.
    pub fn find(&self, column: &str, needle: &str) -> Option<&Record> {
        let idx = self.schema.position(column)?;
        self.rows.iter().find(|row| match &row[idx] {
            Value::Text(text) => text == needle,
            other => other.to_string() == needle,
        })
    }

    /// Temporal key of the last row, as a calendar date.
    pub fn last_key_date(&self) -> Option<NaiveDate> {
        let idx = self.schema.key_position();
        self.rows.last().and_then(|row| row[idx].as_date())
    }

    /// Append `chunks`, drop rows identical across all columns (first one wins), then
    /// stable-sort by the temporal key. Returns how many rows the table grew by.
    pub fn merge(&mut self, chunks: Vec<Vec<Record>>) -> usize {
        let before = self.rows.len();
        let mut seen: HashSet<String> = HashSet::with_capacity(before);
        let mut merged = Vec::with_capacity(before + chunks.iter().map(Vec::len).sum::<usize>());

        for row in self.rows.drain(..).chain(chunks.into_iter().flatten()) {
            if seen.insert(row_fingerprint(&row)) {
                merged.push(row);
            }
        }

        self.rows = merged;
        self.sort_by_key();
        self.rows.len().saturating_sub(before)
    }

    /// Replace every row, keeping the deduplicated, key-ordered invariant.
    pub fn replace(&mut self, rows: Vec<Record>) {
        self.rows.clear();
        self.merge(vec![rows]);
    }

    fn sort_by_key(&mut self) {
        let idx = self.schema.key_position();
        self.rows.sort_by(|a, b| a[idx].as_datetime().cmp(&b[idx].as_datetime()));
    }

    /// Load a table written by `write_csv`. Columns are matched by header name;
    /// missing ones are null.
    pub fn read_csv(path: &Path, schema: &'static Schema) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("Failed to open table {}", path.display()))?;

        let headers = reader.headers()?.clone();
        let mapping: Vec<Option<usize>> = schema
            .columns
            .iter()
            .map(|column| headers.iter().position(|header| header == column.name))
            .collect();

        let mut rows = Vec::new();
        for (line, result) in reader.records().enumerate() {
            let record = result
                .with_context(|| format!("Failed to read row {} of {}", line + 1, path.display()))?;

            let mut row = Vec::with_capacity(schema.columns.len());
            for (column, source) in schema.columns.iter().zip(&mapping) {
                let cell = match source.and_then(|idx| record.get(idx)) {
                    Some(raw) => parse_cell(column, raw).map_err(|err| {
                        SyncError::message(format!(
                            "{} row {}: {}",
                            path.display(),
                            line + 1,
                            err
                        ))
                    })?,
                    None => Value::Null,
                };
                row.push(cell);
            }
            rows.push(row);
        }

        let mut table = Self::from_rows(schema, rows);
        table.sort_by_key();
        Ok(table)
    }

    /// Rewrite the whole table at `path`.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        write_atomically(path, |tmp| {
            let mut writer = csv::Writer::from_path(tmp).context("Failed to create CSV writer")?;
            writer.write_record(self.schema.header())?;
            for row in &self.rows {
                writer.write_record(row.iter().map(Value::to_string))?;
            }
            writer.flush()?;
            Ok(())
        })
    }
}

fn row_fingerprint(row: &Record) -> String {
    let mut key = String::new();
    for (idx, cell) in row.iter().enumerate() {
        if idx > 0 {
            key.push('\u{1f}');
        }
        key.push_str(&cell.to_string());
    }
    key
}
