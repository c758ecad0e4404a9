//! Build-indexed, series-keyed pivot tables.
//!
//! Records arrive in store order as (value, label, build). Each distinct
//! label becomes a column the first time it is seen, each distinct build
//! becomes a row the first time it is seen, and later records for the same
//! cell overwrite earlier ones. Rows created before a column existed are
//! padded with empty strings rather than back-filled.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;

use crate::error::StoreError;
use crate::filter::BuildFilter;
use crate::logging::{log_table_built, ProfileScope};
use crate::store::{Record, RecordReader};

pub const BUILD_COLUMN: &str = "Build #";

/// A rectangular table: header first, then one row per build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PivotTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Default for PivotTable {
    fn default() -> Self {
        Self {
            header: vec![BUILD_COLUMN.to_string()],
            rows: Vec::new(),
        }
    }
}

impl PivotTable {
    /// Header-only table, what an empty or unreadable store renders as.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Header followed by data rows, the shape a renderer iterates.
    pub fn rows_with_header(&self) -> Vec<Vec<String>> {
        let mut out = Vec::with_capacity(self.rows.len() + 1);
        out.push(self.header.clone());
        out.extend(self.rows.iter().cloned());
        out
    }

    pub fn width(&self) -> usize {
        self.header.len()
    }

    pub fn is_rectangular(&self) -> bool {
        self.rows.iter().all(|r| r.len() == self.header.len())
    }

    /// Cell for `(build, label)`, if both exist. `build` matches the
    /// build field as it was stored.
    pub fn cell(&self, build: &str, label: &str) -> Option<&str> {
        let col = self.header.iter().skip(1).position(|h| h == label)? + 1;
        self.rows
            .iter()
            .find(|r| r[0] == build)
            .map(|r| r[col].as_str())
    }

    pub fn write_csv<W: Write>(&self, out: W) -> Result<(), csv::Error> {
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(out);
        writer.write_record(&self.header)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!(self.rows_with_header())
    }
}

/// Incremental pivot construction.
///
/// Columns are looked up through a label index that never contains the
/// build column, so a series literally named `Build #` gets a column of
/// its own. Rows are looked up through an index on the stored build
/// field, compared as text; row order is the order builds were first seen.
#[derive(Debug)]
pub struct PivotBuilder {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
    columns: HashMap<String, usize>,
    row_of_build: HashMap<String, usize>,
}

impl Default for PivotBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PivotBuilder {
    pub fn new() -> Self {
        Self {
            header: vec![BUILD_COLUMN.to_string()],
            rows: Vec::new(),
            columns: HashMap::new(),
            row_of_build: HashMap::new(),
        }
    }

    fn column(&mut self, label: &str) -> usize {
        if let Some(&idx) = self.columns.get(label) {
            return idx;
        }
        let idx = self.header.len();
        self.header.push(label.to_string());
        self.columns.insert(label.to_string(), idx);
        idx
    }

    fn row(&mut self, build: &str) -> &mut Vec<String> {
        let idx = match self.row_of_build.get(build) {
            Some(&idx) => idx,
            None => {
                self.rows.push(vec![build.to_string()]);
                let idx = self.rows.len() - 1;
                self.row_of_build.insert(build.to_string(), idx);
                idx
            }
        };
        &mut self.rows[idx]
    }

    pub fn push(&mut self, value: &str, label: &str, build: &str) {
        let col = self.column(label);
        let row = self.row(build);
        if col < row.len() {
            row[col] = value.to_string();
        } else {
            row.resize(col, String::new());
            row.push(value.to_string());
        }
    }

    pub fn push_record(&mut self, record: &Record) {
        self.push(&record.value, &record.label, &record.build);
    }

    pub fn finish(mut self) -> PivotTable {
        let width = self.header.len();
        for row in &mut self.rows {
            row.resize(width, String::new());
        }
        PivotTable {
            header: self.header,
            rows: self.rows,
        }
    }
}

/// Folds a record stream into a table, dropping builds the filter rejects
/// before they touch the header or rows. The first stream error aborts.
pub fn build_table<I, F>(records: I, filter: &F) -> Result<PivotTable, StoreError>
where
    I: IntoIterator<Item = Result<Record, StoreError>>,
    F: BuildFilter + ?Sized,
{
    let mut builder = PivotBuilder::new();
    for record in records {
        let record = record?;
        if !filter.should_include(record.build_number) {
            continue;
        }
        builder.push_record(&record);
    }
    Ok(builder.finish())
}

/// Reads a whole store into a table.
pub fn table_from_reader<F>(mut reader: RecordReader, filter: &F) -> Result<PivotTable, StoreError>
where
    F: BuildFilter + ?Sized,
{
    let _scope = ProfileScope::new("table_from_reader");
    let table = build_table(&mut reader, filter)?;
    log_table_built(reader.path(), table.width(), table.rows.len(), reader.skipped());
    Ok(table)
}
