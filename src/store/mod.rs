//! Per-plot record stores.
//!
//! A store is a CSV file: a title line, a column-name line, then one row
//! per recorded point (`value,label,build,date,url`). Rows are only ever
//! appended by the build that produced them; readers see a prefix.

pub mod reader;
pub mod summary;

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::logging::{log, log_store_failure, obj, v_str, Domain, Level};
use crate::point::Point;

pub use reader::{Record, RecordReader, HEADER_LINES};
pub use summary::StoreSummary;

pub const COLUMN_NAMES: [&str; 5] = ["Value", "Series Label", "Build Number", "Build Date", "URL"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The store for `file_name` under a job's root directory.
    pub fn in_dir(root: &Path, file_name: &str) -> Self {
        Self::new(root.join(file_name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn reader(&self) -> Result<RecordReader, StoreError> {
        RecordReader::open(&self.path)
    }

    pub fn summarize(&self) -> Result<StoreSummary, StoreError> {
        summary::summarize(&self.path)
    }

    fn display(&self) -> String {
        self.path.display().to_string()
    }

    /// Appends one row per point, creating the store (with its two header
    /// lines) first if needed. Returns the number of rows written.
    pub fn append_points(
        &self,
        title: &str,
        y_axis: &str,
        build_number: u64,
        build_date: &str,
        points: &[Point],
    ) -> Result<usize, StoreError> {
        let path = self.display();
        let fresh = !self.exists();
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| StoreError::io(&path, e))?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| StoreError::io(&path, e))?;
        let mut writer = csv_writer(file);
        if fresh {
            writer
                .write_record([title, y_axis])
                .map_err(|e| StoreError::csv(&path, e))?;
            writer
                .write_record(COLUMN_NAMES)
                .map_err(|e| StoreError::csv(&path, e))?;
        }
        let build = build_number.to_string();
        for point in points {
            writer
                .write_record([
                    point.value.as_str(),
                    point.label.as_str(),
                    build.as_str(),
                    build_date,
                    point.url.as_str(),
                ])
                .map_err(|e| StoreError::csv(&path, e))?;
        }
        writer.flush().map_err(|e| StoreError::io(&path, e))?;

        log(
            Level::Debug,
            Domain::Store,
            "append",
            obj(&[
                ("path", v_str(&path)),
                ("build", serde_json::json!(build_number)),
                ("rows", serde_json::json!(points.len())),
            ]),
        );
        Ok(points.len())
    }

    /// Rewrites the store keeping the header lines, every malformed row, and
    /// the records whose build passes `keep`. Returns the number of records
    /// dropped. A missing store is left missing.
    pub fn retain_builds<F>(&self, keep: F) -> Result<usize, StoreError>
    where
        F: Fn(u64) -> bool,
    {
        let path = self.display();
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(StoreError::io(&path, err)),
        };

        let mut kept = Vec::new();
        let mut dropped = 0usize;
        for (i, row) in reader::csv_reader(file).into_byte_records().enumerate() {
            let row = row.map_err(|e| StoreError::csv(&path, e))?;
            if (i as u64) < HEADER_LINES {
                kept.push(row);
                continue;
            }
            match reader::parse_row(&row, i as u64 + 1) {
                Ok(record) if !keep(record.build_number) => dropped += 1,
                _ => kept.push(row),
            }
        }
        if dropped == 0 {
            return Ok(0);
        }

        let tmp = self.path.with_extension("csv.tmp");
        let tmp_display = tmp.display().to_string();
        let result = (|| {
            let file = File::create(&tmp).map_err(|e| StoreError::io(&tmp_display, e))?;
            let mut writer = csv_writer(file);
            for row in &kept {
                writer
                    .write_byte_record(row)
                    .map_err(|e| StoreError::csv(&tmp_display, e))?;
            }
            let mut file = writer
                .into_inner()
                .map_err(|e| StoreError::io(&tmp_display, e.into_error()))?;
            file.flush().map_err(|e| StoreError::io(&tmp_display, e))?;
            fs::rename(&tmp, &self.path).map_err(|e| StoreError::io(&path, e))
        })();
        if let Err(err) = result {
            let _ = fs::remove_file(&tmp);
            log_store_failure(&path, "retain", &err.to_string());
            return Err(err);
        }

        log(
            Level::Info,
            Domain::Store,
            "retain",
            obj(&[
                ("path", v_str(&path)),
                ("dropped", serde_json::json!(dropped)),
            ]),
        );
        Ok(dropped)
    }
}

fn csv_writer(file: File) -> csv::Writer<File> {
    csv::WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_writer(file)
}
