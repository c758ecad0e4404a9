//! Streaming reader over a record store file.

use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;

use crate::error::StoreError;
use crate::logging::log_malformed_record;

/// Lines at the top of every store that carry no records.
pub const HEADER_LINES: u64 = 2;

/// One row of a record store, fields in their fixed positions:
/// value, series label, build number.
///
/// `build` is the build-number field exactly as stored; it is what table
/// rows are keyed on. `build_number` is its parsed form, used for
/// windowing and exclusion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub value: String,
    pub label: String,
    pub build: String,
    pub build_number: u64,
    /// 1-based line the record started on, for diagnostics.
    pub line: u64,
}

/// Why a row was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowFault {
    TooFewFields(usize),
    BadBuildNumber(String),
}

impl std::fmt::Display for RowFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RowFault::TooFewFields(n) => write!(f, "expected 3+ fields, got {}", n),
            RowFault::BadBuildNumber(raw) => write!(f, "bad build number: {:?}", raw),
        }
    }
}

/// Decodes a field, replacing invalid UTF-8 rather than rejecting the row.
pub(crate) fn field(row: &csv::ByteRecord, i: usize) -> String {
    String::from_utf8_lossy(&row[i]).into_owned()
}

pub(crate) fn parse_row(row: &csv::ByteRecord, line: u64) -> Result<Record, RowFault> {
    if row.len() < 3 {
        return Err(RowFault::TooFewFields(row.len()));
    }
    let build = field(row, 2);
    let build_number = build
        .trim()
        .parse::<u64>()
        .map_err(|_| RowFault::BadBuildNumber(build.clone()))?;
    Ok(Record {
        value: field(row, 0),
        label: field(row, 1),
        build,
        build_number,
        line,
    })
}

pub(crate) fn csv_reader(file: File) -> csv::Reader<File> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(file)
}

/// Lazy, scoped reader over a record store.
///
/// The file handle lives inside the iterator and is released as soon as
/// the stream ends, fails, or the reader is dropped. Malformed rows are
/// skipped and counted. Fields are decoded lossily, so bad bytes never
/// cost a row. An I/O failure ends the stream after yielding the error
/// once.
pub struct RecordReader {
    path: String,
    rows: Option<csv::ByteRecordsIntoIter<File>>,
    seen: u64,
    skipped: u64,
}

impl RecordReader {
    /// Opens the store at `path`. A store that does not exist reads as empty.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let display = path.display().to_string();
        let rows = match File::open(path) {
            Ok(file) => Some(csv_reader(file).into_byte_records()),
            Err(err) if err.kind() == ErrorKind::NotFound => None,
            Err(err) => return Err(StoreError::io(&display, err)),
        };
        Ok(Self {
            path: display,
            rows,
            seen: 0,
            skipped: 0,
        })
    }

    /// Rows skipped as malformed so far.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Iterator for RecordReader {
    type Item = Result<Record, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let rows = self.rows.as_mut()?;
            let row = match rows.next() {
                Some(Ok(row)) => row,
                Some(Err(err)) => {
                    self.rows = None;
                    return Some(Err(StoreError::csv(&self.path, err)));
                }
                None => {
                    self.rows = None;
                    return None;
                }
            };
            self.seen += 1;
            if self.seen <= HEADER_LINES {
                continue;
            }
            let line = row.position().map(|p| p.line()).unwrap_or(self.seen);
            match parse_row(&row, line) {
                Ok(record) => return Some(Ok(record)),
                Err(fault) => {
                    self.skipped += 1;
                    log_malformed_record(&self.path, line, &fault.to_string());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn store(dir: &TempDir, body: &str) -> std::path::PathBuf {
        let path = dir.path().join("plot.csv");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn missing_store_reads_empty() {
        let dir = TempDir::new().unwrap();
        let reader = RecordReader::open(&dir.path().join("absent.csv")).unwrap();
        assert_eq!(reader.count(), 0);
    }

    #[test]
    fn discards_two_header_lines() {
        let dir = TempDir::new().unwrap();
        let path = store(
            &dir,
            "Title,Count\nValue,Series Label,Build Number\n10,errors,1\n",
        );
        let records: Vec<_> = RecordReader::open(&path)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value, "10");
        assert_eq!(records[0].label, "errors");
        assert_eq!(records[0].build_number, 1);
    }

    #[test]
    fn header_lines_are_discarded_even_when_they_look_like_records() {
        let dir = TempDir::new().unwrap();
        let path = store(&dir, "1,a,1\n2,b,2\n3,c,3\n");
        let records: Vec<_> = RecordReader::open(&path)
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].label, "c");
    }

    #[test]
    fn skips_malformed_rows_and_counts_them() {
        let dir = TempDir::new().unwrap();
        let path = store(
            &dir,
            "t,y\nh1,h2,h3\n10,errors,1\nx,errors,abc\nonly-two,fields\n5,errors,2\n",
        );
        let mut reader = RecordReader::open(&path).unwrap();
        let records: Vec<_> = reader.by_ref().collect::<Result<_, _>>().unwrap();
        assert_eq!(
            records.iter().map(|r| r.build_number).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert_eq!(reader.skipped(), 2);
    }

    #[test]
    fn quoted_fields_keep_commas() {
        let dir = TempDir::new().unwrap();
        let path = store(
            &dir,
            "t,y\nh\n\"1,5\",\"errors, total\",7,2024-01-01,http://x\n",
        );
        let records: Vec<_> = RecordReader::open(&path)
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(records[0].value, "1,5");
        assert_eq!(records[0].label, "errors, total");
        assert_eq!(records[0].build_number, 7);
    }

    #[test]
    fn invalid_utf8_does_not_end_the_stream() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plot.csv");
        let mut body = b"t,y\nh1,h2,h3\n10,errors,1\n3,bad".to_vec();
        body.extend_from_slice(b"\xff,1\n5,errors,2\n");
        fs::write(&path, body).unwrap();
        let mut reader = RecordReader::open(&path).unwrap();
        let records: Vec<_> = reader.by_ref().collect::<Result<_, _>>().unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].label, "bad\u{fffd}");
        assert_eq!(records[2].value, "5");
        assert_eq!(reader.skipped(), 0);
    }

    #[test]
    fn keeps_build_field_as_stored() {
        let dir = TempDir::new().unwrap();
        let path = store(&dir, "t,y\nh\n1,a,01\n2,a, 2\n");
        let records: Vec<_> = RecordReader::open(&path)
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(records[0].build, "01");
        assert_eq!(records[0].build_number, 1);
        assert_eq!(records[1].build, " 2");
        assert_eq!(records[1].build_number, 2);
    }
}
