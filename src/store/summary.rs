use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use crate::error::StoreError;

use super::reader::{csv_reader, field, parse_row, HEADER_LINES};

/// Shape and fingerprint of a record store, for inspection and manifests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSummary {
    pub path: String,
    pub exists: bool,
    pub hash_sha256: String,
    pub title: Vec<String>,
    pub rows: u64,
    pub bad_rows: u64,
    pub builds: u64,
    pub build_min: Option<u64>,
    pub build_max: Option<u64>,
    /// Series labels in first-seen order.
    pub series: Vec<String>,
    pub warnings: Vec<String>,
}

pub fn summarize(path: &Path) -> Result<StoreSummary, StoreError> {
    let display = path.display().to_string();
    let mut summary = StoreSummary {
        path: display.clone(),
        ..Default::default()
    };

    let file = match File::open(path) {
        Ok(f) => f,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            summary.warnings.push("missing_store".to_string());
            return Ok(summary);
        }
        Err(err) => return Err(StoreError::io(&display, err)),
    };
    summary.exists = true;
    summary.hash_sha256 = file_sha256(path)?;

    let mut builds = BTreeSet::new();
    let mut prev_build: Option<u64> = None;
    let mut header_seen = 0u64;
    for (i, row) in csv_reader(file).into_byte_records().enumerate() {
        let row = row.map_err(|e| StoreError::csv(&display, e))?;
        if (i as u64) < HEADER_LINES {
            if i == 0 {
                summary.title = (0..row.len()).map(|j| field(&row, j)).collect();
            }
            header_seen += 1;
            continue;
        }
        match parse_row(&row, i as u64 + 1) {
            Ok(record) => {
                summary.rows += 1;
                builds.insert(record.build_number);
                if !summary.series.iter().any(|s| s == &record.label) {
                    summary.series.push(record.label);
                }
                if let Some(prev) = prev_build {
                    if record.build_number < prev {
                        summary.warnings.push(format!(
                            "non_monotonic_build: prev={} current={}",
                            prev, record.build_number
                        ));
                    }
                }
                prev_build = Some(record.build_number);
            }
            Err(fault) => {
                summary.bad_rows += 1;
                summary.warnings.push(format!("bad_row: line {}: {}", i + 1, fault));
            }
        }
    }

    if header_seen < HEADER_LINES {
        summary.warnings.push("missing_header".to_string());
    }
    summary.builds = builds.len() as u64;
    summary.build_min = builds.first().copied();
    summary.build_max = builds.last().copied();
    Ok(summary)
}

pub fn file_sha256(path: &Path) -> Result<String, StoreError> {
    let display = path.display().to_string();
    let mut file = File::open(path).map_err(|e| StoreError::io(&display, e))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf).map_err(|e| StoreError::io(&display, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
