//! End-to-end table construction from record stores on disk.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use buildplot::filter::{AllBuilds, BuildFilter, InclusionPolicy};
use buildplot::plot::{JobContext, Plot};
use buildplot::report::PlotReport;
use buildplot::store::RecordStore;
use buildplot::table::{table_from_reader, PivotTable};
use tempfile::TempDir;

const HEADER: &str = "Counts,number\nValue,Series Label,Build Number,Build Date,URL\n";

fn write_store(dir: &Path, name: &str, rows: &[&str]) -> PathBuf {
    let mut body = String::from(HEADER);
    for row in rows {
        body.push_str(row);
        body.push('\n');
    }
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    path
}

fn table_for<F: BuildFilter>(path: &Path, filter: &F) -> PivotTable {
    table_from_reader(RecordStore::new(path).reader().unwrap(), filter).unwrap()
}

fn strs(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|s| s.to_string()).collect()
}

fn assert_invariants(t: &PivotTable) {
    assert!(t.is_rectangular(), "ragged table: {:?}", t);
    let labels: HashSet<_> = t.header.iter().skip(1).collect();
    assert_eq!(labels.len(), t.header.len() - 1, "duplicate column: {:?}", t.header);
    let builds: HashSet<_> = t.rows.iter().map(|r| &r[0]).collect();
    assert_eq!(builds.len(), t.rows.len(), "duplicate build row: {:?}", t.rows);
}

#[test]
fn scenario_all_builds() {
    let dir = TempDir::new().unwrap();
    let path = write_store(dir.path(), "s.csv", &["10,errors,1", "20,warnings,1", "5,errors,2"]);
    let t = table_for(&path, &AllBuilds);
    assert_invariants(&t);
    assert_eq!(t.header, strs(&["Build #", "errors", "warnings"]));
    assert_eq!(t.rows, vec![strs(&["1", "10", "20"]), strs(&["2", "5", ""])]);
}

#[test]
fn scenario_build_two_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_store(dir.path(), "s.csv", &["10,errors,1", "20,warnings,1", "5,errors,2"]);
    let t = table_for(&path, &InclusionPolicy::default().excluding([2]));
    assert_eq!(t.header, strs(&["Build #", "errors", "warnings"]));
    assert_eq!(t.rows, vec![strs(&["1", "10", "20"])]);
}

#[test]
fn scenario_malformed_row_interleaved() {
    let dir = TempDir::new().unwrap();
    let path = write_store(
        dir.path(),
        "s.csv",
        &["10,errors,1", "x,errors,abc", "20,warnings,1", "5,errors,2"],
    );
    let mut reader = RecordStore::new(&path).reader().unwrap();
    let t = buildplot::table::build_table(&mut reader, &AllBuilds).unwrap();
    assert_eq!(reader.skipped(), 1);
    assert_eq!(t.rows, vec![strs(&["1", "10", "20"]), strs(&["2", "5", ""])]);
}

#[test]
fn filtered_records_never_create_columns() {
    let dir = TempDir::new().unwrap();
    let path = write_store(
        dir.path(),
        "s.csv",
        &["1,a,1", "2,only-rejected,2", "3,a,3", "4,b,3"],
    );
    let t = table_for(&path, &|b: u64| b != 2);
    assert_invariants(&t);
    assert_eq!(t.header, strs(&["Build #", "a", "b"]));
    assert_eq!(t.rows, vec![strs(&["1", "1", ""]), strs(&["3", "3", "4"])]);
}

#[test]
fn last_write_wins_across_the_store() {
    let dir = TempDir::new().unwrap();
    let path = write_store(dir.path(), "s.csv", &["1,a,1", "2,b,2", "7,a,1"]);
    let t = table_for(&path, &AllBuilds);
    assert_eq!(t.cell("1", "a"), Some("7"));
    assert_eq!(t.cell("1", "b"), Some(""));
}

#[test]
fn many_builds_stay_rectangular() {
    let dir = TempDir::new().unwrap();
    let mut rows = Vec::new();
    for build in 1..=50u64 {
        for series in 0..(build % 7) {
            rows.push(format!("{},s{},{}", build * 10 + series, series, build));
        }
    }
    let refs: Vec<&str> = rows.iter().map(String::as_str).collect();
    let path = write_store(dir.path(), "s.csv", &refs);
    let t = table_for(&path, &AllBuilds);
    assert_invariants(&t);
    assert_eq!(t.header.len(), 7);
    // builds divisible by 7 recorded no series
    assert_eq!(t.rows.len(), 50 - 7);
}

#[test]
fn bad_bytes_in_one_row_keep_the_rest() {
    let dir = TempDir::new().unwrap();
    let mut body = HEADER.as_bytes().to_vec();
    body.extend_from_slice(b"10,errors,1\n3,bad\xff,1\n5,errors,2\n");
    fs::write(dir.path().join("s.csv"), body).unwrap();
    let plots = vec![Plot::new("S", "g").with_store("s.csv")];
    let report = PlotReport::new(JobContext::new(dir.path()), "g", &plots);
    let t = report.try_table(0).unwrap();
    assert_invariants(&t);
    assert_eq!(t.header, strs(&["Build #", "errors", "bad\u{fffd}"]));
    assert_eq!(t.rows, vec![strs(&["1", "10", "3"]), strs(&["2", "5", ""])]);
}

#[test]
fn build_fields_match_as_stored() {
    let dir = TempDir::new().unwrap();
    let path = write_store(dir.path(), "s.csv", &["10,errors,01", "20,warnings,1", "30,errors, 2"]);
    let t = table_for(&path, &AllBuilds);
    assert_invariants(&t);
    assert_eq!(
        t.rows,
        vec![strs(&["01", "10", ""]), strs(&["1", "", "20"]), strs(&[" 2", "30", ""])]
    );
}

#[test]
fn absent_store_is_header_only() {
    let dir = TempDir::new().unwrap();
    let t = table_for(&dir.path().join("never-recorded.csv"), &AllBuilds);
    assert_eq!(t.rows_with_header(), vec![strs(&["Build #"])]);
}

#[test]
fn report_tables_follow_sorted_positions() {
    let dir = TempDir::new().unwrap();
    write_store(dir.path(), "zeta.csv", &["1,z,1"]);
    write_store(dir.path(), "alpha.csv", &["2,a,1"]);
    let plots = vec![
        Plot::new("Zeta", "g").with_store("zeta.csv"),
        Plot::new("Alpha", "g").with_store("alpha.csv"),
    ];
    let report = PlotReport::new(JobContext::new(dir.path()), "g", &plots);
    assert_eq!(report.table(0).header, strs(&["Build #", "a"]));
    assert_eq!(report.table(1).header, strs(&["Build #", "z"]));
}

#[cfg(unix)]
#[test]
fn unreadable_store_renders_header_only() {
    let dir = TempDir::new().unwrap();
    // a directory where the store file should be cannot be read as a store
    fs::create_dir(dir.path().join("broken.csv")).unwrap();
    let plots = vec![Plot::new("Broken", "g").with_store("broken.csv")];
    let report = PlotReport::new(JobContext::new(dir.path()), "g", &plots);
    assert!(report.try_table(0).is_err());
    assert_eq!(report.table(0), PivotTable::empty());
}
