//! Series sources: where a plot's points come from after each build.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;

use crate::logging::{log, obj, v_str, Domain, Level};
use crate::point::Point;

/// How `exclusion_values` is applied to a CSV series' columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InclusionFlag {
    #[default]
    Off,
    IncludeByString,
    ExcludeByString,
    IncludeByColumn,
    ExcludeByColumn,
}

/// Column selection compiled from an [`InclusionFlag`] and its value list.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ColumnSelect {
    All,
    IncludeLabels(BTreeSet<String>),
    ExcludeLabels(BTreeSet<String>),
    IncludeColumns(BTreeSet<usize>),
    ExcludeColumns(BTreeSet<usize>),
}

impl ColumnSelect {
    fn compile(flag: InclusionFlag, values: Option<&str>) -> Self {
        let Some(values) = values else {
            return ColumnSelect::All;
        };
        match flag {
            InclusionFlag::Off => ColumnSelect::All,
            InclusionFlag::IncludeByString => ColumnSelect::IncludeLabels(parse_labels(values)),
            InclusionFlag::ExcludeByString => ColumnSelect::ExcludeLabels(parse_labels(values)),
            InclusionFlag::IncludeByColumn => ColumnSelect::IncludeColumns(parse_columns(values)),
            InclusionFlag::ExcludeByColumn => ColumnSelect::ExcludeColumns(parse_columns(values)),
        }
    }

    fn excludes(&self, label: &str, index: usize) -> bool {
        match self {
            ColumnSelect::All => false,
            ColumnSelect::IncludeLabels(set) => !set.contains(label),
            ColumnSelect::ExcludeLabels(set) => set.contains(label),
            ColumnSelect::IncludeColumns(set) => !set.contains(&index),
            ColumnSelect::ExcludeColumns(set) => set.contains(&index),
        }
    }
}

fn parse_labels(values: &str) -> BTreeSet<String> {
    values
        .split(',')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_columns(values: &str) -> BTreeSet<usize> {
    values
        .split(',')
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.trim().parse::<usize>() {
            Ok(n) => Some(n),
            Err(err) => {
                log(
                    Level::Error,
                    Domain::Series,
                    "bad_column_number",
                    obj(&[("value", v_str(s)), ("msg", v_str(&err.to_string()))]),
                );
                None
            }
        })
        .collect()
}

/// Expands `%name%`, `%index%` and `%build%` in a point URL template.
pub fn expand_url(template: Option<&str>, label: &str, index: usize, build_number: u64) -> Option<String> {
    template.map(|t| {
        t.replace("%name%", label)
            .replace("%index%", &index.to_string())
            .replace("%build%", &build_number.to_string())
    })
}

/// A CSV file in the build workspace: first line holds the series labels,
/// each later line contributes one point per non-blank cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvSeries {
    pub file: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub inclusion_flag: InclusionFlag,
    #[serde(default)]
    pub exclusion_values: Option<String>,
    #[serde(default)]
    pub display_table: bool,
}

impl CsvSeries {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            url: None,
            inclusion_flag: InclusionFlag::Off,
            exclusion_values: None,
            display_table: false,
        }
    }

    /// Loads this series' points for `build_number` from `workspace`.
    ///
    /// Never fails: a missing or unreadable file yields no points and a
    /// diagnostic.
    pub fn load_points(&self, workspace: &Path, build_number: u64) -> Vec<Point> {
        let path = workspace.join(&self.file);
        let display = path.display().to_string();
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                log(
                    Level::Info,
                    Domain::Series,
                    "no_series_file",
                    obj(&[("path", v_str(&display))]),
                );
                return Vec::new();
            }
            Err(err) => {
                log(
                    Level::Error,
                    Domain::Series,
                    "series_read_failed",
                    obj(&[("path", v_str(&display)), ("msg", v_str(&err.to_string()))]),
                );
                return Vec::new();
            }
        };

        let select = ColumnSelect::compile(self.inclusion_flag, self.exclusion_values.as_deref());
        let mut rows = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(file)
            .into_records();

        let header = match rows.next() {
            Some(Ok(h)) => h,
            Some(Err(err)) => {
                log(
                    Level::Error,
                    Domain::Series,
                    "series_read_failed",
                    obj(&[("path", v_str(&display)), ("msg", v_str(&err.to_string()))]),
                );
                return Vec::new();
            }
            None => return Vec::new(),
        };

        let mut points = Vec::new();
        for row in rows {
            let row = match row {
                Ok(r) => r,
                Err(err) => {
                    log(
                        Level::Error,
                        Domain::Series,
                        "series_read_failed",
                        obj(&[("path", v_str(&display)), ("msg", v_str(&err.to_string()))]),
                    );
                    break;
                }
            };
            for (index, value) in row.iter().enumerate() {
                // trailing delimiters leave blank cells
                if value.trim().is_empty() {
                    continue;
                }
                let label = match header.get(index) {
                    Some(l) if !l.is_empty() => l.to_string(),
                    _ => index.to_string(),
                };
                if select.excludes(&label, index) {
                    log(
                        Level::Trace,
                        Domain::Series,
                        "column_excluded",
                        obj(&[("label", v_str(&label)), ("index", serde_json::json!(index))]),
                    );
                    continue;
                }
                let url = expand_url(self.url.as_deref(), &label, index, build_number);
                points.push(Point::new(value, label, build_number).with_url(url));
            }
        }
        points
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn workspace(body: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("data.csv"), body).unwrap();
        dir
    }

    #[test]
    fn loads_one_point_per_cell_with_urls() {
        let ws = workspace("a,b,c\n1,2,3\n");
        let mut series = CsvSeries::new("data.csv");
        series.url = Some("http://localhost:8080/%name%/%index%/%build%".to_string());
        let points = series.load_points(ws.path(), 12);
        assert_eq!(points.len(), 3);
        assert_eq!(points[1].label, "b");
        assert_eq!(points[1].value, "2");
        assert_eq!(points[1].build_number, 12);
        assert_eq!(points[1].url, "http://localhost:8080/b/1/12");
    }

    #[test]
    fn trailing_delimiter_adds_no_point() {
        let ws = workspace("a,b,\n1,2,\n");
        let points = CsvSeries::new("data.csv").load_points(ws.path(), 1);
        assert_eq!(points.len(), 2);
    }

    #[test]
    fn missing_label_falls_back_to_index() {
        let ws = workspace("a\n1,2\n");
        let points = CsvSeries::new("data.csv").load_points(ws.path(), 1);
        assert_eq!(points[1].label, "1");
    }

    #[test]
    fn exclusion_by_string_and_column() {
        let ws = workspace("a,b,c\n1,2,3\n");
        let mut series = CsvSeries::new("data.csv");
        series.inclusion_flag = InclusionFlag::ExcludeByString;
        series.exclusion_values = Some("b".to_string());
        let labels: Vec<_> = series
            .load_points(ws.path(), 1)
            .into_iter()
            .map(|p| p.label)
            .collect();
        assert_eq!(labels, vec!["a", "c"]);

        series.inclusion_flag = InclusionFlag::IncludeByColumn;
        series.exclusion_values = Some("0,2,zz".to_string());
        let labels: Vec<_> = series
            .load_points(ws.path(), 1)
            .into_iter()
            .map(|p| p.label)
            .collect();
        assert_eq!(labels, vec!["a", "c"]);
    }

    #[test]
    fn flag_without_values_includes_everything() {
        let ws = workspace("a,b\n1,2\n");
        let mut series = CsvSeries::new("data.csv");
        series.inclusion_flag = InclusionFlag::IncludeByString;
        assert_eq!(series.load_points(ws.path(), 1).len(), 2);
    }

    #[test]
    fn missing_file_yields_nothing() {
        let dir = TempDir::new().unwrap();
        assert!(CsvSeries::new("absent.csv").load_points(dir.path(), 1).is_empty());
    }

    #[test]
    fn flag_names_match_config_spelling() {
        let f: InclusionFlag = serde_json::from_str("\"EXCLUDE_BY_COLUMN\"").unwrap();
        assert_eq!(f, InclusionFlag::ExcludeByColumn);
    }
}
