use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::path::Path;

use crate::error::StoreError;
use crate::filter::{BuildFilter, InclusionPolicy};
use crate::point::Point;
use crate::series::CsvSeries;
use crate::logging::{log, log_table_built, obj, v_str, Domain, Level, ProfileScope};
use crate::store::{Record, RecordStore};
use crate::table::{build_table, table_from_reader, PivotTable};

/// Where a job keeps its record stores, and the build the retention
/// window counts back from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobContext {
    pub root: std::path::PathBuf,
    pub latest_build: Option<u64>,
}

impl JobContext {
    pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
        Self {
            root: root.into(),
            latest_build: None,
        }
    }

    pub fn with_latest_build(mut self, build: u64) -> Self {
        self.latest_build = Some(build);
        self
    }
}

/// One chart definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plot {
    pub title: String,
    #[serde(default)]
    pub y_axis: String,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub series: Vec<CsvSeries>,
    /// Store file name under the job root; derived from the title when empty.
    #[serde(default)]
    pub csv_file_name: String,
    /// Retention window: only the last `num_builds` builds are shown.
    #[serde(default)]
    pub num_builds: Option<u64>,
    #[serde(default)]
    pub excluded_builds: BTreeSet<u64>,
    /// Keep records of builds that fall out of the retention window.
    #[serde(default = "default_keep_records")]
    pub keep_records: bool,
}

fn default_keep_records() -> bool {
    true
}

impl Plot {
    pub fn new(title: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            y_axis: String::new(),
            group: group.into(),
            series: Vec::new(),
            csv_file_name: String::new(),
            num_builds: None,
            excluded_builds: BTreeSet::new(),
            keep_records: true,
        }
    }

    pub fn with_store(mut self, file_name: impl Into<String>) -> Self {
        self.csv_file_name = file_name.into();
        self
    }

    pub fn with_series(mut self, series: CsvSeries) -> Self {
        self.series.push(series);
        self
    }

    pub fn with_window(mut self, num_builds: u64) -> Self {
        self.num_builds = Some(num_builds);
        self
    }

    pub fn store_file_name(&self) -> String {
        if !self.csv_file_name.is_empty() {
            return self.csv_file_name.clone();
        }
        let digest = Sha256::digest(format!("{}\u{0}{}", self.group, self.title).as_bytes());
        format!("plot-{}.csv", &hex::encode(digest)[..16])
    }

    pub fn store(&self, root: &Path) -> RecordStore {
        RecordStore::in_dir(root, &self.store_file_name())
    }

    /// The build filter this plot applies, anchored at `latest_build`.
    pub fn inclusion(&self, latest_build: Option<u64>) -> InclusionPolicy {
        InclusionPolicy {
            num_builds: self.num_builds,
            excluded: self.excluded_builds.clone(),
            latest_build,
        }
    }

    pub fn should_include(&self, build_number: u64, latest_build: Option<u64>) -> bool {
        self.inclusion(latest_build).should_include(build_number)
    }

    /// Whether the table view is turned on: the first series is a CSV
    /// series with its display flag set.
    pub fn display_table(&self) -> bool {
        self.series.first().map(|s| s.display_table).unwrap_or(false)
    }

    /// Rebuilds this plot's pivot table from its store.
    ///
    /// When a retention window is configured but the context carries no
    /// latest build, the window is anchored at the newest build in the store.
    /// That case buffers the records so the store is still read only once.
    pub fn table(&self, ctx: &JobContext) -> Result<PivotTable, StoreError> {
        let store = self.store(&ctx.root);
        let mut reader = store.reader()?;
        if self.num_builds.is_none() || ctx.latest_build.is_some() {
            return table_from_reader(reader, &self.inclusion(ctx.latest_build));
        }

        let _scope = ProfileScope::new("table_anchored_at_newest");
        let records: Vec<Record> = reader.by_ref().collect::<Result<_, _>>()?;
        let newest = records.iter().map(|r| r.build_number).max();
        let table = build_table(records.into_iter().map(Ok), &self.inclusion(newest))?;
        log_table_built(reader.path(), table.width(), table.rows.len(), reader.skipped());
        Ok(table)
    }

    /// Loads every series for `build_number` and appends the points to the
    /// store, pruning builds outside the window unless records are kept.
    pub fn record_build(
        &self,
        ctx: &JobContext,
        workspace: &Path,
        build_number: u64,
        build_date: &str,
    ) -> Result<usize, StoreError> {
        let points: Vec<Point> = self
            .series
            .iter()
            .flat_map(|s| s.load_points(workspace, build_number))
            .collect();
        let store = self.store(&ctx.root);
        let written = store.append_points(&self.title, &self.y_axis, build_number, build_date, &points)?;

        if !self.keep_records {
            if let Some(n) = self.num_builds {
                let window = InclusionPolicy::window(n).anchored_at(build_number);
                store.retain_builds(|b| window.should_include(b))?;
            }
        }

        log(
            Level::Info,
            Domain::Store,
            "build_recorded",
            obj(&[
                ("plot", v_str(&self.title)),
                ("build", serde_json::json!(build_number)),
                ("points", serde_json::json!(written)),
            ]),
        );
        Ok(written)
    }
}

impl Ord for Plot {
    fn cmp(&self, other: &Self) -> Ordering {
        self.title
            .cmp(&other.title)
            .then_with(|| self.y_axis.cmp(&other.y_axis))
            .then_with(|| self.store_file_name().cmp(&other.store_file_name()))
    }
}

impl PartialOrd for Plot {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
