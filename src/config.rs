use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::plot::{JobContext, Plot};

#[derive(Debug, Clone)]
pub struct Config {
    /// Job directory holding the per-plot record stores.
    pub root: PathBuf,
    /// JSON file with the plot definitions.
    pub plot_config: PathBuf,
    /// Build workspace the series files are read from when recording.
    pub workspace: PathBuf,
    /// Where exported tables are written.
    pub export_dir: PathBuf,
    /// Build the retention windows count back from; newest stored build when unset.
    pub latest_build: Option<u64>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            root: std::env::var("PLOT_ROOT").unwrap_or_else(|_| ".".to_string()).into(),
            plot_config: std::env::var("PLOT_CONFIG").unwrap_or_else(|_| "plots.json".to_string()).into(),
            workspace: std::env::var("PLOT_WORKSPACE").unwrap_or_else(|_| ".".to_string()).into(),
            export_dir: std::env::var("PLOT_EXPORT_DIR").unwrap_or_else(|_| "out/tables".to_string()).into(),
            latest_build: std::env::var("PLOT_LATEST_BUILD").ok().and_then(|v| v.parse().ok()),
        }
    }

    pub fn job(&self) -> JobContext {
        let job = JobContext::new(&self.root);
        match self.latest_build {
            Some(b) => job.with_latest_build(b),
            None => job,
        }
    }
}

/// On-disk plot definitions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlotsFile {
    #[serde(default)]
    pub plots: Vec<Plot>,
}

impl PlotsFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let body = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        serde_json::from_str(&body).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })
    }
}
