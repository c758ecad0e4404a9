use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Decides whether a build's records make it into a table.
///
/// Called once per record, so implementations must be pure and cheap.
pub trait BuildFilter {
    fn should_include(&self, build_number: u64) -> bool;
}

impl<F> BuildFilter for F
where
    F: Fn(u64) -> bool,
{
    fn should_include(&self, build_number: u64) -> bool {
        self(build_number)
    }
}

/// Accepts every build.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllBuilds;

impl BuildFilter for AllBuilds {
    fn should_include(&self, _build_number: u64) -> bool {
        true
    }
}

/// Retention window plus explicit exclusions, as configured on a plot.
///
/// With `num_builds = Some(n)` only the last `n` builds up to and
/// including `latest_build` are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InclusionPolicy {
    #[serde(default)]
    pub num_builds: Option<u64>,
    #[serde(default)]
    pub excluded: BTreeSet<u64>,
    #[serde(skip)]
    pub latest_build: Option<u64>,
}

impl InclusionPolicy {
    pub fn window(num_builds: u64) -> Self {
        Self {
            num_builds: Some(num_builds),
            ..Default::default()
        }
    }

    pub fn excluding(mut self, builds: impl IntoIterator<Item = u64>) -> Self {
        self.excluded.extend(builds);
        self
    }

    /// Anchors the retention window at the job's most recent build.
    pub fn anchored_at(mut self, latest_build: u64) -> Self {
        self.latest_build = Some(latest_build);
        self
    }
}

impl BuildFilter for InclusionPolicy {
    fn should_include(&self, build_number: u64) -> bool {
        if self.excluded.contains(&build_number) {
            return false;
        }
        match (self.num_builds, self.latest_build) {
            (Some(n), Some(latest)) => {
                build_number <= latest && latest - build_number < n
            }
            _ => true,
        }
    }
}
