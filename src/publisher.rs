use std::collections::HashMap;
use std::path::Path;

use url::form_urlencoded::byte_serialize;

use crate::logging::{log, obj, v_str, Domain, Level};
use crate::plot::{JobContext, Plot};
use crate::report::PlotReport;

pub const NO_GROUP: &str = "nogroup";
pub const DEFAULT_GROUP_NAME: &str = "Plots";

/// URL-friendly key for a group name: empty becomes `nogroup`, slashes
/// become spaces, then the result is percent-encoded.
pub fn url_group(original: &str) -> String {
    let plain = if original.is_empty() {
        NO_GROUP.to_string()
    } else {
        original.replace('/', " ")
    };
    byte_serialize(plain.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// All plots configured on a job, indexed by URL group key.
#[derive(Debug, Clone, Default)]
pub struct PlotPublisher {
    plots: Vec<Plot>,
    groups: HashMap<String, Vec<Plot>>,
}

impl PlotPublisher {
    pub fn new(plots: impl IntoIterator<Item = Plot>) -> Self {
        let mut publisher = Self::default();
        for plot in plots {
            publisher.add_plot(plot);
        }
        publisher
    }

    pub fn add_plot(&mut self, plot: Plot) {
        self.groups
            .entry(url_group(&plot.group))
            .or_default()
            .push(plot.clone());
        self.plots.push(plot);
    }

    pub fn plots(&self) -> &[Plot] {
        &self.plots
    }

    pub fn plots_in(&self, url_group: &str) -> &[Plot] {
        self.groups.get(url_group).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Display names of all groups, sorted.
    pub fn original_groups(&self) -> Vec<String> {
        self.groups().into_iter().map(|(_, name)| name).collect()
    }

    /// `(url key, display name)` for every group, sorted by display name.
    pub fn groups(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .groups
            .keys()
            .map(|k| (k.clone(), self.url_group_to_original_group(Some(k.as_str()))))
            .collect();
        pairs.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        pairs
    }

    /// Display name for a URL group key; empty when the key is unknown.
    pub fn url_group_to_original_group(&self, url_group: Option<&str>) -> String {
        match url_group {
            None | Some(NO_GROUP) => DEFAULT_GROUP_NAME.to_string(),
            Some(key) => self
                .groups
                .get(key)
                .and_then(|plots| plots.first())
                .map(|p| p.group.clone())
                .unwrap_or_default(),
        }
    }

    /// The report page for one group.
    pub fn report(&self, job: JobContext, url_group: &str) -> PlotReport {
        let name = self.url_group_to_original_group(Some(url_group));
        PlotReport::new(job, name, self.plots_in(url_group))
    }

    /// Records this build's points for every plot. A plot that fails is
    /// logged and skipped; recording never fails the build. Returns the
    /// number of points written.
    pub fn record_build(
        &self,
        job: &JobContext,
        workspace: &Path,
        build_number: u64,
        build_date: &str,
    ) -> usize {
        let mut total = 0;
        for plot in &self.plots {
            match plot.record_build(job, workspace, build_number, build_date) {
                Ok(n) => total += n,
                Err(err) => log(
                    Level::Error,
                    Domain::Store,
                    "record_failed",
                    obj(&[("plot", v_str(&plot.title)), ("msg", v_str(&err.to_string()))]),
                ),
            }
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_groups() {
        assert_eq!(url_group(""), "nogroup");
        assert_eq!(url_group("a/b"), "a%20b");
        assert_eq!(url_group("x+y"), "x%2By");
        assert_eq!(url_group("plain"), "plain");
    }

    #[test]
    fn groups_and_names() {
        let p = PlotPublisher::new(vec![
            Plot::new("t1", "Quality/Static"),
            Plot::new("t2", "Quality/Static"),
            Plot::new("t3", "Perf"),
            Plot::new("t4", ""),
        ]);
        assert_eq!(p.plots().len(), 4);
        assert_eq!(p.plots_in("Quality%20Static").len(), 2);
        assert!(p.plots_in("missing").is_empty());
        assert_eq!(p.url_group_to_original_group(Some("nogroup")), "Plots");
        assert_eq!(p.url_group_to_original_group(None), "Plots");
        assert_eq!(p.url_group_to_original_group(Some("Perf")), "Perf");
        assert_eq!(p.url_group_to_original_group(Some("zzz")), "");
        assert_eq!(p.original_groups(), vec!["Perf", "Plots", "Quality/Static"]);
        let keys: Vec<_> = p.groups().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["Perf", "nogroup", "Quality%20Static"]);
    }

    #[test]
    fn report_sorts_group() {
        let p = PlotPublisher::new(vec![Plot::new("b", "g"), Plot::new("a", "g")]);
        let r = p.report(JobContext::new("/nonexistent"), "g");
        assert_eq!(r.group(), "g");
        assert_eq!(r.plot(0).unwrap().title, "a");
    }
}
