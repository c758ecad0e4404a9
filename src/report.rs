//! A group of plots as shown on one report page.
//!
//! The plots are sorted once, when the report is built, and held in an
//! immutable slice. Positions into that slice are what request handlers
//! pass around, so nothing here can reorder it afterwards.

use std::sync::Arc;

use crate::error::ReportError;
use crate::logging::{log, obj, v_str, Domain, Level};
use crate::plot::{JobContext, Plot};
use crate::table::PivotTable;

#[derive(Debug, Clone)]
pub struct PlotReport {
    job: JobContext,
    group: String,
    plots: Arc<[Plot]>,
}

impl PlotReport {
    /// Takes its own copy of `plots` and sorts it.
    pub fn new(job: JobContext, group: impl Into<String>, plots: &[Plot]) -> Self {
        let mut sorted = plots.to_vec();
        sorted.sort();
        Self {
            job,
            group: group.into(),
            plots: sorted.into(),
        }
    }

    pub fn job(&self) -> &JobContext {
        &self.job
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn plots(&self) -> &[Plot] {
        &self.plots
    }

    pub fn len(&self) -> usize {
        self.plots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plots.is_empty()
    }

    pub fn plot(&self, index: usize) -> Result<&Plot, ReportError> {
        self.plots.get(index).ok_or(ReportError::NotFound {
            index,
            len: self.plots.len(),
        })
    }

    /// Resolves an index as it arrives in a request parameter. Anything
    /// that does not name a plot is logged and treated as "no such plot".
    pub fn resolve_index(&self, raw: &str) -> Option<usize> {
        let resolved = raw
            .trim()
            .parse::<usize>()
            .map_err(|_| ReportError::InvalidIndex(raw.to_string()))
            .and_then(|i| self.plot(i).map(|_| i));
        match resolved {
            Ok(i) => Some(i),
            Err(err) => {
                log(
                    Level::Error,
                    Domain::Report,
                    "plot_lookup_failed",
                    obj(&[("group", v_str(&self.group)), ("msg", v_str(&err.to_string()))]),
                );
                None
            }
        }
    }

    pub fn plot_by_param(&self, raw: &str) -> Option<&Plot> {
        self.resolve_index(raw).map(|i| &self.plots[i])
    }

    pub fn display_table_flag(&self, index: usize) -> bool {
        self.plot(index).map(Plot::display_table).unwrap_or(false)
    }

    /// Table for the plot at `index`, failing on a bad index or a store
    /// that cannot be read.
    pub fn try_table(&self, index: usize) -> Result<PivotTable, ReportError> {
        let plot = self.plot(index)?;
        Ok(plot.table(&self.job)?)
    }

    /// Table for the plot at `index`. Failures are logged and render as the
    /// header-only table.
    pub fn table(&self, index: usize) -> PivotTable {
        match self.try_table(index) {
            Ok(table) => table,
            Err(err) => {
                log(
                    Level::Error,
                    Domain::Report,
                    "table_unavailable",
                    obj(&[
                        ("group", v_str(&self.group)),
                        ("index", serde_json::json!(index)),
                        ("msg", v_str(&err.to_string())),
                    ]),
                );
                PivotTable::empty()
            }
        }
    }
}

/// Formats a table cell for display: integers get digit grouping, other
/// numbers get grouping and at most three fraction digits, anything else
/// is returned unchanged.
pub fn format_number(raw: &str) -> String {
    if let Ok(n) = raw.parse::<i64>() {
        return group_digits(n.unsigned_abs().to_string(), n < 0);
    }
    match raw.parse::<f64>() {
        Ok(x) if x.is_finite() => {
            let fixed = format!("{:.3}", x.abs());
            let (int_part, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
            let frac = frac.trim_end_matches('0');
            let mut out = group_digits(int_part.to_string(), x.is_sign_negative());
            if !frac.is_empty() {
                out.push('.');
                out.push_str(frac);
            }
            out
        }
        _ => raw.to_string(),
    }
}

fn group_digits(digits: String, negative: bool) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if negative {
        out.push('-');
    }
    let lead = digits.len() % 3;
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (i + 3 - lead) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
