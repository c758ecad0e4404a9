use serde::{Deserialize, Serialize};
use std::fmt;

/// One measurement of one series for one build.
///
/// The value is kept exactly as the series file had it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub value: String,
    pub label: String,
    pub build_number: u64,
    #[serde(default)]
    pub url: String,
}

impl Point {
    pub fn new(value: impl Into<String>, label: impl Into<String>, build_number: u64) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
            build_number,
            url: String::new(),
        }
    }

    pub fn with_url(mut self, url: Option<String>) -> Self {
        self.url = url.unwrap_or_default();
        self
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.label, self.url, self.value)
    }
}
