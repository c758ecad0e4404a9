use thiserror::Error;

/// Failures while reading or writing a record store.
///
/// A missing store and a malformed row are not errors: the first reads as
/// an empty store, the second is skipped with a diagnostic.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error on {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
}

impl StoreError {
    pub fn io(path: &str, source: std::io::Error) -> Self {
        StoreError::Io { path: path.to_string(), source }
    }

    pub fn csv(path: &str, source: csv::Error) -> Self {
        StoreError::Csv { path: path.to_string(), source }
    }
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("no plot at index {index} (group has {len})")]
    NotFound { index: usize, len: usize },

    #[error("invalid plot index {0:?}")]
    InvalidIndex(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read plot config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid plot config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
