use thiserror::Error;

/// Failures while reading a dataset from disk or over HTTP.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to fetch {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("missing required column '{0}'")]
    MissingColumn(&'static str),
}

/// Errors surfaced to consumers of the loaded data. Cloneable so a failed
/// load can be reported by every view that depends on it.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DataError {
    #[error("{source_name} is unavailable: {reason}")]
    Unavailable {
        source_name: &'static str,
        reason: String,
    },

    #[error("no qualifying records for season {0}")]
    EmptySeason(i32),

    #[error("{0}")]
    InvalidQuery(String),
}

impl DataError {
    pub fn unavailable(source_name: &'static str, err: impl std::fmt::Display) -> Self {
        DataError::Unavailable {
            source_name,
            reason: err.to_string(),
        }
    }
}
