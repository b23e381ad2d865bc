use std::path::PathBuf;

use thiserror::Error;

/// Why a single benchmark step did not produce a record.
///
/// None of these abort a run: the runner reports the error against the
/// step and moves on to the next one.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StepError {
    #[error("invalid {what}: {value}")]
    InvalidParameter { what: &'static str, value: i64 },
    #[error("{0} unavailable")]
    ResourceUnavailable(String),
    #[error("unexpected failure: {0}")]
    UnexpectedFailure(String),
}

/// Errors raised while saving, loading or exporting results.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("no test results to {0}")]
    Empty(&'static str),
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed results file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read settings {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse settings {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{0} must be positive")]
    NotPositive(&'static str),
}
