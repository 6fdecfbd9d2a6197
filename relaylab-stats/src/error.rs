use std::path::PathBuf;

use relaylab_core::domain::RunnerId;
use thiserror::Error;

/// Errors from the statistics views.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StatsError {
    #[error("invalid comparison: runner {0} cannot be compared with itself")]
    InvalidComparison(RunnerId),
}

/// Errors from writing export artifacts.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV output is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Parquet error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
