use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;

/// Trip analysis error types
#[derive(Error, Debug)]
pub enum TripError {
    #[error(
        "At index {index}, the previous row had a timestamp later than this one \
         (previous: {previous}, this: {current})"
    )]
    OrderingViolation {
        index: usize,
        previous: DateTime<Utc>,
        current: DateTime<Utc>,
    },

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

impl TripError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TripError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for trip analysis operations
pub type Result<T> = std::result::Result<T, TripError>;
