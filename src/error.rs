//! Error types for the fetch path and the record source

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failure loading the backing dataset.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read dataset {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode dataset {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Failure of a single fetch against a [`RecordSource`](crate::source::RecordSource).
///
/// Cancellation is deliberately absent: a cancelled fetch never produces
/// a value of this type.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level failure reaching the source.
    #[error("transport error: {0}")]
    Transport(String),

    /// The source answered with a non-success status.
    #[error("HTTP error! status: {0}")]
    Status(u16),

    /// The response body could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The source reported an error in the response body.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// No outcome within the configured fetch timeout.
    #[error("request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            FetchError::Status(status.as_u16())
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}
