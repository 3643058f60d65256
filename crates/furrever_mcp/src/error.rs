//! Error types for the timeline server.

use furrever_client::FurreverError;
use thiserror::Error;

/// Timeline server errors.
#[derive(Debug, Error)]
pub enum TimelineError {
    /// Backend unreachable or rejected the request. Halts the current fetch cycle.
    #[error("fetch failed: {0}")]
    Fetch(#[from] FurreverError),

    /// A single record could not be normalized. Only ever reported per record.
    #[error("{what}: {message}")]
    Parse { what: String, message: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("configuration error: {0}")]
    Config(String),

    /// A newer timeline request was issued while this one was in flight.
    #[error("superseded by a newer timeline request")]
    Superseded,
}

impl TimelineError {
    pub fn parse(what: impl Into<String>, message: impl Into<String>) -> Self {
        TimelineError::Parse {
            what: what.into(),
            message: message.into(),
        }
    }
}

impl From<TimelineError> for String {
    fn from(err: TimelineError) -> Self {
        err.to_string()
    }
}

/// Result type alias for timeline operations.
pub type TimelineResult<T> = Result<T, TimelineError>;
