//! Error types for the counseling chat core.

/// Errors produced by the completion, persistence and speech adapters.
///
/// Only `Config` is treated as fatal; the session converts or logs the rest.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request never produced a response (DNS, connect, TLS, body read).
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// A response arrived but did not have the expected shape.
    #[error("unexpected response format: {0}")]
    ResponseFormat(String),

    /// The service answered with a non-success HTTP status.
    #[error("{service} returned {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// Reading or writing the backend log record failed.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Speech endpoint, audio file or playback failure.
    #[error("speech synthesis error: {0}")]
    Synthesis(String),

    /// Required configuration is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// User supplied data was rejected before reaching the backend.
    #[error("{0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        // A body that failed to decode still counts as a format problem
        if err.is_decode() {
            Error::ResponseFormat(err.to_string())
        } else {
            Error::Transport(err)
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::ResponseFormat(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
