use std::sync::Arc;

use reqwest::StatusCode;
use thiserror::Error;

/// Represents a result type for operations in the Molasses SDK.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the Molasses SDK.
///
/// Feature evaluation itself never fails. These errors only surface from client construction and
/// from the background threads that refresh features or upload events.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// The client was configured without an API key.
    #[error("API key must be supplied")]
    MissingApiKey,

    /// Invalid base URL configuration.
    #[error("invalid base_url configuration")]
    InvalidBaseUrl(#[source] url::ParseError),

    /// Features were awaited on a client that was never started, or was stopped.
    #[error("client is not started")]
    NotStarted,

    /// The request was unauthorized, possibly due to an invalid API key.
    #[error("unauthorized, api_key is likely invalid")]
    Unauthorized,

    /// The server answered with a status the SDK does not know how to handle.
    #[error("unexpected response status: {0}")]
    UnexpectedStatus(StatusCode),

    /// Indicates that a background refresh thread panicked. This should normally never happen.
    #[error("refresh thread panicked")]
    RefreshThreadPanicked,

    /// An I/O error.
    #[error(transparent)]
    // std::io::Error is not clonable, so we're wrapping it in an Arc.
    Io(Arc<std::io::Error>),

    /// Network error.
    #[error(transparent)]
    Network(Arc<reqwest::Error>),

    /// The server sent a body that is not a valid features payload.
    #[error("error parsing features response")]
    Json(#[source] Arc<serde_json::Error>),
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(Arc::new(value))
    }
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        Error::Network(Arc::new(value.without_url()))
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::Json(Arc::new(value))
    }
}
