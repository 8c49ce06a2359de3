//! Error types for disclosure data operations.
//!
//! This module defines [`DataError`] which covers every failure that can occur
//! when fetching filings from the upstream, forwarding them through the
//! gateway, or caching them for a session.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during data operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataError {
    /// The upstream could not be reached (connection failure, timeout, etc.).
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The upstream answered with a non-success status.
    #[error("Upstream error: HTTP {status} from {url}")]
    UpstreamError {
        /// HTTP status code returned by the upstream.
        status: u16,
        /// Raw response body.
        body: String,
        /// The URL that was requested.
        url: String,
    },

    /// The upstream has no data for the request (HTTP 404), typically a
    /// concept the entity never reported.
    #[error("Not found: {url}")]
    NotFound {
        /// The URL that was requested.
        url: String,
        /// Raw response body.
        body: String,
    },

    /// The gateway's own throttle rejected the request.
    #[error("Rate limited: retry after {retry_after:?}")]
    RateLimited {
        /// Suggested time to wait before retrying.
        retry_after: Option<Duration>,
    },

    /// Missing or invalid configuration, such as the contact header.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Error decoding a payload.
    #[error("Parse error: {0}")]
    Parse(String),

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Error interacting with the session cache.
    #[error("Cache error: {0}")]
    Cache(String),
}

impl DataError {
    /// Maps a non-success HTTP status onto the error taxonomy.
    ///
    /// 404 becomes [`DataError::NotFound`], everything else (429 included)
    /// is passed through as [`DataError::UpstreamError`] with its body.
    #[must_use]
    pub fn from_status(status: u16, body: impl Into<String>, url: impl Into<String>) -> Self {
        match status {
            404 => Self::NotFound {
                url: url.into(),
                body: body.into(),
            },
            _ => Self::UpstreamError {
                status,
                body: body.into(),
                url: url.into(),
            },
        }
    }

    /// Returns the HTTP status that best represents this error.
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self {
            Self::UpstreamError { status, .. } => *status,
            Self::NotFound { .. } => 404,
            Self::RateLimited { .. } => 429,
            Self::InvalidParameter(_) => 400,
            Self::Parse(_) => 502,
            Self::UpstreamUnavailable(_) | Self::Configuration(_) | Self::Cache(_) => 500,
        }
    }
}

/// Result type alias using [`DataError`].
pub type Result<T> = std::result::Result<T, DataError>;
