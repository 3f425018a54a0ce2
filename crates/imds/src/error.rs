use reqwest::StatusCode;
use thiserror::Error;

/// Result type for metadata lookups.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to the metadata service.
#[derive(Debug, Error)]
pub enum Error {
    /// The HTTP request failed.
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// The identity document could not be decoded.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// The private address in the identity document is not an IPv4 address.
    #[error("invalid private address {0:?}")]
    PrivateIp(String),

    /// The metadata service answered with a non-success status.
    #[error("metadata service returned {status} for {path}")]
    Status {
        /// The requested path.
        path: &'static str,

        /// The status returned.
        status: StatusCode,
    },
}
