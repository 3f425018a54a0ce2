use std::process::ExitStatus;

use reqwest::StatusCode;
use thiserror::Error;

/// Result type for cluster bootstrap operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while bootstrapping cluster membership.
#[derive(Debug, Error)]
pub enum Error {
    /// The group membership source failed.
    #[error("failed to resolve group membership: {0}")]
    Group(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// HTTP request to a cluster member failed.
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Member URL settings are invalid.
    #[error("invalid member url settings: {0}")]
    InvalidSettings(String),

    /// A member URL could not be parsed.
    #[error("invalid url {url:?}: {source}")]
    InvalidUrl {
        /// The offending URL.
        url: String,

        /// The parse failure.
        #[source]
        source: url::ParseError,
    },

    /// IO operation failed.
    #[error("{0}: {1}")]
    Io(&'static str, #[source] std::io::Error),

    /// A command exited unsuccessfully.
    #[error("{0} unexpectedly exited with non-zero code: {1}")]
    NonZeroExit(&'static str, ExitStatus),

    /// A cluster member answered with a non-success status.
    #[error("{method} {url} returned {status}")]
    Status {
        /// The HTTP method of the request.
        method: &'static str,

        /// The requested URL.
        url: String,

        /// The status returned.
        status: StatusCode,
    },
}
