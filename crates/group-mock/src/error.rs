//! Error types for the mock group implementation.

use thiserror::Error;

/// Error type for the mock group implementation.
#[derive(Debug, Error)]
pub enum Error {
    /// The queried instance is not a member of the mock group.
    #[error("instance {0} is not part of any group")]
    InstanceNotInGroup(String),

    /// The mock group was configured to fail.
    #[error("group lookup failed: {0}")]
    Unavailable(String),
}
