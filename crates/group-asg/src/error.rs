use thiserror::Error;

/// Result type for group lookups.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while resolving group membership.
#[derive(Debug, Error)]
pub enum Error {
    /// An instance reported an unparseable private address.
    #[error("{0}")]
    AddrParse(#[from] std::net::AddrParseError),

    /// The Auto Scaling API returned an error.
    #[error("{0}")]
    AutoScaling(#[from] aws_sdk_autoscaling::Error),

    /// The EC2 API returned an error.
    #[error("{0}")]
    EC2(#[from] aws_sdk_ec2::Error),

    /// The group named by the instance's membership does not exist.
    #[error("auto scaling group not found: {0}")]
    GroupNotFound(String),

    /// The instance does not belong to any Auto Scaling group.
    #[error("instance {0} is not part of any auto scaling group")]
    InstanceNotInGroup(String),

    /// A required field was absent from an API response.
    #[error("missing instance details")]
    MissingDetails,
}
