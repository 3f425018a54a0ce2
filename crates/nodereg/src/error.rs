use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Configuration file could not be read.
    #[error("failed to read config {0:?}: {1}")]
    ConfigRead(PathBuf, #[source] std::io::Error),

    /// Configuration file is not valid YAML for the expected layout.
    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    #[error(transparent)]
    Etcd(#[from] nodereg_etcd::Error),

    #[error(transparent)]
    Imds(#[from] nodereg_imds::Error),

    /// Configuration values are inconsistent.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("failed to read instance tags: {0}")]
    Tags(#[source] Box<dyn std::error::Error + Send + Sync>),
}
