use std::path::{Path, PathBuf};
use std::time::Duration;

use nodereg_etcd::{DEFAULT_REQUEST_TIMEOUT, MemberUrls, UrlScheme};
use serde::Deserialize;

use crate::{Error, Result};

/// Settings that apply to every registration step.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BaseConfig {
    /// Root of the target system when provisioning from outside it.
    pub chroot_path: Option<PathBuf>,

    /// Tag that marks an instance as an image build.
    pub ami_build_tag: Option<String>,
}

/// Settings for the etcd registration step.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EtcdConfig {
    pub client_scheme: UrlScheme,
    pub client_port: u16,
    pub peer_scheme: UrlScheme,
    pub peer_port: u16,

    /// Where the agent's systemd drop-in is written.
    pub drop_in_file: PathBuf,

    /// Timeout for each request to a cluster member.
    pub request_timeout_secs: u64,
}

impl Default for EtcdConfig {
    fn default() -> Self {
        Self {
            client_scheme: UrlScheme::Http,
            client_port: 2379,
            peer_scheme: UrlScheme::Http,
            peer_port: 2380,
            drop_in_file: PathBuf::from(
                "/etc/systemd/system/etcd-member.service.d/20-cluster.conf",
            ),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT.as_secs(),
        }
    }
}

/// Registrator configuration.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub base: BaseConfig,
    pub etcd: EtcdConfig,
}

impl Config {
    /// Loads the configuration from `path`, or the defaults when no path is
    /// given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let contents =
            std::fs::read_to_string(path).map_err(|e| Error::ConfigRead(path.to_path_buf(), e))?;

        Self::from_yaml(&contents)
    }

    /// Parses and validates a YAML document. An empty document yields the
    /// defaults.
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: Self = if contents.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(contents)?
        };

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.member_urls()?;

        if self.etcd.request_timeout_secs == 0 {
            return Err(Error::InvalidConfig(
                "etcd.request_timeout_secs must be non-zero".into(),
            ));
        }

        let drop_in = &self.etcd.drop_in_file;
        if !drop_in.is_absolute() || drop_in.file_name().is_none() {
            return Err(Error::InvalidConfig(format!(
                "etcd.drop_in_file must be an absolute file path, got {}",
                drop_in.display()
            )));
        }

        if let Some(tag) = &self.base.ami_build_tag {
            if tag.is_empty() {
                return Err(Error::InvalidConfig(
                    "base.ami_build_tag must not be empty".into(),
                ));
            }
        }

        Ok(())
    }

    pub fn member_urls(&self) -> Result<MemberUrls> {
        MemberUrls::new(
            self.etcd.client_scheme,
            self.etcd.client_port,
            self.etcd.peer_scheme,
            self.etcd.peer_port,
        )
        .map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.etcd.request_timeout_secs)
    }
}
