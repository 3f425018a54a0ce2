//! Writes the systemd drop-in that hands the bootstrap decision to the
//! cluster agent, and asks the service manager to pick it up.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::info;

use crate::reconciler::BootstrapState;
use crate::{Error, Result};

/// A service manager that can be asked to reload its unit definitions.
#[async_trait]
pub trait ServiceManager
where
    Self: Send + Sync + 'static,
{
    /// Reloads unit definitions so the next service start sees new settings.
    async fn reload(&self) -> Result<()>;
}

/// Reloads systemd via `systemctl daemon-reload`, optionally inside a chroot.
#[derive(Clone, Debug, Default)]
pub struct Systemd {
    chroot: Option<PathBuf>,
}

impl Systemd {
    /// Targets the running system.
    #[must_use]
    pub const fn new() -> Self {
        Self { chroot: None }
    }

    /// Targets the system installed under `root`.
    #[must_use]
    pub const fn with_chroot(root: PathBuf) -> Self {
        Self { chroot: Some(root) }
    }

    fn command(&self) -> Command {
        match &self.chroot {
            Some(root) => {
                let mut command = Command::new("chroot");
                command.arg(root).arg("systemctl").arg("daemon-reload");
                command
            }
            None => {
                let mut command = Command::new("systemctl");
                command.arg("daemon-reload");
                command
            }
        }
    }
}

#[async_trait]
impl ServiceManager for Systemd {
    async fn reload(&self) -> Result<()> {
        let output = self
            .command()
            .output()
            .await
            .map_err(|e| Error::Io("failed to run systemctl daemon-reload", e))?;

        if !output.status.success() {
            return Err(Error::NonZeroExit("systemctl daemon-reload", output.status));
        }

        info!("systemd units reloaded");

        Ok(())
    }
}

/// Renders the drop-in for the given initial cluster and state.
#[must_use]
pub fn render_drop_in(initial_cluster: &str, state: BootstrapState) -> String {
    [
        "[Service]".to_string(),
        format!("Environment=ETCD_INITIAL_CLUSTER={initial_cluster}"),
        format!("Environment=ETCD_INITIAL_CLUSTER_STATE={state}"),
    ]
    .join("\n")
}

/// Writes the drop-in to a fixed path and reloads the service manager.
#[derive(Clone, Debug)]
pub struct DropInWriter<M>
where
    M: ServiceManager,
{
    path: PathBuf,
    service_manager: M,
}

impl<M> DropInWriter<M>
where
    M: ServiceManager,
{
    /// Creates a writer for the drop-in at `path`.
    pub const fn new(path: PathBuf, service_manager: M) -> Self {
        Self {
            path,
            service_manager,
        }
    }

    /// Replaces the drop-in contents and reloads the service manager.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the reload fails.
    pub async fn write(&self, initial_cluster: &str, state: BootstrapState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::Io("failed to create drop-in directory", e))?;
        }

        let staging = self.staging_path();
        tokio::fs::write(&staging, render_drop_in(initial_cluster, state))
            .await
            .map_err(|e| Error::Io("failed to write drop-in", e))?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .map_err(|e| Error::Io("failed to move drop-in into place", e))?;

        info!(
            "wrote drop-in {} with state {}",
            self.path.display(),
            state
        );

        self.service_manager.reload().await
    }

    fn staging_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        self.path.with_file_name(format!(".{file_name}.tmp"))
    }
}
