//! Binary run at boot to register the instance with its etcd cluster.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::redundant_pub_crate)]

mod config;
mod error;
mod registrator;

use config::Config;
use error::{Error, Result};
use registrator::{Registrator, RunOutcome};

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use nodereg_etcd::Systemd;
use nodereg_group::Instance;
use nodereg_group_asg::AutoScalingGroupSource;
use nodereg_imds::Imds;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a YAML config file
    #[arg(short, long, env = "NODEREG_CONFIG")]
    config: Option<PathBuf>,

    /// Root of the target system for service manager calls
    #[arg(long, env = "NODEREG_CHROOT")]
    chroot: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info", env = "NODEREG_LOG_LEVEL")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(root) = cli.chroot {
        config.base.chroot_path = Some(root);
    }

    let identity = Imds::new().await?.get_identity_document().await?;
    let local = Instance::new(identity.instance_id.clone(), identity.private_ipv4()?);
    info!(
        "running as {} ({}) in {}",
        local.instance_id, local.private_ip, identity.region
    );

    let source = AutoScalingGroupSource::new(identity.region.clone()).await;
    let service_manager = config
        .base
        .chroot_path
        .clone()
        .map_or_else(Systemd::new, Systemd::with_chroot);

    let registrator = Registrator::new(&config, source.clone(), source, service_manager)?;

    match registrator.run(&local).await? {
        RunOutcome::ImageBuild => {
            info!("image build, sleeping forever");
            loop {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
        }
        RunOutcome::Registered(_) => info!("registration complete"),
    }

    Ok(())
}
