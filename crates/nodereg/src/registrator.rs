use std::collections::HashMap;

use nodereg_etcd::{
    DropInWriter, EtcdBootstrap, EtcdBootstrapOptions, EtcdClient, ReconciliationOutcome,
    ServiceManager,
};
use nodereg_group::{GroupMembershipSource, Instance, InstanceTags};
use tracing::info;

use crate::config::Config;
use crate::{Error, Result};

/// What a registration run did.
#[derive(Debug)]
pub enum RunOutcome {
    /// The instance is an image build and must not register.
    ImageBuild,

    /// The instance was registered with its cluster.
    Registered(ReconciliationOutcome),
}

/// Sequences the registration steps for the local instance.
pub struct Registrator<G, T, M>
where
    G: GroupMembershipSource,
    T: InstanceTags,
    M: ServiceManager,
{
    ami_build_tag: Option<String>,
    etcd: EtcdBootstrap<G, EtcdClient, M>,
    tags: T,
}

impl<G, T, M> Registrator<G, T, M>
where
    G: GroupMembershipSource,
    T: InstanceTags,
    M: ServiceManager,
{
    pub fn new(config: &Config, group: G, tags: T, service_manager: M) -> Result<Self> {
        let etcd = EtcdBootstrap::new(EtcdBootstrapOptions {
            cluster_api: EtcdClient::new(config.request_timeout())?,
            drop_in: DropInWriter::new(config.etcd.drop_in_file.clone(), service_manager),
            group,
            member_urls: config.member_urls()?,
        });

        Ok(Self {
            ami_build_tag: config.base.ami_build_tag.clone(),
            etcd,
            tags,
        })
    }

    pub async fn run(&self, local: &Instance) -> Result<RunOutcome> {
        if let Some(tag) = &self.ami_build_tag {
            let tags = self
                .tags
                .instance_tags(&local.instance_id)
                .await
                .map_err(|e| Error::Tags(Box::new(e)))?;

            if is_image_build(&tags, tag) {
                info!("image build detected via tag {}", tag);
                return Ok(RunOutcome::ImageBuild);
            }
        }

        let outcome = self.etcd.run(local).await?;
        info!(
            "registered {} with state {} (removed {}, added self: {})",
            local.instance_id,
            outcome.state,
            outcome.removed.len(),
            outcome.added_self
        );

        Ok(RunOutcome::Registered(outcome))
    }
}

fn is_image_build(tags: &HashMap<String, String>, tag: &str) -> bool {
    tags.get(tag).is_some_and(|value| !value.is_empty())
}
