use nodereg_group::{GroupMembershipSource, Instance};
use tracing::info;

use crate::api::ClusterApi;
use crate::artifact::{DropInWriter, ServiceManager};
use crate::member::MemberUrls;
use crate::reconciler::{ReconciliationOutcome, Reconciler};
use crate::{Error, Result};

/// Options for configuring an `EtcdBootstrap`.
pub struct EtcdBootstrapOptions<G, A, M>
where
    G: GroupMembershipSource,
    A: ClusterApi,
    M: ServiceManager,
{
    /// Cluster API used to probe and mutate membership.
    pub cluster_api: A,

    /// Writer for the agent's drop-in.
    pub drop_in: DropInWriter<M>,

    /// Source of the group's in-service instances.
    pub group: G,

    /// URL settings for member endpoints.
    pub member_urls: MemberUrls,
}

/// Registers the local node with its etcd cluster.
pub struct EtcdBootstrap<G, A, M>
where
    G: GroupMembershipSource,
    A: ClusterApi,
    M: ServiceManager,
{
    drop_in: DropInWriter<M>,
    group: G,
    member_urls: MemberUrls,
    reconciler: Reconciler<A>,
}

impl<G, A, M> EtcdBootstrap<G, A, M>
where
    G: GroupMembershipSource,
    A: ClusterApi,
    M: ServiceManager,
{
    /// Creates a new bootstrap from options.
    pub fn new(
        EtcdBootstrapOptions {
            cluster_api,
            drop_in,
            group,
            member_urls,
        }: EtcdBootstrapOptions<G, A, M>,
    ) -> Self {
        Self {
            drop_in,
            group,
            member_urls,
            reconciler: Reconciler::new(cluster_api),
        }
    }

    /// Resolves expected membership for `local`, reconciles it with the live
    /// cluster and writes the resulting drop-in.
    ///
    /// # Errors
    ///
    /// Returns an error if the group cannot be resolved, the live cluster
    /// rejects a required request, or the drop-in cannot be written.
    pub async fn run(&self, local: &Instance) -> Result<ReconciliationOutcome> {
        let instances = self
            .group
            .in_service_instances(&local.instance_id)
            .await
            .map_err(|e| Error::Group(Box::new(e)))?;
        info!("group has {} in-service instances", instances.len());

        let expected = self.member_urls.expected_members(&instances);
        let local = self.member_urls.member_for(local);

        let outcome = self.reconciler.reconcile(&expected, &local).await?;

        self.drop_in
            .write(&outcome.initial_cluster, outcome.state)
            .await?;

        Ok(outcome)
    }
}
