//! Decides how the local node enters the cluster and applies the membership
//! changes that decision requires.

use std::collections::HashSet;
use std::fmt;

use tracing::{error, info, warn};

use crate::Result;
use crate::api::ClusterApi;
use crate::member::{Member, initial_cluster};
use crate::probe::find_healthy_member;

/// How the local cluster agent should start.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BootstrapState {
    /// No member is running; the expected members found a new cluster.
    New,

    /// A cluster is running and the local node joins it.
    Existing,
}

impl BootstrapState {
    /// The value the cluster agent expects for its initial cluster state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Existing => "existing",
        }
    }
}

impl fmt::Display for BootstrapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one reconciliation run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReconciliationOutcome {
    /// Whether the local agent founds or joins the cluster.
    pub state: BootstrapState,

    /// Initial cluster list derived from the expected members.
    pub initial_cluster: String,

    /// The member whose administrative API was used, if any.
    pub healthy_member: Option<Member>,

    /// Stale members that were removed.
    pub removed: Vec<Member>,

    /// Stale members whose removal failed or was impossible.
    pub failed_removals: Vec<Member>,

    /// Whether the local node was added to the cluster.
    pub added_self: bool,
}

/// Reconciles the live cluster roster against the expected membership.
#[derive(Clone, Debug)]
pub struct Reconciler<A>
where
    A: ClusterApi,
{
    api: A,
}

impl<A> Reconciler<A>
where
    A: ClusterApi,
{
    /// Creates a reconciler driving the given cluster API.
    pub const fn new(api: A) -> Self {
        Self { api }
    }

    /// Returns the cluster API.
    pub const fn api(&self) -> &A {
        &self.api
    }

    /// Runs reconciliation for the `local` member against the `expected`
    /// membership.
    ///
    /// # Errors
    ///
    /// Returns an error if a healthy member fails to list its roster or
    /// refuses to admit the local node. Removal failures are not errors.
    pub async fn reconcile(
        &self,
        expected: &[Member],
        local: &Member,
    ) -> Result<ReconciliationOutcome> {
        let initial_cluster = initial_cluster(expected);

        if !expected.iter().any(|member| member.name == local.name) {
            warn!(
                "local member {} is not among the expected members",
                local.name
            );
        }

        let Some(healthy_member) = find_healthy_member(&self.api, expected).await else {
            info!("bootstrapping a new cluster");

            return Ok(ReconciliationOutcome {
                state: BootstrapState::New,
                initial_cluster,
                healthy_member: None,
                removed: Vec::new(),
                failed_removals: Vec::new(),
                added_self: false,
            });
        };

        let client_url = healthy_member.client_url.as_str();
        let existing = self.api.list_members(client_url).await?;
        info!("cluster at {} has {} members", client_url, existing.len());

        let (removed, failed_removals) = self.remove_stale(client_url, expected, &existing).await;

        let added_self = if existing.iter().any(|member| member.name == local.name) {
            info!("member {} is already part of the cluster", local.name);
            false
        } else {
            info!(
                "adding member {} with peer urls {:?} to cluster at {}",
                local.name, local.peer_urls, client_url
            );
            self.api
                .add_member(client_url, &local.name, &local.peer_urls)
                .await?;
            info!("added member {} to cluster at {}", local.name, client_url);
            true
        };

        Ok(ReconciliationOutcome {
            state: BootstrapState::Existing,
            initial_cluster,
            healthy_member: Some(healthy_member),
            removed,
            failed_removals,
            added_self,
        })
    }

    async fn remove_stale(
        &self,
        client_url: &str,
        expected: &[Member],
        existing: &[Member],
    ) -> (Vec<Member>, Vec<Member>) {
        let expected_names: HashSet<&str> = expected.iter().map(|m| m.name.as_str()).collect();
        let mut seen_ids = HashSet::new();
        let mut removed = Vec::new();
        let mut failed = Vec::new();

        for member in existing
            .iter()
            .filter(|member| !expected_names.contains(member.name.as_str()))
        {
            warn!("stale member detected: {:?}", member);

            let Some(id) = &member.id else {
                error!("stale member {} has no id, cannot remove", member.name);
                failed.push(member.clone());
                continue;
            };

            if !seen_ids.insert(id.clone()) {
                continue;
            }

            match self.api.remove_member(client_url, id).await {
                Ok(()) => {
                    info!("removed stale member {} ({})", member.name, id);
                    removed.push(member.clone());
                }
                Err(e) => {
                    error!("error while removing member {} ({}): {}", member.name, id, e);
                    failed.push(member.clone());
                }
            }
        }

        (removed, failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::Ipv4Addr;

    use nodereg_group::Instance;

    use crate::member::{MemberId, MemberUrls, UrlScheme};
    use crate::mock::{Call, MockCluster};

    fn urls() -> MemberUrls {
        MemberUrls::new(UrlScheme::Http, 2379, UrlScheme::Http, 2380).unwrap()
    }

    fn expected() -> Vec<Member> {
        urls().expected_members(&[
            Instance::new("i-1", Ipv4Addr::new(10, 0, 0, 1)),
            Instance::new("i-2", Ipv4Addr::new(10, 0, 0, 2)),
        ])
    }

    fn live(member: &Member, id: &str) -> Member {
        Member {
            id: Some(MemberId::new(id)),
            ..member.clone()
        }
    }

    #[tokio::test]
    async fn test_new_cluster_when_nothing_is_healthy() {
        let expected = expected();
        let reconciler = Reconciler::new(MockCluster::new());

        let outcome = reconciler.reconcile(&expected, &expected[0]).await.unwrap();

        assert_eq!(outcome.state, BootstrapState::New);
        assert_eq!(
            outcome.initial_cluster,
            "i-1=http://10.0.0.1:2380,i-2=http://10.0.0.2:2380"
        );
        assert!(outcome.healthy_member.is_none());
        assert!(reconciler.api().mutations().is_empty());
    }

    #[tokio::test]
    async fn test_join_removes_stale_and_adds_self() {
        let expected = expected();
        let stale = Member {
            id: Some(MemberId::new("55")),
            name: "i-1_stale".to_string(),
            client_url: "http://10.0.0.1:2379".to_string(),
            peer_urls: vec!["http://10.0.0.1:2380".to_string()],
        };
        let cluster = MockCluster::new();
        cluster.set_healthy("http://10.0.0.1:2379");
        cluster.set_roster(vec![stale.clone()]);
        let reconciler = Reconciler::new(cluster);

        let outcome = reconciler.reconcile(&expected, &expected[1]).await.unwrap();

        assert_eq!(outcome.state, BootstrapState::Existing);
        assert_eq!(outcome.removed, vec![stale]);
        assert!(outcome.added_self);
        assert_eq!(
            reconciler.api().mutations(),
            vec![
                Call::Remove {
                    client_url: "http://10.0.0.1:2379".to_string(),
                    id: MemberId::new("55"),
                },
                Call::Add {
                    client_url: "http://10.0.0.1:2379".to_string(),
                    name: "i-2".to_string(),
                    peer_urls: vec!["http://10.0.0.2:2380".to_string()],
                },
            ]
        );
        assert_eq!(
            outcome.initial_cluster,
            "i-1=http://10.0.0.1:2380,i-2=http://10.0.0.2:2380"
        );
    }

    #[tokio::test]
    async fn test_join_when_already_present() {
        let expected = expected();
        let cluster = MockCluster::new();
        cluster.set_healthy("http://10.0.0.1:2379");
        cluster.set_roster(vec![live(&expected[0], "a1"), live(&expected[1], "b2")]);
        let reconciler = Reconciler::new(cluster);

        let outcome = reconciler.reconcile(&expected, &expected[1]).await.unwrap();

        assert_eq!(outcome.state, BootstrapState::Existing);
        assert!(!outcome.added_self);
        assert!(outcome.removed.is_empty());
        assert!(reconciler.api().mutations().is_empty());
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let expected = expected();
        let cluster = MockCluster::new();
        cluster.set_healthy("http://10.0.0.1:2379");
        cluster.set_roster(vec![live(&expected[0], "a1")]);
        let reconciler = Reconciler::new(cluster);

        let first = reconciler.reconcile(&expected, &expected[1]).await.unwrap();
        assert!(first.added_self);
        let mutations_after_first = reconciler.api().mutations().len();

        let second = reconciler.reconcile(&expected, &expected[1]).await.unwrap();

        assert!(!second.added_self);
        assert_eq!(reconciler.api().mutations().len(), mutations_after_first);
        assert_eq!(first.initial_cluster, second.initial_cluster);
    }

    #[tokio::test]
    async fn test_removes_exactly_the_stale_members() {
        let expected = expected();
        let gone_a = Member {
            id: Some(MemberId::new("10")),
            name: "i-old-a".to_string(),
            client_url: "http://10.0.0.8:2379".to_string(),
            peer_urls: vec!["http://10.0.0.8:2380".to_string()],
        };
        let gone_b = Member {
            id: Some(MemberId::new("11")),
            name: "i-old-b".to_string(),
            client_url: String::new(),
            peer_urls: vec!["http://10.0.0.9:2380".to_string()],
        };
        let cluster = MockCluster::new();
        cluster.set_healthy("http://10.0.0.2:2379");
        cluster.set_roster(vec![
            gone_a.clone(),
            live(&expected[0], "a1"),
            gone_b.clone(),
            live(&expected[1], "b2"),
        ]);
        let reconciler = Reconciler::new(cluster);

        let outcome = reconciler.reconcile(&expected, &expected[0]).await.unwrap();

        let removed_ids: Vec<_> = reconciler
            .api()
            .mutations()
            .into_iter()
            .filter_map(|call| match call {
                Call::Remove { id, .. } => Some(id),
                Call::Add { .. } => None,
            })
            .collect();
        assert_eq!(removed_ids, vec![MemberId::new("10"), MemberId::new("11")]);
        assert_eq!(outcome.removed, vec![gone_a, gone_b]);
        assert!(!outcome.added_self);
    }

    #[tokio::test]
    async fn test_stale_members_sharing_an_id_are_removed_once() {
        let expected = expected();
        let first = Member {
            id: Some(MemberId::new("77")),
            name: "i-old".to_string(),
            client_url: String::new(),
            peer_urls: vec!["http://10.0.0.7:2380".to_string()],
        };
        let duplicate = Member {
            name: "i-old-again".to_string(),
            ..first.clone()
        };
        let cluster = MockCluster::new();
        cluster.set_healthy("http://10.0.0.1:2379");
        cluster.set_roster(vec![
            live(&expected[0], "a1"),
            first.clone(),
            duplicate,
        ]);
        let reconciler = Reconciler::new(cluster);

        let outcome = reconciler.reconcile(&expected, &expected[0]).await.unwrap();

        assert_eq!(
            reconciler.api().mutations(),
            vec![Call::Remove {
                client_url: "http://10.0.0.1:2379".to_string(),
                id: MemberId::new("77"),
            }]
        );
        assert_eq!(outcome.removed, vec![first]);
        assert!(outcome.failed_removals.is_empty());
    }

    #[tokio::test]
    async fn test_local_member_outside_expected_set_still_joins() {
        let expected = expected()[..1].to_vec();
        let local = urls().member_for(&Instance::new("i-2", Ipv4Addr::new(10, 0, 0, 2)));
        let cluster = MockCluster::new();
        cluster.set_healthy("http://10.0.0.1:2379");
        cluster.set_roster(vec![live(&expected[0], "a1")]);
        let reconciler = Reconciler::new(cluster);

        let outcome = reconciler.reconcile(&expected, &local).await.unwrap();

        assert_eq!(outcome.state, BootstrapState::Existing);
        assert!(outcome.added_self);
        assert_eq!(outcome.initial_cluster, "i-1=http://10.0.0.1:2380");
    }

    #[tokio::test]
    async fn test_removal_failure_does_not_abort() {
        let expected = expected();
        let stale = Member {
            id: Some(MemberId::new("55")),
            name: "i-gone".to_string(),
            client_url: String::new(),
            peer_urls: Vec::new(),
        };
        let cluster = MockCluster::new();
        cluster.set_healthy("http://10.0.0.1:2379");
        cluster.set_roster(vec![stale.clone()]);
        cluster.fail_removals();
        let reconciler = Reconciler::new(cluster);

        let outcome = reconciler.reconcile(&expected, &expected[0]).await.unwrap();

        assert_eq!(outcome.state, BootstrapState::Existing);
        assert!(outcome.removed.is_empty());
        assert_eq!(outcome.failed_removals, vec![stale]);
        assert!(outcome.added_self);
    }

    #[tokio::test]
    async fn test_stale_member_without_id_is_skipped() {
        let expected = expected();
        let stale = Member {
            id: None,
            name: "i-gone".to_string(),
            client_url: String::new(),
            peer_urls: Vec::new(),
        };
        let cluster = MockCluster::new();
        cluster.set_healthy("http://10.0.0.1:2379");
        cluster.set_roster(vec![stale.clone(), live(&expected[0], "a1")]);
        let reconciler = Reconciler::new(cluster);

        let outcome = reconciler.reconcile(&expected, &expected[0]).await.unwrap();

        assert_eq!(outcome.failed_removals, vec![stale]);
        assert!(reconciler.api().mutations().is_empty());
    }

    #[tokio::test]
    async fn test_add_failure_is_fatal() {
        let expected = expected();
        let cluster = MockCluster::new();
        cluster.set_healthy("http://10.0.0.1:2379");
        cluster.set_roster(vec![live(&expected[0], "a1")]);
        cluster.fail_adds();
        let reconciler = Reconciler::new(cluster);

        let result = reconciler.reconcile(&expected, &expected[1]).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_roster_failure_is_fatal() {
        let expected = expected();
        let cluster = MockCluster::new();
        cluster.set_healthy("http://10.0.0.1:2379");
        cluster.fail_roster();
        let reconciler = Reconciler::new(cluster);

        let result = reconciler.reconcile(&expected, &expected[1]).await;

        assert!(result.is_err());
        assert!(reconciler.api().mutations().is_empty());
    }

    #[test]
    fn test_state_strings() {
        assert_eq!(BootstrapState::New.to_string(), "new");
        assert_eq!(BootstrapState::Existing.to_string(), "existing");
    }
}
