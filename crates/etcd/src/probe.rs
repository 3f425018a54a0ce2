use futures::StreamExt;
use futures::stream::FuturesOrdered;
use tracing::{debug, info, warn};

use crate::api::ClusterApi;
use crate::member::Member;

/// Probes every candidate concurrently and returns the healthy candidate that
/// comes first in `candidates`, or `None` if no candidate is healthy.
///
/// Unreachable or unhealthy candidates are skipped. Outstanding probes are
/// dropped as soon as the winner is known.
pub async fn find_healthy_member<A>(api: &A, candidates: &[Member]) -> Option<Member>
where
    A: ClusterApi,
{
    let mut probes: FuturesOrdered<_> = candidates
        .iter()
        .map(|candidate| async move { (candidate, is_healthy(api, candidate).await) })
        .collect();

    while let Some((candidate, healthy)) = probes.next().await {
        if healthy {
            info!(
                "found healthy member {} at {}",
                candidate.name, candidate.client_url
            );
            return Some(candidate.clone());
        }
    }

    info!("no healthy member among {} candidates", candidates.len());

    None
}

async fn is_healthy<A>(api: &A, candidate: &Member) -> bool
where
    A: ClusterApi,
{
    let Some(client_url) = candidate.advertised_client_url() else {
        warn!("member {} advertises no client url, skipping", candidate.name);
        return false;
    };

    match api.health(client_url).await {
        Ok(true) => true,
        Ok(false) => {
            debug!("member {} at {} reports unhealthy", candidate.name, client_url);
            false
        }
        Err(e) => {
            debug!("member {} at {} unreachable: {}", candidate.name, client_url, e);
            false
        }
    }
}
