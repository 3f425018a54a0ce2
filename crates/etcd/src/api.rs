use async_trait::async_trait;

use crate::member::{Member, MemberId};
use crate::Result;

/// Administrative operations against a cluster member, addressed by its
/// client URL.
#[async_trait]
pub trait ClusterApi
where
    Self: Send + Sync + 'static,
{
    /// Queries the member's health endpoint. `Ok(false)` means the member
    /// answered but reports itself unhealthy.
    async fn health(&self, client_url: &str) -> Result<bool>;

    /// Fetches the live membership roster as seen by the member.
    async fn list_members(&self, client_url: &str) -> Result<Vec<Member>>;

    /// Asks the member to admit a new member with the given peer URLs.
    async fn add_member(&self, client_url: &str, name: &str, peer_urls: &[String]) -> Result<()>;

    /// Asks the member to evict the member with the given id.
    async fn remove_member(&self, client_url: &str, id: &MemberId) -> Result<()>;
}
