use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::api::ClusterApi;
use crate::member::{Member, MemberId};
use crate::{Error, Result};

/// Default timeout applied to every request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

static HEALTH_PATH: &str = "health";
static MEMBERS_PATH: &str = "v2/members";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HealthFlag {
    Text(String),
    Bool(bool),
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    health: HealthFlag,
}

impl HealthResponse {
    fn is_healthy(&self) -> bool {
        match &self.health {
            HealthFlag::Text(text) => text == "true",
            HealthFlag::Bool(flag) => *flag,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RosterEntry {
    id: MemberId,

    #[serde(default)]
    name: String,

    #[serde(default, rename = "clientURLs")]
    client_urls: Vec<String>,

    #[serde(default, rename = "peerURLs")]
    peer_urls: Vec<String>,
}

impl From<RosterEntry> for Member {
    fn from(entry: RosterEntry) -> Self {
        Self {
            id: Some(entry.id),
            name: entry.name,
            client_url: entry.client_urls.into_iter().next().unwrap_or_default(),
            peer_urls: entry.peer_urls,
        }
    }
}

#[derive(Debug, Deserialize)]
struct MembersResponse {
    #[serde(default)]
    members: Vec<RosterEntry>,
}

#[derive(Debug, Serialize)]
struct AddMemberRequest<'a> {
    name: &'a str,

    #[serde(rename = "peerURLs")]
    peer_urls: &'a [String],
}

/// Talks to cluster members over HTTP with a bounded per-request timeout.
#[derive(Clone, Debug)]
pub struct EtcdClient {
    client: Client,
}

impl EtcdClient {
    /// Creates a client whose requests time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl ClusterApi for EtcdClient {
    async fn health(&self, client_url: &str) -> Result<bool> {
        let url = endpoint(client_url, HEALTH_PATH)?;
        let response = self.client.get(url.clone()).send().await?;
        let response = ensure_success("GET", &url, response)?;

        let health: HealthResponse = response.json().await?;

        Ok(health.is_healthy())
    }

    async fn list_members(&self, client_url: &str) -> Result<Vec<Member>> {
        let url = endpoint(client_url, MEMBERS_PATH)?;
        let response = self.client.get(url.clone()).send().await?;
        let response = ensure_success("GET", &url, response)?;

        let roster: MembersResponse = response.json().await?;
        debug!("roster at {} has {} members", url, roster.members.len());

        Ok(roster.members.into_iter().map(Member::from).collect())
    }

    async fn add_member(&self, client_url: &str, name: &str, peer_urls: &[String]) -> Result<()> {
        let url = endpoint(client_url, MEMBERS_PATH)?;
        let response = self
            .client
            .post(url.clone())
            .json(&AddMemberRequest { name, peer_urls })
            .send()
            .await?;
        ensure_success("POST", &url, response)?;

        Ok(())
    }

    async fn remove_member(&self, client_url: &str, id: &MemberId) -> Result<()> {
        let url = endpoint(client_url, &format!("{MEMBERS_PATH}/{id}"))?;
        let response = self.client.delete(url.clone()).send().await?;
        ensure_success("DELETE", &url, response)?;

        Ok(())
    }
}

fn endpoint(client_url: &str, path: &str) -> Result<Url> {
    let raw = format!("{}/{path}", client_url.trim_end_matches('/'));

    Url::parse(&raw).map_err(|source| Error::InvalidUrl { url: raw, source })
}

fn ensure_success(method: &'static str, url: &Url, response: Response) -> Result<Response> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(Error::Status {
            method,
            url: url.to_string(),
            status: response.status(),
        })
    }
}
