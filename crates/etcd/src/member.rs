//! Cluster members and the mapping from group instances to expected members.

use std::fmt;
use std::net::Ipv4Addr;

use nodereg_group::Instance;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Cluster-assigned member identifier.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize)]
pub struct MemberId(String);

impl MemberId {
    /// Wraps a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// The v2 API reports ids as hex strings; numeric ids are accepted as well.
impl<'de> Deserialize<'de> for MemberId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(id) => Self(id),
            Raw::Number(id) => Self(id.to_string()),
        })
    }
}

/// A participant in, or candidate for, the cluster.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Member {
    /// Identifier assigned by the cluster. `None` until the member is admitted.
    pub id: Option<MemberId>,

    /// Stable logical name, taken from the owning instance's identifier.
    pub name: String,

    /// Address serving health and administrative requests. Empty when the
    /// member advertises none.
    pub client_url: String,

    /// Addresses used for replication traffic.
    pub peer_urls: Vec<String>,
}

impl Member {
    /// Returns the client URL, or `None` if the member advertises no client
    /// URL.
    #[must_use]
    pub fn advertised_client_url(&self) -> Option<&str> {
        if self.client_url.is_empty() {
            None
        } else {
            Some(&self.client_url)
        }
    }
}

/// URL scheme for member endpoints.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UrlScheme {
    /// Plain HTTP.
    Http,

    /// HTTP over TLS.
    Https,
}

impl fmt::Display for UrlScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http => f.write_str("http"),
            Self::Https => f.write_str("https"),
        }
    }
}

/// Validated scheme and port settings used to derive member URLs.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MemberUrls {
    client_scheme: UrlScheme,
    client_port: u16,
    peer_scheme: UrlScheme,
    peer_port: u16,
}

impl MemberUrls {
    /// Creates URL settings.
    ///
    /// # Errors
    ///
    /// Returns an error if either port is zero.
    pub fn new(
        client_scheme: UrlScheme,
        client_port: u16,
        peer_scheme: UrlScheme,
        peer_port: u16,
    ) -> Result<Self> {
        if client_port == 0 {
            return Err(Error::InvalidSettings("client port must be non-zero".into()));
        }

        if peer_port == 0 {
            return Err(Error::InvalidSettings("peer port must be non-zero".into()));
        }

        Ok(Self {
            client_scheme,
            client_port,
            peer_scheme,
            peer_port,
        })
    }

    /// Client URL for a member at `address`.
    #[must_use]
    pub fn client_url(&self, address: Ipv4Addr) -> String {
        format!("{}://{}:{}", self.client_scheme, address, self.client_port)
    }

    /// Peer URL for a member at `address`.
    #[must_use]
    pub fn peer_url(&self, address: Ipv4Addr) -> String {
        format!("{}://{}:{}", self.peer_scheme, address, self.peer_port)
    }

    /// Builds the member an instance is expected to be.
    #[must_use]
    pub fn member_for(&self, instance: &Instance) -> Member {
        Member {
            id: None,
            name: instance.instance_id.clone(),
            client_url: self.client_url(instance.private_ip),
            peer_urls: vec![self.peer_url(instance.private_ip)],
        }
    }

    /// Builds the expected membership for a group, one member per instance in
    /// the group's order.
    #[must_use]
    pub fn expected_members(&self, instances: &[Instance]) -> Vec<Member> {
        instances
            .iter()
            .map(|instance| self.member_for(instance))
            .collect()
    }
}

/// Builds the comma-separated `name=peer_url` list a cluster agent is started
/// with.
#[must_use]
pub fn initial_cluster(members: &[Member]) -> String {
    members
        .iter()
        .flat_map(|member| {
            member
                .peer_urls
                .iter()
                .map(move |peer_url| format!("{}={peer_url}", member.name))
        })
        .collect::<Vec<_>>()
        .join(",")
}
