//! Helper crate to read the node's own identity from the Instance Metadata
//! Service (IMDSv2).
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

pub use error::{Error, Result};

use std::net::Ipv4Addr;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

static IMDS_BASE_URL: &str = "http://169.254.169.254";
static IMDS_IDENTITY_PATH: &str = "/latest/dynamic/instance-identity/document";
static IMDS_TOKEN_PATH: &str = "/latest/api/token";

const TOKEN_TTL_SECONDS: &str = "21600";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// The instance identity document.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityDocument {
    /// The AWS account ID of the instance.
    pub account_id: String,

    /// The CPU architecture of the instance.
    pub architecture: String,

    /// The availability zone of the instance.
    pub availability_zone: String,

    /// The image ID of the instance.
    pub image_id: String,

    /// The instance ID of the instance.
    pub instance_id: String,

    /// The instance type of the instance.
    pub instance_type: String,

    /// The pending time of the instance.
    pub pending_time: String,

    /// The private IP address of the instance.
    pub private_ip: String,

    /// The region of the instance.
    pub region: String,
}

impl IdentityDocument {
    /// Parses the private address of the instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is not a valid IPv4 address.
    pub fn private_ipv4(&self) -> Result<Ipv4Addr> {
        self.private_ip
            .parse()
            .map_err(|_| Error::PrivateIp(self.private_ip.clone()))
    }
}

/// The IMDS client.
pub struct Imds {
    base_url: String,
    client: Client,
    token: String,
}

impl Imds {
    /// Creates a new instance of the IMDS client.
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// - The HTTP request to obtain the token fails
    /// - The response cannot be parsed as text
    pub async fn new() -> Result<Self> {
        Self::with_base_url(IMDS_BASE_URL).await
    }

    /// Creates a client that talks to a metadata service at `base_url`.
    ///
    /// # Errors
    ///
    /// This function will return an error if the session token cannot be
    /// obtained.
    pub async fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into();
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        let token_response = client
            .put(format!("{base_url}{IMDS_TOKEN_PATH}"))
            .header("X-aws-ec2-metadata-token-ttl-seconds", TOKEN_TTL_SECONDS)
            .send()
            .await?;

        if !token_response.status().is_success() {
            return Err(Error::Status {
                path: IMDS_TOKEN_PATH,
                status: token_response.status(),
            });
        }

        let token = token_response.text().await?;

        Ok(Self {
            base_url,
            client,
            token,
        })
    }

    /// Retrieves the instance identity document.
    ///
    /// # Errors
    ///
    /// This function will return an error if the HTTP request fails or the
    /// document cannot be deserialized.
    pub async fn get_identity_document(&self) -> Result<IdentityDocument> {
        let body = self.get_from_endpoint(IMDS_IDENTITY_PATH).await?;
        let document: IdentityDocument = serde_json::from_str(&body)?;

        debug!(
            "identity document: instance {} in {}",
            document.instance_id, document.region
        );

        Ok(document)
    }

    async fn get_from_endpoint(&self, path: &'static str) -> Result<String> {
        let response = self
            .client
            .get(format!("{}{path}", self.base_url))
            .header("X-aws-ec2-metadata-token", &self.token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Status {
                path,
                status: response.status(),
            });
        }

        let body = response.text().await?;

        Ok(body)
    }
}
