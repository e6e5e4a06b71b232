//! Instance metadata service client.
//!
//! Every GCE host serves its own identity on a fixed internal endpoint;
//! requests must carry the `Metadata-Flavor: Google` header.

use reqwest::Client;
use serde::Deserialize;

use super::{Error, Result};

const METADATA_BASE_URL: &str = "http://metadata.google.internal";
const FLAVOR_HEADER: &str = "Metadata-Flavor";
const FLAVOR_VALUE: &str = "Google";

/// Access token minted for the instance's default service account.
#[derive(Debug, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    pub expires_in: u64,
    pub token_type: String,
}

/// Client for the instance metadata service.
#[derive(Clone)]
pub struct MetadataClient {
    base_url: String,
    client: Client,
}

impl MetadataClient {
    pub fn new() -> Self {
        Self::with_base_url(METADATA_BASE_URL)
    }

    /// Points the client at a non-standard endpoint. Tests use this.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: Client::new(),
        }
    }

    async fn get_instance_item(&self, item: &str) -> Result<String> {
        let url = format!("{}/computeMetadata/v1/instance/{}", self.base_url, item);
        let response = self
            .client
            .get(&url)
            .header(FLAVOR_HEADER, FLAVOR_VALUE)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::Status {
                context: format!("metadata item {item}"),
                status: response.status(),
            });
        }
        Ok(response.text().await?)
    }

    /// Short instance name, as the compute API addresses it.
    pub async fn instance_name(&self) -> Result<String> {
        self.get_instance_item("name").await
    }

    /// Fully qualified hostname; doubles as the cluster node name.
    pub async fn hostname(&self) -> Result<String> {
        self.get_instance_item("hostname").await
    }

    /// Zone the instance runs in, reported as `projects/<n>/zones/<zone>`.
    pub async fn zone(&self) -> Result<String> {
        self.get_instance_item("zone").await
    }

    /// OAuth2 token for the instance's default service account.
    pub async fn access_token(&self) -> Result<AccessToken> {
        let url = format!(
            "{}/computeMetadata/v1/instance/service-accounts/default/token",
            self.base_url
        );
        let response = self
            .client
            .get(&url)
            .header(FLAVOR_HEADER, FLAVOR_VALUE)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::Status {
                context: "service account token".to_string(),
                status: response.status(),
            });
        }
        Ok(response.json().await?)
    }
}

impl Default for MetadataClient {
    fn default() -> Self {
        Self::new()
    }
}
