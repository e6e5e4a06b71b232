//! Compute API adapter for instances owned by a regional instance group
//! manager.
//!
//! The instance's own metadata names both its active template and the
//! group manager that created it; the group manager names the template it
//! currently wants. Drift is a disagreement between the two. Recreation
//! goes through the group manager so the replacement picks up the new
//! template.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::metadata::MetadataClient;
use super::{Error, NodeProvider, Result};

const COMPUTE_BASE_URL: &str = "https://compute.googleapis.com/compute/v1";

/// Metadata item naming the template the instance was built from.
const TEMPLATE_KEY: &str = "instance-template";
/// Metadata item naming the controller that created the instance.
const CREATED_BY_KEY: &str = "created-by";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Instance {
    self_link: String,
    #[serde(default)]
    metadata: InstanceMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct InstanceMetadata {
    #[serde(default)]
    items: Vec<MetadataItem>,
}

#[derive(Debug, Deserialize)]
struct MetadataItem {
    key: String,
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstanceGroupManager {
    instance_template: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecreateInstancesRequest {
    instances: Vec<String>,
}

/// Reduces a cross-referenced resource link to its bare name.
///
/// `.../global/instanceTemplates/worker-v42` and
/// `projects/12345/zones/us-east1-b` both collapse to their final path
/// segment; a bare name passes through unchanged.
pub fn resource_name(link: &str) -> &str {
    match link.rfind('/') {
        Some(i) => &link[i + 1..],
        None => link,
    }
}

/// Compute-API-backed [`NodeProvider`] for a single instance.
pub struct GceNodeProvider {
    http: reqwest::Client,
    metadata: MetadataClient,
    project: String,
    region: String,
    zone: String,
    instance: String,
}

impl GceNodeProvider {
    pub fn new(
        metadata: MetadataClient,
        project: &str,
        region: &str,
        zone: &str,
        instance: &str,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            metadata,
            project: project.to_string(),
            region: region.to_string(),
            // the metadata service reports zones as projects/<n>/zones/<zone>
            zone: resource_name(zone).to_string(),
            instance: instance.to_string(),
        }
    }

    async fn bearer(&self) -> Result<String> {
        Ok(self.metadata.access_token().await?.access_token)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, context: &str) -> Result<T> {
        let token = self.bearer().await?;
        let response = self.http.get(url).bearer_auth(token).send().await?;
        if !response.status().is_success() {
            return Err(Error::Status {
                context: context.to_string(),
                status: response.status(),
            });
        }
        Ok(response.json().await?)
    }

    async fn get_instance(&self) -> Result<Instance> {
        let url = format!(
            "{COMPUTE_BASE_URL}/projects/{}/zones/{}/instances/{}",
            self.project, self.zone, self.instance
        );
        self.get_json(&url, "instance get").await
    }

    fn metadata_item<'a>(instance: &'a Instance, key: &'static str) -> Result<&'a str> {
        instance
            .metadata
            .items
            .iter()
            .find(|item| item.key == key)
            .and_then(|item| item.value.as_deref())
            .ok_or(Error::MissingMetadata(key))
    }

    async fn get_group_manager(&self, name: &str) -> Result<InstanceGroupManager> {
        let url = format!(
            "{COMPUTE_BASE_URL}/projects/{}/regions/{}/instanceGroupManagers/{}",
            self.project, self.region, name
        );
        self.get_json(&url, "instance group manager get").await
    }

    /// Whether the template object itself still exists. A 404 means it was
    /// deleted out from under the instance.
    async fn template_exists(&self, template: &str) -> Result<bool> {
        let url = format!(
            "{COMPUTE_BASE_URL}/projects/{}/global/instanceTemplates/{}",
            self.project,
            resource_name(template)
        );
        let token = self.bearer().await?;
        let response = self.http.get(&url).bearer_auth(token).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !response.status().is_success() {
            return Err(Error::Status {
                context: "instance template get".to_string(),
                status: response.status(),
            });
        }
        Ok(true)
    }
}

#[async_trait]
impl NodeProvider for GceNodeProvider {
    async fn needs_replacement(&self) -> Result<bool> {
        let instance = self.get_instance().await?;
        let active = Self::metadata_item(&instance, TEMPLATE_KEY)?;
        let creator = Self::metadata_item(&instance, CREATED_BY_KEY)?;

        let manager = self.get_group_manager(resource_name(creator)).await?;
        if resource_name(&manager.instance_template) != resource_name(active) {
            return Ok(true);
        }

        // An unchanged name can still point at nothing; a vanished template
        // counts as drift.
        Ok(!self.template_exists(active).await?)
    }

    async fn recreate(&self) -> Result<()> {
        let instance = self.get_instance().await?;
        let creator = Self::metadata_item(&instance, CREATED_BY_KEY)?.to_string();
        let url = format!(
            "{COMPUTE_BASE_URL}/projects/{}/regions/{}/instanceGroupManagers/{}/recreateInstances",
            self.project,
            self.region,
            resource_name(&creator)
        );
        let body = RecreateInstancesRequest {
            instances: vec![instance.self_link.clone()],
        };
        let token = self.bearer().await?;
        let response = self.http.post(&url).bearer_auth(token).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(Error::Status {
                context: "recreate instances".to_string(),
                status: response.status(),
            });
        }
        Ok(())
    }
}
