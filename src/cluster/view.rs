//! Read-only snapshots of nodes and their pods.
//!
//! Every call issues a fresh list against the API server. No caching:
//! tolerating missed watch events matters more here than list latency.

use k8s_openapi::api::core::v1::{Node, Pod};
use kube::api::ListParams;
use kube::{Api, Client};

use crate::error::Result;

/// Pure read side over the cluster API.
#[derive(Clone)]
pub struct ClusterView {
    nodes: Api<Node>,
    client: Client,
}

impl ClusterView {
    pub fn new(client: Client) -> Self {
        Self {
            nodes: Api::all(client.clone()),
            client,
        }
    }

    /// The client this view reads through.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// All registered nodes.
    pub async fn list_nodes(&self) -> Result<Vec<Node>> {
        Ok(self.nodes.list(&ListParams::default()).await?.items)
    }

    /// Nodes whose `Ready` condition is `True`.
    pub async fn list_ready_nodes(&self) -> Result<Vec<Node>> {
        let nodes = self.list_nodes().await?;
        Ok(nodes.into_iter().filter(is_ready).collect())
    }

    /// All pods scheduled on `node`, across every namespace. The filter is
    /// evaluated server-side.
    pub async fn pods_on_node(&self, node: &str) -> Result<Vec<Pod>> {
        let pods: Api<Pod> = Api::all(self.client.clone());
        let params = ListParams::default().fields(&format!("spec.nodeName={node}"));
        Ok(pods.list(&params).await?.items)
    }
}

/// A node is Ready iff its conditions carry `type=Ready, status=True`.
pub fn is_ready(node: &Node) -> bool {
    node.status
        .as_ref()
        .and_then(|status| status.conditions.as_ref())
        .is_some_and(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
}
