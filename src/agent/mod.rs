//! Per-node poll loop and replacement executor.
//!
//! The loop publishes status, waits for permission, and exits exactly once
//! into the drain + terminate pipeline. There is no clean shutdown path:
//! after a successful recreate call the process idles until the host is
//! destroyed under it. Exiting instead would invite a supervisor restart
//! into an undefined mid-drain state.

pub mod drain;
pub mod poll;

pub use poll::{classify, AgentStatus, PollStep};

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Utc;
use k8s_openapi::api::core::v1::Node;
use kube::{Api, Client};
use tracing::{error, info, warn};

use crate::annotations;
use crate::cloud::NodeProvider;
use crate::cluster::{node_update, ClusterView};
use crate::error::Result;

/// Time between polls of the node object.
const TICK_INTERVAL: Duration = Duration::from_secs(30);
/// Pause before retrying a failed drain or recreate call.
const RETRY_DELAY: Duration = Duration::from_secs(10);
/// Heartbeat of the post-termination idle loop.
const IDLE_INTERVAL: Duration = Duration::from_secs(60);

/// The per-node loop: probe, announce, wait for permission, drain,
/// recreate.
pub struct Agent<P> {
    node_name: String,
    nodes: Api<Node>,
    view: ClusterView,
    provider: P,
    status: AgentStatus,
}

impl<P: NodeProvider + Send + Sync> Agent<P> {
    pub fn new(client: Client, node_name: impl Into<String>, provider: P) -> Self {
        Self {
            node_name: node_name.into(),
            nodes: Api::all(client.clone()),
            view: ClusterView::new(client),
            provider,
            status: AgentStatus::new(Utc::now()),
        }
    }

    /// Publishes the full status triple to the node's annotations.
    async fn publish_status(&self) -> Result<()> {
        let values = BTreeMap::from([
            (
                annotations::UPDATE_NEEDED.to_string(),
                annotations::value(self.status.update_needed).to_string(),
            ),
            (
                annotations::UPDATE_IN_PROGRESS.to_string(),
                annotations::value(self.status.update_in_progress).to_string(),
            ),
            (
                annotations::LAST_CHECKED_TIME.to_string(),
                self.status.last_checked.to_rfc3339(),
            ),
        ]);
        node_update::set_node_annotations(&self.nodes, &self.node_name, &values).await
    }

    /// Runs the poll loop until permission (or force) arrives, then drains
    /// and recreates the host. Never returns.
    pub async fn run(mut self) {
        let mut ticks = tokio::time::interval(TICK_INTERVAL);
        loop {
            ticks.tick().await;

            let node = match self.nodes.get(&self.node_name).await {
                Ok(node) => node,
                Err(e) => {
                    warn!(node = %self.node_name, error = %e, "failed to get own node");
                    continue;
                }
            };

            // Bootstrap does not depend on the cloud being reachable; the
            // probe only runs once the node has been stamped.
            let step = if annotations::has(&node, annotations::UPDATE_NEEDED) {
                match self.provider.needs_replacement().await {
                    Ok(needs) => {
                        self.status.last_checked = Utc::now();
                        poll::classify(&node, needs, &self.status)
                    }
                    Err(e) => {
                        warn!(error = %e, "drift probe failed");
                        continue;
                    }
                }
            } else {
                PollStep::Initialize
            };

            match step {
                PollStep::Initialize => {
                    info!("first run, publishing initial status");
                    if let Err(e) = self.publish_status().await {
                        warn!(error = %e, "failed to publish status");
                    }
                }
                PollStep::AnnounceDrift => {
                    info!("template drift detected");
                    self.status.update_needed = true;
                    if let Err(e) = self.publish_status().await {
                        warn!(error = %e, "failed to announce drift, will retry");
                        // rising edge fires again next tick
                        self.status.update_needed = false;
                    }
                }
                PollStep::BeginForced | PollStep::BeginGranted => {
                    if step == PollStep::BeginForced {
                        info!("forced termination ordered");
                    } else {
                        info!("termination permission received");
                    }
                    self.status.update_in_progress = true;
                    match self.publish_status().await {
                        // The in-progress annotation is the cluster-wide
                        // interlock; draining before it lands is unsafe.
                        Ok(()) => break,
                        Err(e) => {
                            warn!(error = %e, "failed to acknowledge termination, retrying next tick");
                            self.status.update_in_progress = false;
                        }
                    }
                }
                PollStep::Wait => {}
            }
        }

        self.drain_and_terminate().await;

        info!("replacement requested, idling until the host goes away");
        loop {
            tokio::time::sleep(IDLE_INTERVAL).await;
            info!("sleeping...");
        }
    }

    /// Drain, then ask the provider to recreate the host. Both halves
    /// retry until they succeed: the node is already cordoned, so giving
    /// up would strand a useless host.
    async fn drain_and_terminate(&self) {
        loop {
            match drain::drain_node(&self.view, &self.nodes, &self.node_name).await {
                Ok(()) => {
                    info!("node drained");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "drain failed, retrying");
                    tokio::time::sleep(RETRY_DELAY).await;
                }
            }
        }
        loop {
            match self.provider.recreate().await {
                Ok(()) => {
                    info!("node recreation requested");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "recreate failed, retrying");
                    tokio::time::sleep(RETRY_DELAY).await;
                }
            }
        }
    }
}
