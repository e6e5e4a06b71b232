//! Drain pipeline: cordon, evict, delete stragglers, wait out the rest.
//!
//! Eviction honors disruption budgets, so a first pass may leave
//! survivors; those get an unconditional delete on the second pass. Pods
//! that still refuse to die do not block replacement.

use std::time::Duration;

use futures::future::join_all;
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::api::{DeleteParams, EvictParams};
use kube::{Api, Client, ResourceExt};
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

use crate::cluster::{node_update, ClusterView};
use crate::error::Result;

/// Budget for the eviction pass to empty the node.
const EVICTION_TIMEOUT: Duration = Duration::from_secs(10 * 60);
/// Budget for the deletion pass to reap survivors.
const DELETION_TIMEOUT: Duration = Duration::from_secs(2 * 60);
/// Poll cadence while waiting for a pod to disappear.
const POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Pods on the node that a drain should remove.
///
/// DaemonSet pods stay: their controller ignores cordons and would just
/// recreate them. Any owner reference of that kind exempts the pod, with
/// no check that the owning DaemonSet still exists.
pub fn drain_candidates(pods: Vec<Pod>) -> Vec<Pod> {
    pods.into_iter()
        .filter(|pod| {
            let daemon = pod
                .owner_references()
                .iter()
                .any(|reference| reference.kind == "DaemonSet");
            if daemon {
                info!(pod = %pod.name_any(), "excluding DaemonSet pod from drain");
            }
            !daemon
        })
        .collect()
}

/// Cordons the node, evicts what it can, deletes what it must, and waits.
/// Pods that survive both passes are left behind; the caller proceeds to
/// termination regardless.
pub async fn drain_node(view: &ClusterView, nodes: &Api<Node>, node_name: &str) -> Result<()> {
    info!(node = node_name, "marking node unschedulable");
    node_update::set_node_schedulable(nodes, node_name, false).await?;

    // Eviction pass: best effort, disruption budgets respected.
    let pods = drain_candidates(view.pods_on_node(node_name).await?);
    for pod in &pods {
        info!(pod = %pod.name_any(), "evicting pod");
        if let Err(e) = evict_pod(view.client(), pod).await {
            warn!(pod = %pod.name_any(), error = %e, "eviction failed, will delete later");
        }
    }
    sync_pods_termination(view.client(), &pods, EVICTION_TIMEOUT).await;

    // Deletion pass: whatever survived eviction gets removed outright.
    let pods = drain_candidates(view.pods_on_node(node_name).await?);
    for pod in &pods {
        info!(pod = %pod.name_any(), "deleting pod");
        if let Err(e) = delete_pod(view.client(), pod).await {
            warn!(pod = %pod.name_any(), error = %e, "delete failed");
        }
    }
    sync_pods_termination(view.client(), &pods, DELETION_TIMEOUT).await;

    Ok(())
}

fn pod_api(client: &Client, pod: &Pod) -> Api<Pod> {
    Api::namespaced(client.clone(), &pod.namespace().unwrap_or_default())
}

async fn evict_pod(client: &Client, pod: &Pod) -> Result<()> {
    pod_api(client, pod)
        .evict(&pod.name_any(), &EvictParams::default())
        .await?;
    Ok(())
}

async fn delete_pod(client: &Client, pod: &Pod) -> Result<()> {
    pod_api(client, pod)
        .delete(&pod.name_any(), &DeleteParams::default())
        .await?;
    Ok(())
}

/// Waits until the pod is gone, or has been replaced under a new UID,
/// bounded by `timeout`. Transient read errors keep the poll going.
async fn wait_for_pod_gone(client: &Client, pod: &Pod, timeout: Duration) {
    let api = pod_api(client, pod);
    let name = pod.name_any();
    let original_uid = pod.uid();
    let deadline = Instant::now() + timeout;

    while Instant::now() < deadline {
        match api.get_opt(&name).await {
            Ok(None) => {
                info!(pod = %name, "pod terminated");
                return;
            }
            Ok(Some(current)) if current.uid() != original_uid => {
                info!(pod = %name, "pod replaced under a new uid");
                return;
            }
            Ok(Some(_)) => {}
            Err(e) => warn!(pod = %name, error = %e, "failed to get pod"),
        }
        sleep(POLL_INTERVAL).await;
    }
    warn!(pod = %name, "gave up waiting for pod to terminate");
}

/// Runs one disappearance waiter per pod and joins them all.
async fn sync_pods_termination(client: &Client, pods: &[Pod], timeout: Duration) {
    let waiters = pods.iter().map(|pod| wait_for_pod_gone(client, pod, timeout));
    join_all(waiters).await;
}
