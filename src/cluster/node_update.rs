//! Optimistic-concurrency writes to Node objects.
//!
//! The API server rejects stale updates with a version conflict; every
//! mutation here re-reads a fresh object and reapplies its closure until
//! the write lands or the retry budget runs out. Exhausting the budget
//! surfaces an error, which every caller answers by logging and retrying
//! on its next tick.

use std::collections::BTreeMap;
use std::time::Duration;

use k8s_openapi::api::core::v1::Node;
use kube::api::PostParams;
use kube::{Api, ResourceExt};
use tracing::debug;

use crate::error::{Error, Result};

/// Conflict retry budget for one logical update.
const CONFLICT_RETRIES: u32 = 10;
/// Base delay of the doubling backoff between conflict retries.
const CONFLICT_BASE_DELAY: Duration = Duration::from_millis(10);
/// Ceiling on a single backoff step.
const CONFLICT_MAX_DELAY: Duration = Duration::from_secs(2);

fn backoff_delay(attempt: u32) -> Duration {
    CONFLICT_BASE_DELAY
        .saturating_mul(2u32.saturating_pow(attempt))
        .min(CONFLICT_MAX_DELAY)
}

fn is_conflict(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(response) if response.code == 409)
}

/// Applies `mutate` to a fresh copy of the node and writes it back,
/// retrying the whole read-apply-write on version conflicts.
pub async fn update_node_retry<F>(api: &Api<Node>, name: &str, mutate: F) -> Result<()>
where
    F: Fn(&mut Node),
{
    for attempt in 0..CONFLICT_RETRIES {
        let mut node = api.get(name).await?;
        mutate(&mut node);
        match api.replace(name, &PostParams::default(), &node).await {
            Ok(_) => return Ok(()),
            Err(e) if is_conflict(&e) => {
                debug!(node = name, attempt, "conflict updating node, retrying");
                tokio::time::sleep(backoff_delay(attempt)).await;
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(Error::UpdateConflict {
        node: name.to_string(),
        attempts: CONFLICT_RETRIES,
    })
}

/// Sets every key in `values` on the node's annotations.
pub async fn set_node_annotations(
    api: &Api<Node>,
    name: &str,
    values: &BTreeMap<String, String>,
) -> Result<()> {
    update_node_retry(api, name, |node| {
        node.annotations_mut()
            .extend(values.iter().map(|(k, v)| (k.clone(), v.clone())));
    })
    .await
}

/// Sets every key in `values` on the node's labels.
pub async fn set_node_labels(
    api: &Api<Node>,
    name: &str,
    values: &BTreeMap<String, String>,
) -> Result<()> {
    update_node_retry(api, name, |node| {
        node.labels_mut()
            .extend(values.iter().map(|(k, v)| (k.clone(), v.clone())));
    })
    .await
}

/// Removes the listed annotation keys from the node.
pub async fn delete_node_annotations(api: &Api<Node>, name: &str, keys: &[&str]) -> Result<()> {
    update_node_retry(api, name, |node| {
        let annotations = node.annotations_mut();
        for key in keys {
            annotations.remove(*key);
        }
    })
    .await
}

/// Marks the node schedulable or unschedulable.
pub async fn set_node_schedulable(api: &Api<Node>, name: &str, schedulable: bool) -> Result<()> {
    update_node_retry(api, name, |node| {
        node.spec.get_or_insert_with(Default::default).unschedulable = Some(!schedulable);
    })
    .await
}
