//! Per-tick admission decision.
//!
//! Grants are rare and everything else is a reason to wait, so a tick is
//! modeled as a total function from a cluster snapshot to one explicit
//! outcome. The loop only executes the outcome; the choice itself lives
//! here, where it can be exercised against synthetic snapshots.

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Node;
use kube::ResourceExt;

use crate::annotations;
use crate::operator::state::State;

/// Label marking control-plane nodes, which are replaced first.
const MASTER_ROLE_LABEL: &str = "role";
const MASTER_ROLE_VALUE: &str = "master";

/// Outcome of a single operator tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Some node is not Ready; no decisions while the cluster is unsettled.
    AwaitReady { total: usize, ready: usize },
    /// Nothing wants replacement; record the current population as the
    /// capacity floor. The only path that raises the floor.
    RecordCapacity(usize),
    /// A grant or drain is already under way somewhere.
    AwaitInFlight,
    /// Fewer Ready nodes than the recorded floor; replacing one now would
    /// shrink the cluster further.
    AwaitCapacity { ready: usize, floor: usize },
    /// Permission for `node`. With `force`, the agent skips its own drift
    /// check.
    Grant { node: String, force: bool },
}

/// Nodes that have announced template drift.
pub fn drift_candidates(nodes: &[Node]) -> Vec<&Node> {
    nodes
        .iter()
        .filter(|n| annotations::flag(n, annotations::UPDATE_NEEDED))
        .collect()
}

/// Nodes created strictly before the force watermark.
pub fn force_candidates(nodes: &[Node], watermark: DateTime<Utc>) -> Vec<&Node> {
    nodes
        .iter()
        .filter(|n| n.creation_timestamp().is_some_and(|t| t.0 < watermark))
        .collect()
}

/// True when any node carries a live grant or an active drain.
pub fn in_flight(nodes: &[Node]) -> bool {
    nodes.iter().any(|n| {
        annotations::flag(n, annotations::UPDATE_IN_PROGRESS)
            || annotations::flag(n, annotations::CAN_START_TERMINATION)
    })
}

/// Picks the next node to replace: the first master in the list if any,
/// else the first element. `None` only for an empty candidate list.
///
/// Masters go first so control-plane drift surfaces earliest instead of
/// stranding the control plane at the end of a long rolling cycle.
pub fn next_to_update<'a>(candidates: &[&'a Node]) -> Option<&'a Node> {
    candidates
        .iter()
        .find(|n| n.labels().get(MASTER_ROLE_LABEL).map(String::as_str) == Some(MASTER_ROLE_VALUE))
        .copied()
        .or_else(|| candidates.first().copied())
}

/// Total decision function for one tick over fresh node snapshots.
pub fn decide(all: &[Node], ready: &[Node], state: &State) -> Decision {
    if all.len() > ready.len() {
        return Decision::AwaitReady {
            total: all.len(),
            ready: ready.len(),
        };
    }

    let drifted = drift_candidates(ready);
    let forced = force_candidates(ready, state.last_accepted_creation_time);
    if drifted.is_empty() && forced.is_empty() {
        return Decision::RecordCapacity(ready.len());
    }

    if in_flight(ready) {
        return Decision::AwaitInFlight;
    }

    if ready.len() < state.node_count {
        return Decision::AwaitCapacity {
            ready: ready.len(),
            floor: state.node_count,
        };
    }

    // Forced replacements outrank drift-announced ones.
    let (candidates, force) = if forced.is_empty() {
        (drifted, false)
    } else {
        (forced, true)
    };
    // candidates is non-empty here, so the fallback arm is unreachable
    match next_to_update(&candidates) {
        Some(node) => Decision::Grant {
            node: node.name_any(),
            force,
        },
        None => Decision::RecordCapacity(ready.len()),
    }
}
