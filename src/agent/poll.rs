//! Per-tick classification of the agent's next move.

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Node;

use crate::annotations;

/// Process-local shadow of the agent's published status.
///
/// Lost on restart, which is harmless: every publication writes the full
/// triple and the writes are idempotent. Its real job is detecting the
/// rising edge of drift so the annotation is not rewritten every tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentStatus {
    pub update_needed: bool,
    pub update_in_progress: bool,
    pub last_checked: DateTime<Utc>,
}

impl AgentStatus {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            update_needed: false,
            update_in_progress: false,
            last_checked: now,
        }
    }
}

/// What the poll loop should do with the node it just read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStep {
    /// The node has never been stamped; publish the initial status triple
    /// so downstream observers can rely on the annotation existing.
    Initialize,
    /// Drift was just detected; announce it and give the operator a round
    /// to observe before asking to drain.
    AnnounceDrift,
    /// The operator ordered termination regardless of drift.
    BeginForced,
    /// Drift is believed and permission has arrived.
    BeginGranted,
    /// Nothing to do until the next tick.
    Wait,
}

/// Decides the next step from the node object, the fresh probe result, and
/// the local shadow.
pub fn classify(node: &Node, needs_replacement: bool, status: &AgentStatus) -> PollStep {
    if !annotations::has(node, annotations::UPDATE_NEEDED) {
        return PollStep::Initialize;
    }
    if needs_replacement && !status.update_needed {
        return PollStep::AnnounceDrift;
    }
    if annotations::flag(node, annotations::FORCE_TERMINATION) {
        return PollStep::BeginForced;
    }
    if needs_replacement
        && status.update_needed
        && annotations::flag(node, annotations::CAN_START_TERMINATION)
    {
        return PollStep::BeginGranted;
    }
    PollStep::Wait
}
