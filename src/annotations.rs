//! Coordination vocabulary written on Node objects.
//!
//! The operator and the agents never talk to each other directly; every
//! cross-process decision travels through these annotations. Keys are
//! namespaced by writer, so a reader can always tell which loop owns a
//! value. Readers treat a missing key as a cleared flag.
//!
//! One node's lifecycle, as any participant can reconstruct it from the
//! vocabulary:
//!
//! ```text
//! (no keys) --agent bootstrap--> idle --drift detected--> drifted
//!     idle/drifted --operator forces--> draining
//!     drifted --operator grants, agent acknowledges--> draining
//!     draining --recreate succeeds--> gone (object deleted with the host)
//! ```

use k8s_openapi::api::core::v1::Node;
use kube::ResourceExt;

/// Canonical value of an asserted flag.
pub const TRUE: &str = "true";
/// Canonical value of a cleared flag.
pub const FALSE: &str = "false";

/// Agent-owned: the node's active instance template differs from the one
/// its group manager wants. Never cleared by the agent; the node object
/// disappears with the host instead.
pub const UPDATE_NEEDED: &str = "rollover-agent/update-needed";

/// Agent-owned: permission was acknowledged and the drain has begun.
pub const UPDATE_IN_PROGRESS: &str = "rollover-agent/update-in-progress";

/// Agent-owned: timestamp of the most recent drift probe.
pub const LAST_CHECKED_TIME: &str = "rollover-agent/last-checked-time";

/// Operator-owned: this specific node may begin draining now.
pub const CAN_START_TERMINATION: &str = "rollover-operator/can-start-termination";

/// Operator-owned: drain regardless of the drift flag.
pub const FORCE_TERMINATION: &str = "rollover-operator/force-termination";

/// Reads a flag annotation, treating a missing key as cleared.
pub fn flag(node: &Node, key: &str) -> bool {
    node.annotations().get(key).map(String::as_str) == Some(TRUE)
}

/// True when the node carries any value at all under `key`.
pub fn has(node: &Node, key: &str) -> bool {
    node.annotations().contains_key(key)
}

/// Canonical string form of a flag.
pub fn value(flag: bool) -> &'static str {
    if flag { TRUE } else { FALSE }
}
