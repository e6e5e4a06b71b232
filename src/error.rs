//! Error types shared by the operator and agent.

use thiserror::Error;

/// Errors surfaced by cluster access, node updates, and the state file.
///
/// Call sites in both loops treat every variant the same way: log it and
/// try again on the next tick. Nothing here is fatal once a loop is
/// running; startup is the only place these abort the process.
#[derive(Error, Debug)]
pub enum Error {
    #[error("cluster API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("kubeconfig error: {0}")]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    #[error("update of node {node} exhausted {attempts} conflict retries")]
    UpdateConflict { node: String, attempts: u32 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("state file did not parse: {0}")]
    StateParse(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
