//! Cluster API access: read-only snapshots and optimistic node updates.

pub mod node_update;
pub mod view;

pub use view::ClusterView;

use std::path::Path;

use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};

use crate::error::Result;

/// Builds a client from an explicit kubeconfig, or from the in-cluster
/// environment when no path is given.
pub async fn client_for(conf_file: Option<&Path>) -> Result<Client> {
    match conf_file {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path)?;
            let config =
                Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default()).await?;
            Ok(Client::try_from(config)?)
        }
        None => Ok(Client::try_default().await?),
    }
}
