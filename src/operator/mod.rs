//! Cluster-wide admission loop.
//!
//! The operator observes every node, refuses to act while the cluster is
//! unsettled, and otherwise grants at most one replacement at a time by
//! annotating the chosen node. It never talks to an agent directly.

pub mod admission;
pub mod force;
pub mod state;

pub use admission::Decision;
pub use state::{State, StateStore};

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::core::v1::Node;
use kube::{Api, Client};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::annotations;
use crate::cluster::{node_update, ClusterView};
use crate::error::Result;

/// Time between admission passes.
const TICK_INTERVAL: Duration = Duration::from_secs(30);

/// The loop granting at most one node replacement at a time.
pub struct Operator {
    view: ClusterView,
    nodes: Api<Node>,
    store: StateStore,
    state: Arc<RwLock<State>>,
}

impl Operator {
    /// Loads (or initializes) persisted state and builds the loop. A state
    /// file that exists but does not parse aborts startup.
    pub async fn new(client: Client, store: StateStore) -> Result<Self> {
        let state = store.load().await?;
        info!(
            node_count = state.node_count,
            watermark = %state.last_accepted_creation_time,
            "loaded operator state"
        );
        Ok(Self {
            view: ClusterView::new(client.clone()),
            nodes: Api::all(client),
            store,
            state: Arc::new(RwLock::new(state)),
        })
    }

    /// Shared handle for the force update endpoint.
    pub fn state_handle(&self) -> Arc<RwLock<State>> {
        self.state.clone()
    }

    /// Runs admission passes forever. Routine API failures are logged and
    /// absorbed by the next tick.
    pub async fn run(&self) {
        let mut ticks = tokio::time::interval(TICK_INTERVAL);
        loop {
            ticks.tick().await;
            if let Err(e) = self.tick().await {
                warn!(error = %e, "admission pass failed, retrying next tick");
            }
        }
    }

    /// One admission pass over fresh cluster snapshots.
    async fn tick(&self) -> Result<()> {
        let all = self.view.list_nodes().await?;
        let ready = self.view.list_ready_nodes().await?;

        let state = *self.state.read().await;
        match admission::decide(&all, &ready, &state) {
            Decision::AwaitReady { total, ready } => {
                info!(total, ready, "not-Ready nodes found, waiting");
            }
            Decision::RecordCapacity(count) => self.record_capacity(count).await?,
            Decision::AwaitInFlight => info!("replacement already in flight, waiting"),
            Decision::AwaitCapacity { ready, floor } => {
                info!(ready, floor, "below capacity floor, withholding permission");
            }
            Decision::Grant { node, force } => self.grant(&node, force).await?,
        }
        Ok(())
    }

    /// Records the current Ready population as the capacity floor.
    async fn record_capacity(&self, count: usize) -> Result<()> {
        let snapshot = {
            let mut state = self.state.write().await;
            state.node_count = count;
            *state
        };
        self.store.save(&snapshot).await?;
        info!(node_count = count, "no replacement wanted, capacity floor refreshed");
        Ok(())
    }

    /// Writes the permission annotation, plus the force marker when the
    /// grant bypasses the drift check, in a single update.
    async fn grant(&self, node: &str, force: bool) -> Result<()> {
        let mut values = BTreeMap::from([(
            annotations::CAN_START_TERMINATION.to_string(),
            annotations::TRUE.to_string(),
        )]);
        if force {
            values.insert(
                annotations::FORCE_TERMINATION.to_string(),
                annotations::TRUE.to_string(),
            );
        }
        node_update::set_node_annotations(&self.nodes, node, &values).await?;
        info!(node, force, "granted termination permission");
        Ok(())
    }
}
