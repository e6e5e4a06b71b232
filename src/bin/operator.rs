//! Cluster-wide admission operator.

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

use node_rollover::cluster;
use node_rollover::operator::{force, Operator, StateStore};

#[derive(Parser, Debug)]
#[command(
    name = "rollover-operator",
    version,
    about = "Admits at most one node replacement at a time"
)]
struct Args {
    /// Path of the kubeconfig file to use. Defaults to the in-cluster
    /// config.
    #[arg(long = "conf_file")]
    conf_file: Option<PathBuf>,

    /// Path of the file where the operator keeps its state. Must live on
    /// durable storage.
    #[arg(long = "state_path")]
    state_path: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("node_rollover=info".parse()?)
                .add_directive("kube=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let client = cluster::client_for(args.conf_file.as_deref()).await?;
    info!("connected to cluster");

    let store = StateStore::new(&args.state_path);
    let operator = Operator::new(client, store.clone()).await?;

    // Force update triggers arrive over HTTP and only touch the shared
    // state; the admission loop picks the new watermark up on its next
    // tick.
    let state = operator.state_handle();
    tokio::spawn(async move {
        if let Err(e) = force::run_force_update_server(state, store).await {
            error!(error = %e, "force update endpoint failed");
            std::process::exit(1);
        }
    });

    operator.run().await;
    Ok(())
}
