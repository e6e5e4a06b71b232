//! Per-node replacement agent.

use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use node_rollover::agent::Agent;
use node_rollover::cloud::{GceNodeProvider, MetadataClient};
use node_rollover::cluster;

#[derive(Parser, Debug)]
#[command(
    name = "rollover-agent",
    version,
    about = "Drains and recreates its own node when permitted"
)]
struct Args {
    /// Cloud project the node belongs to.
    #[arg(long)]
    project: String,

    /// Region of the instance group manager that owns the node.
    #[arg(long)]
    region: String,

    /// Path of the kubeconfig file to use. Defaults to the in-cluster
    /// config.
    #[arg(long = "conf_file")]
    conf_file: Option<PathBuf>,
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

    // The instance knows who it is; ask the metadata service rather than
    // the user.
    let metadata = MetadataClient::new();
    let instance = metadata.instance_name().await?;
    let hostname = metadata.hostname().await?;
    let zone = metadata.zone().await?;
    info!(%instance, %hostname, %zone, "resolved instance identity");

    let provider = GceNodeProvider::new(metadata, &args.project, &args.region, &zone, &instance);

    let client = cluster::client_for(args.conf_file.as_deref()).await?;
    info!("connected to cluster");

    // The hostname names the Node object; the instance name addresses the
    // compute API.
    Agent::new(client, hostname, provider).run().await;
    Ok(())
}
