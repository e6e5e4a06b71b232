//! Cloud-provider access for the agent.
//!
//! The agent needs exactly two capabilities from the cloud side: "does my
//! host need replacement?" and "recreate my host". Everything else here
//! (metadata lookups, compute API plumbing) exists to answer those two.

pub mod gce;
pub mod metadata;

pub use gce::{resource_name, GceNodeProvider};
pub use metadata::MetadataClient;

use async_trait::async_trait;
use thiserror::Error;

/// Errors from the metadata service or the compute API.
#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{context} returned status {status}")]
    Status {
        context: String,
        status: reqwest::StatusCode,
    },

    #[error("instance metadata has no {0} item")]
    MissingMetadata(&'static str),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Capability the agent consumes to decide on and execute replacement.
#[async_trait]
pub trait NodeProvider {
    /// True when the host's active instance template is no longer the one
    /// its owning group manager wants. Side-effect-free; safe to call
    /// every tick.
    async fn needs_replacement(&self) -> Result<bool>;

    /// Asks the group manager to recreate the host. The only destructive
    /// cloud call in the system.
    async fn recreate(&self) -> Result<()>;
}
