//! Coordinated rolling replacement of cluster nodes whose cloud instance
//! template has drifted from the one their group manager currently wants.
//!
//! Two loops cooperate without ever calling each other directly: the
//! [`operator`] admits at most one replacement cluster-wide, and the
//! [`agent`] drains and recreates the single node it runs on. All
//! coordination travels through the node annotations defined in
//! [`annotations`], plus a small state file owned by the operator.

pub mod agent;
pub mod annotations;
pub mod cloud;
pub mod cluster;
pub mod error;
pub mod operator;

pub use error::{Error, Result};
