//! Atoll node
//!
//! Glues the pieces together: a UDP broadcast channel, an in-memory
//! content store, the workspace controller actor, the periodic announcer,
//! and a peer-list refresh loop. The binary in `main.rs` is a headless
//! stand-in for the original browser demo's page: it joins a workspace,
//! logs every convergence event, and keeps announcing.

pub mod node;

pub use node::{AtollNode, NodeConfig};

use thiserror::Error;

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced while assembling or running a node.
#[derive(Debug, Error)]
pub enum Error {
    /// Workspace core failure.
    #[error(transparent)]
    Workspace(#[from] atoll_workspace::Error),

    /// Broadcast channel failure.
    #[error(transparent)]
    Channel(#[from] atoll_pubsub::ChannelError),
}
