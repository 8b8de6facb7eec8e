//! Error types for the workspace core.

use thiserror::Error;

use crate::address::ContentAddress;
use atoll_pubsub::ChannelError;

/// Result type for workspace operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in workspace operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The broadcast channel rejected a subscribe/unsubscribe/publish.
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Content retrieval failed for a known address. The address remains
    /// recorded; recovery comes from a later re-announcement, not a retry.
    #[error("fetch of '{address}' failed: {reason}")]
    Fetch {
        address: ContentAddress,
        reason: String,
    },

    /// Empty or otherwise unusable user input. No state was changed.
    #[error("invalid input: {0}")]
    Validation(String),

    /// Dialing a peer failed. Not retried.
    #[error("peer connect failed: {0}")]
    PeerConnect(String),

    /// No workspace is currently bound.
    #[error("no active workspace")]
    NotBound,

    /// The controller task has shut down.
    #[error("workspace controller is closed")]
    Closed,
}
