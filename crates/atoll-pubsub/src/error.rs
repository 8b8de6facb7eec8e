//! Error types for atoll-pubsub.

use thiserror::Error;

/// Result type for channel operations.
pub type Result<T> = std::result::Result<T, ChannelError>;

/// Errors that can occur at the broadcast channel boundary.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Subscribing to a topic failed.
    #[error("subscribe to '{topic}' failed: {reason}")]
    Subscribe { topic: String, reason: String },

    /// Unsubscribing from a topic failed.
    #[error("unsubscribe from '{topic}' failed: {reason}")]
    Unsubscribe { topic: String, reason: String },

    /// Publishing on a topic failed.
    #[error("publish on '{topic}' failed: {reason}")]
    Publish { topic: String, reason: String },

    /// The endpoint holds no subscription for the topic.
    #[error("not subscribed to '{0}'")]
    NotSubscribed(String),

    /// Dialing a peer failed.
    #[error("failed to connect to peer '{addr}': {reason}")]
    PeerConnect { addr: String, reason: String },

    /// Underlying socket error.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
}
