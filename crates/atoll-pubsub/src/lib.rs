//! Atoll broadcast channels
//!
//! A named publish/subscribe topic abstraction. Any subscriber of a topic
//! receives every message any publisher sends on it; no ordering and no
//! delivery-count guarantee is made. Callers that need idempotence must
//! build it on top (the workspace controller does).
//!
//! Two implementations are provided:
//!
//! - [`MemoryBus`]: an in-process hub for tests and single-process demos.
//! - [`UdpChannel`]: a UDP flood channel with explicit peer dialing and
//!   per-topic membership gossip.
//!
//! Handlers are invoked from delivery tasks that run concurrently with the
//! callers of [`Channel::publish`].

mod error;
mod memory;
mod types;
mod udp;

pub use error::{ChannelError, Result};
pub use memory::{MemoryBus, MemoryEndpoint};
pub use types::{Handler, InboundMessage, PeerId, PeerRef};
pub use udp::{UdpChannel, UdpConfig};

use async_trait::async_trait;

/// A named publish/subscribe topic surface.
///
/// One topic may carry messages from many publishers; every handler
/// subscribed to that topic sees every message, including the local
/// endpoint's own (echo suppression by sender identity is the consumer's
/// responsibility). Reordering and duplicate delivery must be tolerated.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Identity of this endpoint, attached to every message it publishes.
    fn local_id(&self) -> PeerId;

    /// Register `handler` for `topic`. Replaces any previous handler for
    /// the same topic on this endpoint.
    async fn subscribe(&self, topic: &str, handler: Handler) -> Result<()>;

    /// Drop the subscription for `topic`. Fails with
    /// [`ChannelError::NotSubscribed`] if there is none.
    async fn unsubscribe(&self, topic: &str) -> Result<()>;

    /// Broadcast `payload` on `topic`.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()>;

    /// Peers currently known to subscribe to `topic`, excluding self.
    async fn peers(&self, topic: &str) -> Vec<PeerRef>;
}
