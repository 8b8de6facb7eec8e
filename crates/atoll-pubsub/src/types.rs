//! Core types shared by all channel implementations.

use std::sync::Arc;

use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Identity of a channel endpoint.
///
/// Every published message carries the publisher's `PeerId` out-of-band so
/// receivers can suppress echoes of their own announcements.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerId(String);

impl PeerId {
    /// Generate a fresh random identity (8 bytes, hex-encoded).
    pub fn generate() -> Self {
        let mut bytes = [0u8; 8];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Opaque network-level peer address, used only for membership display.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerRef(pub String);

impl std::fmt::Display for PeerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A message delivered by a topic subscription.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Identity of the publishing endpoint.
    pub sender: PeerId,
    /// Raw message payload. Channels do not interpret it.
    pub payload: Vec<u8>,
}

/// Handler invoked once per inbound message on a subscribed topic.
///
/// Runs on a delivery task; must not block for long and must be safe to
/// invoke concurrently with other deliveries.
pub type Handler = Arc<dyn Fn(InboundMessage) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_distinct() {
        let a = PeerId::generate();
        let b = PeerId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 16);
    }

    #[test]
    fn peer_id_roundtrips_through_display() {
        let id = PeerId::generate();
        assert_eq!(PeerId::from(id.to_string().as_str()), id);
    }
}
