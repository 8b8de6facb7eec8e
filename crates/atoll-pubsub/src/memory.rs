//! In-process broadcast bus.
//!
//! Connects any number of endpoints inside one process. Used by tests and
//! single-process demos; behaviorally equivalent to [`crate::UdpChannel`]
//! including loopback delivery and handler invocation from spawned tasks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::trace;

use crate::error::{ChannelError, Result};
use crate::types::{Handler, InboundMessage, PeerId, PeerRef};
use crate::Channel;

#[derive(Default)]
struct BusState {
    /// Per-endpoint topic subscriptions.
    endpoints: HashMap<PeerId, HashMap<String, Handler>>,
}

/// An in-process hub connecting [`MemoryEndpoint`]s.
#[derive(Clone, Default)]
pub struct MemoryBus {
    state: Arc<Mutex<BusState>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a new endpoint attached to this bus.
    pub fn endpoint(&self) -> MemoryEndpoint {
        let id = PeerId::generate();
        self.state
            .lock()
            .expect("bus lock poisoned")
            .endpoints
            .insert(id.clone(), HashMap::new());
        MemoryEndpoint {
            id,
            state: Arc::clone(&self.state),
        }
    }
}

/// One endpoint on a [`MemoryBus`].
#[derive(Clone)]
pub struct MemoryEndpoint {
    id: PeerId,
    state: Arc<Mutex<BusState>>,
}

#[async_trait]
impl Channel for MemoryEndpoint {
    fn local_id(&self) -> PeerId {
        self.id.clone()
    }

    async fn subscribe(&self, topic: &str, handler: Handler) -> Result<()> {
        let mut state = self.state.lock().expect("bus lock poisoned");
        let subs = state
            .endpoints
            .get_mut(&self.id)
            .ok_or_else(|| ChannelError::Subscribe {
                topic: topic.to_string(),
                reason: "endpoint detached from bus".to_string(),
            })?;
        subs.insert(topic.to_string(), handler);
        trace!(peer = %self.id, topic, "memory subscribe");
        Ok(())
    }

    async fn unsubscribe(&self, topic: &str) -> Result<()> {
        let mut state = self.state.lock().expect("bus lock poisoned");
        let subs = state
            .endpoints
            .get_mut(&self.id)
            .ok_or_else(|| ChannelError::Unsubscribe {
                topic: topic.to_string(),
                reason: "endpoint detached from bus".to_string(),
            })?;
        if subs.remove(topic).is_none() {
            return Err(ChannelError::NotSubscribed(topic.to_string()));
        }
        trace!(peer = %self.id, topic, "memory unsubscribe");
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        // Collect handlers under the lock, deliver outside it. Loopback is
        // intentional: a publisher subscribed to the topic receives its own
        // message, tagged with its own sender id.
        let handlers: Vec<Handler> = {
            let state = self.state.lock().expect("bus lock poisoned");
            state
                .endpoints
                .values()
                .filter_map(|subs| subs.get(topic))
                .cloned()
                .collect()
        };

        trace!(peer = %self.id, topic, receivers = handlers.len(), "memory publish");

        for handler in handlers {
            let msg = InboundMessage {
                sender: self.id.clone(),
                payload: payload.clone(),
            };
            // Delivery task, concurrent with the publisher.
            tokio::spawn(async move { handler(msg) });
        }
        Ok(())
    }

    async fn peers(&self, topic: &str) -> Vec<PeerRef> {
        let state = self.state.lock().expect("bus lock poisoned");
        state
            .endpoints
            .iter()
            .filter(|(id, subs)| **id != self.id && subs.contains_key(topic))
            .map(|(id, _)| PeerRef(format!("/memory/{id}")))
            .collect()
    }
}
