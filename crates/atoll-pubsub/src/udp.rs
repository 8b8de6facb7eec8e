//! UDP flood channel.
//!
//! Provides a thin pubsub layer over a tokio `UdpSocket` with:
//! - Configurable send/receive buffer sizes
//! - Explicit peer dialing ([`UdpChannel::connect`])
//! - Per-topic membership gossip (Subscribe/Unsubscribe frames)
//!
//! Publishing floods the message to every connected peer that has
//! advertised a subscription for the topic. One message fits one datagram;
//! there is no fragmentation, ordering, or retransmission.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tracing::{debug, error, trace, warn};

use crate::error::{ChannelError, Result};
use crate::types::{Handler, InboundMessage, PeerId, PeerRef};
use crate::Channel;

/// Largest datagram the receive loop will accept.
const MAX_DATAGRAM: usize = 64 * 1024;

/// Consecutive `recv_from` failures tolerated before the receive loop
/// gives up on the socket.
const MAX_RECV_FAILURES: u32 = 8;

/// Channel configuration.
#[derive(Debug, Clone)]
pub struct UdpConfig {
    /// Address to bind to.
    pub bind: SocketAddr,
    /// Send buffer size in bytes.
    pub sndbuf: usize,
    /// Receive buffer size in bytes.
    pub rcvbuf: usize,
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:9400".parse().expect("static addr"),
            sndbuf: 1024 * 1024,
            rcvbuf: 1024 * 1024,
        }
    }
}

/// Wire frame. Sender identity travels in the envelope, out-of-band from
/// the payload: topic payloads themselves carry no schema.
#[derive(Debug, Serialize, Deserialize)]
enum Frame {
    /// Introduce ourselves to a newly dialed peer.
    Hello,
    /// Advertise a topic subscription.
    Subscribe { topic: String },
    /// Retract a topic subscription.
    Unsubscribe { topic: String },
    /// A broadcast message on a topic.
    Message { topic: String, payload: Vec<u8> },
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    sender: PeerId,
    frame: Frame,
}

/// What we know about one dialed or heard-from peer.
#[derive(Default)]
struct PeerView {
    id: Option<PeerId>,
    topics: HashSet<String>,
}

#[derive(Default)]
struct UdpState {
    subs: HashMap<String, Handler>,
    peers: HashMap<SocketAddr, PeerView>,
}

/// A UDP-backed [`Channel`] endpoint.
pub struct UdpChannel {
    id: PeerId,
    socket: Arc<UdpSocket>,
    state: Arc<Mutex<UdpState>>,
}

impl UdpChannel {
    /// Bind to the configured address and start the receive loop.
    pub async fn bind(cfg: UdpConfig) -> Result<Arc<Self>> {
        let domain = if cfg.bind.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };

        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_send_buffer_size(cfg.sndbuf)?;
        socket.set_recv_buffer_size(cfg.rcvbuf)?;
        socket.set_reuse_address(true)?;
        socket.bind(&cfg.bind.into())?;
        socket.set_nonblocking(true)?;

        let std_socket: std::net::UdpSocket = socket.into();
        let socket = Arc::new(UdpSocket::from_std(std_socket)?);

        let channel = Arc::new(Self {
            id: PeerId::generate(),
            socket: Arc::clone(&socket),
            state: Arc::new(Mutex::new(UdpState::default())),
        });

        tracing::info!(
            peer = %channel.id,
            addr = %socket.local_addr()?,
            "udp channel bound"
        );

        let recv = Arc::clone(&channel);
        tokio::spawn(async move { recv.recv_loop().await });

        Ok(channel)
    }

    /// Local socket address (useful when bound to port 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Dial a peer by address string.
    ///
    /// Sends a Hello plus our current subscriptions; the peer replies with
    /// its own subscriptions, so topic membership views converge.
    pub async fn connect(&self, addr: &str) -> Result<()> {
        let addr: SocketAddr = addr.parse().map_err(|e| ChannelError::PeerConnect {
            addr: addr.to_string(),
            reason: format!("invalid address: {e}"),
        })?;

        let topics: Vec<String> = {
            let mut state = self.state.lock().expect("state lock poisoned");
            state.peers.entry(addr).or_default();
            state.subs.keys().cloned().collect()
        };

        self.send_frame(addr, Frame::Hello)
            .await
            .map_err(|e| ChannelError::PeerConnect {
                addr: addr.to_string(),
                reason: e.to_string(),
            })?;
        for topic in topics {
            self.send_frame(addr, Frame::Subscribe { topic })
                .await
                .map_err(|e| ChannelError::PeerConnect {
                    addr: addr.to_string(),
                    reason: e.to_string(),
                })?;
        }

        debug!(peer = %self.id, %addr, "dialed peer");
        Ok(())
    }

    async fn send_frame(&self, addr: SocketAddr, frame: Frame) -> Result<()> {
        let envelope = Envelope {
            sender: self.id.clone(),
            frame,
        };
        let bytes = bincode::serialize(&envelope).map_err(|e| ChannelError::Publish {
            topic: String::new(),
            reason: format!("encode: {e}"),
        })?;
        self.socket.send_to(&bytes, addr).await?;
        Ok(())
    }

    /// Broadcast a frame to every known peer; per-peer failures are
    /// independent and only logged.
    async fn flood_frame(&self, make: impl Fn() -> Frame) {
        let addrs: Vec<SocketAddr> = {
            let state = self.state.lock().expect("state lock poisoned");
            state.peers.keys().copied().collect()
        };
        for addr in addrs {
            if let Err(e) = self.send_frame(addr, make()).await {
                warn!(%addr, error = %e, "frame send failed");
            }
        }
    }

    async fn recv_loop(&self) {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        let mut failures = 0u32;
        loop {
            let (len, from) = match self.socket.recv_from(&mut buf).await {
                Ok(pair) => {
                    failures = 0;
                    pair
                }
                Err(e) => {
                    // A dead socket fails every call; do not spin on it.
                    failures += 1;
                    if failures >= MAX_RECV_FAILURES {
                        error!(error = %e, "udp recv failing persistently, receive loop stopped");
                        return;
                    }
                    warn!(error = %e, "udp recv failed");
                    continue;
                }
            };
            let envelope: Envelope = match bincode::deserialize(&buf[..len]) {
                Ok(env) => env,
                Err(e) => {
                    warn!(%from, error = %e, "dropping undecodable datagram");
                    continue;
                }
            };
            self.handle_envelope(from, envelope).await;
        }
    }

    async fn handle_envelope(&self, from: SocketAddr, envelope: Envelope) {
        let Envelope { sender, frame } = envelope;

        // Learn or refresh the peer entry for any traffic we hear.
        let reply_subs: Option<Vec<String>> = {
            let mut state = self.state.lock().expect("state lock poisoned");
            let view = state.peers.entry(from).or_default();
            view.id = Some(sender.clone());

            match frame {
                Frame::Hello => Some(state.subs.keys().cloned().collect()),
                Frame::Subscribe { topic } => {
                    trace!(peer = %sender, topic, "peer subscribed");
                    state
                        .peers
                        .get_mut(&from)
                        .expect("just inserted")
                        .topics
                        .insert(topic);
                    None
                }
                Frame::Unsubscribe { topic } => {
                    trace!(peer = %sender, topic, "peer unsubscribed");
                    state
                        .peers
                        .get_mut(&from)
                        .expect("just inserted")
                        .topics
                        .remove(&topic);
                    None
                }
                Frame::Message { topic, payload } => {
                    if let Some(handler) = state.subs.get(&topic) {
                        let handler = Arc::clone(handler);
                        let msg = InboundMessage { sender, payload };
                        tokio::spawn(async move { handler(msg) });
                    }
                    None
                }
            }
        };

        // Answer a Hello with our subscriptions (outside the lock).
        if let Some(topics) = reply_subs {
            for topic in topics {
                if let Err(e) = self.send_frame(from, Frame::Subscribe { topic }).await {
                    warn!(%from, error = %e, "hello reply failed");
                }
            }
        }
    }
}

#[async_trait]
impl Channel for UdpChannel {
    fn local_id(&self) -> PeerId {
        self.id.clone()
    }

    async fn subscribe(&self, topic: &str, handler: Handler) -> Result<()> {
        {
            let mut state = self.state.lock().expect("state lock poisoned");
            state.subs.insert(topic.to_string(), handler);
        }
        let topic = topic.to_string();
        self.flood_frame(|| Frame::Subscribe {
            topic: topic.clone(),
        })
        .await;
        debug!(peer = %self.id, topic, "subscribed");
        Ok(())
    }

    async fn unsubscribe(&self, topic: &str) -> Result<()> {
        {
            let mut state = self.state.lock().expect("state lock poisoned");
            if state.subs.remove(topic).is_none() {
                return Err(ChannelError::NotSubscribed(topic.to_string()));
            }
        }
        let topic = topic.to_string();
        self.flood_frame(|| Frame::Unsubscribe {
            topic: topic.clone(),
        })
        .await;
        debug!(peer = %self.id, topic, "unsubscribed");
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        // Remote delivery: every peer that advertised the topic.
        let targets: Vec<SocketAddr> = {
            let state = self.state.lock().expect("state lock poisoned");
            state
                .peers
                .iter()
                .filter(|(_, view)| view.topics.contains(topic))
                .map(|(addr, _)| *addr)
                .collect()
        };

        let mut first_err = None;
        for addr in &targets {
            let result = self
                .send_frame(
                    *addr,
                    Frame::Message {
                        topic: topic.to_string(),
                        payload: payload.clone(),
                    },
                )
                .await;
            if let Err(e) = result {
                warn!(addr = %addr, error = %e, "publish send failed");
                first_err.get_or_insert_with(|| ChannelError::Publish {
                    topic: topic.to_string(),
                    reason: e.to_string(),
                });
            }
        }

        // Loopback delivery, matching MemoryBus: a subscribed publisher
        // hears its own message and suppresses it by sender id.
        let local = {
            let state = self.state.lock().expect("state lock poisoned");
            state.subs.get(topic).cloned()
        };
        if let Some(handler) = local {
            let msg = InboundMessage {
                sender: self.id.clone(),
                payload,
            };
            tokio::spawn(async move { handler(msg) });
        }

        trace!(peer = %self.id, topic, remotes = targets.len(), "published");
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn peers(&self, topic: &str) -> Vec<PeerRef> {
        let state = self.state.lock().expect("state lock poisoned");
        state
            .peers
            .iter()
            .filter(|(_, view)| view.topics.contains(topic))
            .map(|(addr, view)| match &view.id {
                Some(id) => PeerRef(format!("{addr}/p2p/{id}")),
                None => PeerRef(addr.to_string()),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc;

    async fn pair() -> (Arc<UdpChannel>, Arc<UdpChannel>) {
        let cfg = || UdpConfig {
            bind: "127.0.0.1:0".parse().unwrap(),
            ..Default::default()
        };
        let a = UdpChannel::bind(cfg()).await.unwrap();
        let b = UdpChannel::bind(cfg()).await.unwrap();
        a.connect(&b.local_addr().unwrap().to_string())
            .await
            .unwrap();
        // Give the Hello exchange a moment to settle.
        tokio::time::sleep(Duration::from_millis(50)).await;
        (a, b)
    }

    fn collecting_handler() -> (Handler, mpsc::UnboundedReceiver<InboundMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handler: Handler = Arc::new(move |msg| {
            let _ = tx.send(msg);
        });
        (handler, rx)
    }

    #[tokio::test]
    async fn publish_crosses_the_wire() {
        let (a, b) = pair().await;

        let (handler, mut rx) = collecting_handler();
        b.subscribe("demo", handler).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        a.publish("demo", b"bafy123".to_vec()).await.unwrap();

        let msg = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("delivery timed out")
            .unwrap();
        assert_eq!(msg.sender, a.local_id());
        assert_eq!(msg.payload, b"bafy123");
    }

    #[tokio::test]
    async fn membership_converges_after_dial() {
        let (a, b) = pair().await;

        let noop: Handler = Arc::new(|_| {});
        b.subscribe("demo", noop).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let peers = a.peers("demo").await;
        assert_eq!(peers.len(), 1);
        assert!(peers[0].0.contains(b.local_id().as_str()));

        b.unsubscribe("demo").await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(a.peers("demo").await.is_empty());
    }

    #[tokio::test]
    async fn bad_peer_address_is_rejected() {
        let a = UdpChannel::bind(UdpConfig {
            bind: "127.0.0.1:0".parse().unwrap(),
            ..Default::default()
        })
        .await
        .unwrap();

        assert!(matches!(
            a.connect("not-an-address").await,
            Err(ChannelError::PeerConnect { .. })
        ));
    }

    #[tokio::test]
    async fn hello_replays_existing_subscriptions() {
        // b subscribes before a dials; a must still learn b's membership.
        let cfg = || UdpConfig {
            bind: "127.0.0.1:0".parse().unwrap(),
            ..Default::default()
        };
        let a = UdpChannel::bind(cfg()).await.unwrap();
        let b = UdpChannel::bind(cfg()).await.unwrap();

        let noop: Handler = Arc::new(|_| {});
        b.subscribe("demo", noop).await.unwrap();

        a.connect(&b.local_addr().unwrap().to_string())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(a.peers("demo").await.len(), 1);
    }
}
