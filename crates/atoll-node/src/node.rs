//! Node assembly and lifecycle.
//!
//! Architecture:
//! - Single process owning one UDP channel endpoint and one content store
//! - One workspace controller actor; all state changes flow through it
//! - Background tasks: periodic announcer, peer-list refresh
//! - Convergence events stream to the log (the UI surface is external)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::{Error, Result};
use atoll_pubsub::{Channel, UdpChannel, UdpConfig};
use atoll_workspace::{
    ContentAddress, ContentStore, MemoryStore, PeriodicAnnouncer, WorkspaceController,
    WorkspaceEvent, WorkspaceHandle,
};

/// Configuration for an Atoll node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Workspace to join at startup.
    pub workspace: String,

    /// UDP bind address for the broadcast channel.
    pub bind: SocketAddr,

    /// Peers to dial at startup.
    pub peers: Vec<String>,

    /// Interval between file-list re-announcements.
    pub announce_every: Duration,

    /// Interval between peer-list refreshes.
    pub peer_refresh_every: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl NodeConfig {
    /// Create config from environment variables with sensible defaults.
    pub fn from_env() -> Self {
        let workspace = std::env::var("ATOLL_WORKSPACE")
            .unwrap_or_else(|_| "default-workspace".to_string());

        let bind = std::env::var("ATOLL_BIND")
            .unwrap_or_else(|_| "0.0.0.0:9400".to_string())
            .parse()
            .expect("Invalid ATOLL_BIND");

        let peers = std::env::var("ATOLL_PEERS")
            .map(|s| {
                s.split(',')
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let announce_every = std::env::var("ATOLL_ANNOUNCE_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(atoll_workspace::PeriodicAnnouncer::DEFAULT_INTERVAL);

        let peer_refresh_every = std::env::var("ATOLL_PEER_REFRESH_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(1));

        Self {
            workspace,
            bind,
            peers,
            announce_every,
            peer_refresh_every,
        }
    }
}

/// An assembled Atoll node.
pub struct AtollNode {
    config: NodeConfig,
    channel: Arc<UdpChannel>,
    store: Arc<MemoryStore>,
    handle: WorkspaceHandle,
}

impl AtollNode {
    /// Bind the channel and spawn the controller. No workspace is joined
    /// yet; [`start`](Self::start) does that.
    pub async fn new(config: NodeConfig) -> Result<Self> {
        let channel = UdpChannel::bind(UdpConfig {
            bind: config.bind,
            ..Default::default()
        })
        .await?;
        let store = Arc::new(MemoryStore::new());

        let handle = WorkspaceController::spawn(
            Arc::clone(&channel) as Arc<dyn Channel>,
            Arc::clone(&store) as Arc<dyn ContentStore>,
        );

        Ok(Self {
            config,
            channel,
            store,
            handle,
        })
    }

    /// Handle to the workspace controller.
    pub fn handle(&self) -> WorkspaceHandle {
        self.handle.clone()
    }

    /// Address the channel actually bound to (useful with port 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.channel.local_addr()?)
    }

    /// Dial a peer: the broadcast channel connects and the store records
    /// the address for display.
    pub async fn connect_peer(&self, addr: &str) -> Result<()> {
        if addr.is_empty() {
            return Err(Error::Workspace(atoll_workspace::Error::Validation(
                "no peer address given".to_string(),
            )));
        }
        self.channel.connect(addr).await?;
        self.store.connect_peer(addr).await?;
        info!(addr, "connected to peer");
        Ok(())
    }

    /// Add a local file: store the bytes, then record and broadcast the
    /// resulting address.
    pub async fn add_file(&self, name: &str, bytes: Vec<u8>) -> Result<ContentAddress> {
        let address = self.store.add_content(bytes, name).await?;
        self.handle.add_local(address.clone()).await?;
        info!(%address, name, "file added to workspace");
        Ok(address)
    }

    /// Dial configured peers, join the configured workspace, and spawn
    /// the announcer and peer-refresh loops.
    pub async fn start(&self) -> Result<()> {
        info!(
            workspace = self.config.workspace,
            bind = %self.local_addr()?,
            peer_id = %self.channel.local_id(),
            "atoll node starting"
        );

        for peer in &self.config.peers {
            if let Err(e) = self.connect_peer(peer).await {
                // A bad bootstrap peer is reported, not fatal.
                warn!(peer, error = %e, "failed to connect to peer");
            }
        }

        self.handle.set_workspace(&self.config.workspace).await?;

        PeriodicAnnouncer::spawn(self.handle.clone(), self.config.announce_every);

        let handle = self.handle.clone();
        let store = Arc::clone(&self.store);
        let every = self.config.peer_refresh_every;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                match handle.workspace_peers().await {
                    Ok(peers) => {
                        debug!(count = peers.len(), "workspace peers");
                    }
                    Err(_) => break, // controller gone
                }
                let network = store.connected_peers().await;
                debug!(count = network.len(), "network peers");
            }
        });

        Ok(())
    }

    /// Start the node and pump convergence events to the log until the
    /// controller shuts down.
    pub async fn run(self) -> Result<()> {
        let mut events = self.handle.subscribe_events();
        self.start().await?;

        loop {
            match events.recv().await {
                Ok(WorkspaceEvent::Subscribed { workspace }) => {
                    info!(workspace, "subscribed to workspace");
                }
                Ok(WorkspaceEvent::AddressAdded { address, origin }) => {
                    info!(%address, ?origin, "address added");
                }
                Ok(WorkspaceEvent::ContentFetched { address, content }) => {
                    info!(%address, name = content.name, size = content.size, "content fetched");
                }
                Ok(WorkspaceEvent::OperationFailed { context, error }) => {
                    warn!(context, error, "operation failed");
                }
                Err(RecvError::Lagged(n)) => {
                    warn!(missed = n, "event stream lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
        Ok(())
    }
}
