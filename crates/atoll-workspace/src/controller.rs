//! Workspace controller actor.
//!
//! A single task owns the active workspace binding and the [`AddressSet`];
//! every entry point (local add, inbound broadcast, workspace change,
//! announce tick) is a typed command processed one at a time, which makes
//! the check-then-insert critical section trivial. Inbound deliveries and
//! content fetches carry the workspace generation they were started
//! under; anything arriving after a workspace switch is recognized as
//! stale and discarded, so nothing from the old workspace ever lands in
//! the new set.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::address::{AddressSet, ContentAddress};
use crate::error::{Error, Result};
use crate::store::{ContentStore, FetchedContent};
use atoll_pubsub::{Channel, Handler, InboundMessage, PeerId, PeerRef};

/// Capacity of the event broadcast ring. Slow consumers lag, they do not
/// block the actor.
const EVENT_CAPACITY: usize = 256;

/// Outcome of a local add.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// The address was new; it was inserted and published.
    Added,
    /// The address was already in the workspace; nothing was done.
    AlreadyPresent,
}

/// Where an address addition came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressOrigin {
    /// Added by this peer.
    Local,
    /// Announced by a remote peer.
    Remote(PeerId),
}

/// Notifications emitted by the controller for the presentation layer.
#[derive(Debug, Clone)]
pub enum WorkspaceEvent {
    /// A workspace topic was bound.
    Subscribed { workspace: String },
    /// An address entered the set.
    AddressAdded {
        address: ContentAddress,
        origin: AddressOrigin,
    },
    /// Content behind a remotely announced address was retrieved.
    ContentFetched {
        address: ContentAddress,
        content: FetchedContent,
    },
    /// A periodic or event-driven operation failed. The controller keeps
    /// running; this is the single human-readable surface for the failure.
    OperationFailed { context: String, error: String },
}

enum Command {
    SetWorkspace {
        name: String,
        reply: oneshot::Sender<Result<()>>,
    },
    AddLocal {
        address: ContentAddress,
        reply: oneshot::Sender<Result<AddOutcome>>,
    },
    Remote {
        generation: u64,
        msg: InboundMessage,
    },
    AnnounceTick,
    FetchDone {
        generation: u64,
        address: ContentAddress,
        result: std::result::Result<Vec<FetchedContent>, String>,
    },
    Query {
        reply: oneshot::Sender<Vec<ContentAddress>>,
    },
    ListPeers {
        reply: oneshot::Sender<Vec<PeerRef>>,
    },
    Shutdown,
}

/// The actor. Constructed once per node via [`WorkspaceController::spawn`];
/// all interaction goes through the returned [`WorkspaceHandle`].
pub struct WorkspaceController {
    channel: Arc<dyn Channel>,
    store: Arc<dyn ContentStore>,
    set: AddressSet,
    workspace: Option<String>,
    /// Bumped on every workspace change; in-flight work carries the value
    /// it was spawned under.
    generation: u64,
    cmd_tx: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<WorkspaceEvent>,
}

impl WorkspaceController {
    /// Spawn the controller task and return its handle.
    pub fn spawn(channel: Arc<dyn Channel>, store: Arc<dyn ContentStore>) -> WorkspaceHandle {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let controller = Self {
            channel,
            store,
            set: AddressSet::new(),
            workspace: None,
            generation: 0,
            cmd_tx: cmd_tx.clone(),
            events: events.clone(),
        };
        tokio::spawn(controller.run(cmd_rx));

        WorkspaceHandle { cmd_tx, events }
    }

    async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<Command>) {
        while let Some(cmd) = cmd_rx.recv().await {
            match cmd {
                Command::SetWorkspace { name, reply } => {
                    let _ = reply.send(self.set_workspace(name).await);
                }
                Command::AddLocal { address, reply } => {
                    let _ = reply.send(self.add_local(address).await);
                }
                Command::Remote { generation, msg } => self.on_remote(generation, msg),
                Command::AnnounceTick => self.announce(),
                Command::FetchDone {
                    generation,
                    address,
                    result,
                } => self.on_fetch_done(generation, address, result),
                Command::Query { reply } => {
                    let _ = reply.send(self.set.snapshot());
                }
                Command::ListPeers { reply } => {
                    let peers = match &self.workspace {
                        Some(ws) => self.channel.peers(ws).await,
                        None => Vec::new(),
                    };
                    let _ = reply.send(peers);
                }
                Command::Shutdown => break,
            }
        }

        // Tear down the active subscription on the way out.
        if let Some(ws) = self.workspace.take() {
            if let Err(e) = self.channel.unsubscribe(&ws).await {
                warn!(workspace = ws, error = %e, "unsubscribe on shutdown failed");
            }
        }
        debug!("workspace controller stopped");
    }

    /// Bind a workspace: unsubscribe the old topic (fully, before the new
    /// subscribe begins), clear the set, bump the generation, subscribe
    /// the new topic. Any failure leaves the controller unbound rather
    /// than stale.
    async fn set_workspace(&mut self, name: String) -> Result<()> {
        if name.is_empty() {
            return Err(Error::Validation("no workspace name given".to_string()));
        }

        if let Some(old) = self.workspace.take() {
            self.set.clear();
            self.generation += 1;
            if let Err(e) = self.channel.unsubscribe(&old).await {
                warn!(workspace = old, error = %e, "unsubscribe failed; left unbound");
                return Err(e.into());
            }
        } else {
            self.set.clear();
            self.generation += 1;
        }

        let tx = self.cmd_tx.clone();
        let generation = self.generation;
        let handler: Handler = Arc::new(move |msg| {
            // Delivery task context; hand the raw message to the actor. The
            // handler pins the generation it was subscribed under, so a
            // delivery still queued across a workspace switch is recognized
            // as stale by the actor.
            let _ = tx.send(Command::Remote { generation, msg });
        });
        self.channel.subscribe(&name, handler).await?;

        info!(workspace = name, "subscribed to workspace");
        self.emit(WorkspaceEvent::Subscribed {
            workspace: name.clone(),
        });
        self.workspace = Some(name);
        Ok(())
    }

    /// Insert a locally added address and broadcast it.
    async fn add_local(&mut self, address: ContentAddress) -> Result<AddOutcome> {
        if address.is_empty() {
            return Err(Error::Validation("no content address given".to_string()));
        }
        let Some(workspace) = self.workspace.clone() else {
            return Err(Error::NotBound);
        };

        if self.set.contains(&address) {
            debug!(%address, "already in the current workspace");
            return Ok(AddOutcome::AlreadyPresent);
        }

        self.set.insert(address.clone());
        self.emit(WorkspaceEvent::AddressAdded {
            address: address.clone(),
            origin: AddressOrigin::Local,
        });

        self.channel
            .publish(&workspace, address.as_bytes().to_vec())
            .await?;
        debug!(%address, workspace, "local address published");
        Ok(AddOutcome::Added)
    }

    /// Handle one inbound broadcast message.
    fn on_remote(&mut self, generation: u64, msg: InboundMessage) {
        // A delivery from a previous workspace binding, or from any topic
        // while the controller is unbound, must never touch the set.
        if generation != self.generation || self.workspace.is_none() {
            debug!(
                sender = %msg.sender,
                generation,
                current = self.generation,
                "discarding stale delivery"
            );
            return;
        }

        // Echo of our own announcement.
        if msg.sender == self.channel.local_id() {
            return;
        }

        let address = match String::from_utf8(msg.payload) {
            Ok(s) => ContentAddress::new(s),
            Err(e) => {
                warn!(sender = %msg.sender, error = %e, "dropping non-utf8 address payload");
                return;
            }
        };

        // Duplicate or retransmitted announcement.
        if self.set.contains(&address) {
            return;
        }

        // Record before fetching: a failed fetch must not make the address
        // eligible for automatic re-fetch.
        self.set.insert(address.clone());
        self.emit(WorkspaceEvent::AddressAdded {
            address: address.clone(),
            origin: AddressOrigin::Remote(msg.sender.clone()),
        });
        debug!(%address, sender = %msg.sender, "remote address recorded, fetching");

        let store = Arc::clone(&self.store);
        let tx = self.cmd_tx.clone();
        let generation = self.generation;
        tokio::spawn(async move {
            let result = store
                .get_content(&address)
                .await
                .map_err(|e| e.to_string());
            let _ = tx.send(Command::FetchDone {
                generation,
                address,
                result,
            });
        });
    }

    /// Completion of an off-actor fetch.
    fn on_fetch_done(
        &mut self,
        generation: u64,
        address: ContentAddress,
        result: std::result::Result<Vec<FetchedContent>, String>,
    ) {
        if generation != self.generation {
            debug!(%address, generation, current = self.generation, "discarding stale fetch");
            return;
        }
        match result {
            Ok(contents) => {
                for content in contents {
                    info!(%address, name = content.name, size = content.size, "content fetched");
                    self.emit(WorkspaceEvent::ContentFetched {
                        address: address.clone(),
                        content,
                    });
                }
            }
            Err(reason) => {
                warn!(%address, reason, "fetch failed; address stays recorded");
                self.emit(WorkspaceEvent::OperationFailed {
                    context: format!("failed to fetch {address}"),
                    error: reason,
                });
            }
        }
    }

    /// Re-publish every known address, one message per address, so a peer
    /// that subscribed after the files were added recovers the list.
    fn announce(&self) {
        let Some(workspace) = self.workspace.clone() else {
            return;
        };
        if self.set.is_empty() {
            return;
        }

        // Snapshot in the actor, flood off it: a slow transport must not
        // stall command processing.
        let snapshot: Vec<ContentAddress> = self.set.iter().cloned().collect();
        let channel = Arc::clone(&self.channel);
        let events = self.events.clone();
        debug!(workspace, count = snapshot.len(), "announcing file list");

        tokio::spawn(async move {
            for address in snapshot {
                // Each publish is independent; one failure stops nothing.
                if let Err(e) = channel
                    .publish(&workspace, address.as_bytes().to_vec())
                    .await
                {
                    warn!(%address, error = %e, "announce publish failed");
                    let _ = events.send(WorkspaceEvent::OperationFailed {
                        context: format!("failed to announce {address}"),
                        error: e.to_string(),
                    });
                }
            }
        });
    }

    fn emit(&self, event: WorkspaceEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }
}

/// Cloneable handle to a running [`WorkspaceController`].
#[derive(Clone)]
pub struct WorkspaceHandle {
    cmd_tx: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<WorkspaceEvent>,
}

impl WorkspaceHandle {
    /// Switch to `name`: unsubscribe the old topic, clear the set,
    /// subscribe the new one.
    pub async fn set_workspace(&self, name: &str) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::SetWorkspace {
                name: name.to_string(),
                reply,
            })
            .map_err(|_| Error::Closed)?;
        rx.await.map_err(|_| Error::Closed)?
    }

    /// Add a locally known address and broadcast it on the active topic.
    pub async fn add_local(&self, address: ContentAddress) -> Result<AddOutcome> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::AddLocal { address, reply })
            .map_err(|_| Error::Closed)?;
        rx.await.map_err(|_| Error::Closed)?
    }

    /// Snapshot of the current address set, most recent first.
    pub async fn addresses(&self) -> Result<Vec<ContentAddress>> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Query { reply })
            .map_err(|_| Error::Closed)?;
        rx.await.map_err(|_| Error::Closed)
    }

    /// Peers currently visible on the active workspace topic.
    pub async fn workspace_peers(&self) -> Result<Vec<PeerRef>> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::ListPeers { reply })
            .map_err(|_| Error::Closed)?;
        rx.await.map_err(|_| Error::Closed)
    }

    /// Trigger an announce pass outside the periodic schedule.
    pub fn announce_now(&self) -> Result<()> {
        self.cmd_tx
            .send(Command::AnnounceTick)
            .map_err(|_| Error::Closed)
    }

    /// Subscribe to controller events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<WorkspaceEvent> {
        self.events.subscribe()
    }

    /// Stop the controller; the active topic is unsubscribed best-effort.
    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(Command::Shutdown);
    }

    /// Whether the controller task is still running.
    pub fn is_open(&self) -> bool {
        !self.cmd_tx.is_closed()
    }
}
