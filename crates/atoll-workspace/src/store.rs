//! The content storage collaborator.
//!
//! The convergence core treats content-addressed storage as an external
//! system reachable through [`ContentStore`]: add bytes and get an address
//! back, fetch bytes by address, and manage storage-level peer
//! connections. The core never interprets addresses beyond equality.
//!
//! [`MemoryStore`] is the in-process implementation: blake3-addressed,
//! hex-encoded, no persistence.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::debug;

use crate::address::ContentAddress;
use crate::error::{Error, Result};
use atoll_pubsub::PeerRef;

/// Content retrieved from the store for one address.
#[derive(Debug, Clone)]
pub struct FetchedContent {
    /// File name recorded when the content was added.
    pub name: String,
    /// Content length in bytes.
    pub size: u64,
    /// The content itself.
    pub bytes: Vec<u8>,
}

/// External content-addressed storage and transport.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Store `bytes` under `name` and return its content address.
    async fn add_content(&self, bytes: Vec<u8>, name: &str) -> Result<ContentAddress>;

    /// Retrieve the content behind `address`. An address may resolve to
    /// several entries (the original wraps files in a directory).
    async fn get_content(&self, address: &ContentAddress) -> Result<Vec<FetchedContent>>;

    /// Storage-level peers currently connected.
    async fn connected_peers(&self) -> Vec<PeerRef>;

    /// Dial a storage-level peer by address string.
    async fn connect_peer(&self, addr: &str) -> Result<()>;
}

#[derive(Default)]
struct StoreState {
    blobs: HashMap<ContentAddress, FetchedContent>,
    peers: Vec<PeerRef>,
}

/// In-memory blake3-addressed store.
///
/// Addresses are the hex digest of the content bytes, so adding the same
/// bytes twice yields the same address.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute the address the store would assign to `bytes`.
    pub fn address_of(bytes: &[u8]) -> ContentAddress {
        ContentAddress::new(hex::encode(blake3::hash(bytes).as_bytes()))
    }

    /// Seed content directly, bypassing validation. Lets tests stand this
    /// store in for a remote peer that already holds the content.
    pub fn seed(&self, name: &str, bytes: Vec<u8>) -> ContentAddress {
        let address = Self::address_of(&bytes);
        let mut state = self.state.lock().expect("store lock poisoned");
        state.blobs.insert(
            address.clone(),
            FetchedContent {
                name: name.to_string(),
                size: bytes.len() as u64,
                bytes,
            },
        );
        address
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn add_content(&self, bytes: Vec<u8>, name: &str) -> Result<ContentAddress> {
        if name.is_empty() {
            return Err(Error::Validation("no file name given".to_string()));
        }
        let address = self.seed(name, bytes);
        debug!(%address, name, "content added");
        Ok(address)
    }

    async fn get_content(&self, address: &ContentAddress) -> Result<Vec<FetchedContent>> {
        let state = self.state.lock().expect("store lock poisoned");
        match state.blobs.get(address) {
            Some(content) => Ok(vec![content.clone()]),
            None => Err(Error::Fetch {
                address: address.clone(),
                reason: "content not present in store".to_string(),
            }),
        }
    }

    async fn connected_peers(&self) -> Vec<PeerRef> {
        let state = self.state.lock().expect("store lock poisoned");
        state.peers.clone()
    }

    async fn connect_peer(&self, addr: &str) -> Result<()> {
        if addr.is_empty() {
            return Err(Error::PeerConnect("no peer address given".to_string()));
        }
        let mut state = self.state.lock().expect("store lock poisoned");
        state.peers.push(PeerRef(addr.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_then_get_roundtrips() {
        let store = MemoryStore::new();
        let address = store
            .add_content(b"hello atoll".to_vec(), "hello.txt")
            .await
            .unwrap();

        let fetched = store.get_content(&address).await.unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].name, "hello.txt");
        assert_eq!(fetched[0].size, 11);
        assert_eq!(fetched[0].bytes, b"hello atoll");
    }

    #[tokio::test]
    async fn same_bytes_same_address() {
        let store = MemoryStore::new();
        let a = store.add_content(b"x".to_vec(), "a").await.unwrap();
        let b = store.add_content(b"x".to_vec(), "b").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn missing_address_is_a_fetch_error() {
        let store = MemoryStore::new();
        let err = store
            .get_content(&ContentAddress::from("bafy-nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Fetch { .. }));
    }

    #[tokio::test]
    async fn empty_name_is_rejected() {
        let store = MemoryStore::new();
        let err = store.add_content(b"x".to_vec(), "").await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn peer_bookkeeping() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.connect_peer("").await,
            Err(Error::PeerConnect(_))
        ));

        store.connect_peer("/ip4/127.0.0.1/udp/9400").await.unwrap();
        assert_eq!(store.connected_peers().await.len(), 1);
    }
}
