//! Content addresses and the deduplicated address set.

use std::collections::HashSet;

/// An opaque, immutable, globally unique identifier for a piece of
/// content, in textual form.
///
/// Equality is byte-exact; no canonicalization is assumed. The core never
/// interprets an address beyond equality and its byte encoding on the
/// wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentAddress(String);

impl ContentAddress {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Textual encoding as raw bytes - the broadcast wire format.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for ContentAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContentAddress {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ContentAddress {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Insertion-ordered record of the content addresses known to belong to
/// the current workspace, with uniqueness enforced.
///
/// Owned exclusively by the workspace controller; cleared exactly on
/// workspace change.
#[derive(Debug, Default)]
pub struct AddressSet {
    /// Insertion order, oldest first.
    order: Vec<ContentAddress>,
    /// Membership index.
    known: HashSet<ContentAddress>,
}

impl AddressSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an address. Returns `false` (and changes nothing) if it is
    /// already present.
    pub fn insert(&mut self, address: ContentAddress) -> bool {
        if !self.known.insert(address.clone()) {
            return false;
        }
        self.order.push(address);
        true
    }

    pub fn contains(&self, address: &ContentAddress) -> bool {
        self.known.contains(address)
    }

    /// Remove everything. Used on workspace change.
    pub fn clear(&mut self) {
        self.order.clear();
        self.known.clear();
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Snapshot for display, most recent first.
    pub fn snapshot(&self) -> Vec<ContentAddress> {
        self.order.iter().rev().cloned().collect()
    }

    /// Iterate in insertion order, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &ContentAddress> {
        self.order.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_is_idempotent() {
        let mut set = AddressSet::new();
        assert!(set.insert("bafy123".into()));
        assert!(!set.insert("bafy123".into()));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn snapshot_is_most_recent_first() {
        let mut set = AddressSet::new();
        set.insert("a".into());
        set.insert("b".into());
        set.insert("c".into());

        let snap = set.snapshot();
        assert_eq!(
            snap,
            vec![
                ContentAddress::from("c"),
                ContentAddress::from("b"),
                ContentAddress::from("a")
            ]
        );
    }

    #[test]
    fn duplicate_insert_does_not_reorder() {
        let mut set = AddressSet::new();
        set.insert("a".into());
        set.insert("b".into());
        set.insert("a".into());

        assert_eq!(set.snapshot()[0], ContentAddress::from("b"));
    }

    #[test]
    fn clear_empties_everything() {
        let mut set = AddressSet::new();
        set.insert("a".into());
        set.clear();
        assert!(set.is_empty());
        assert!(!set.contains(&"a".into()));
        // Re-insertion after clear succeeds.
        assert!(set.insert("a".into()));
    }

    #[test]
    fn equality_is_byte_exact() {
        let mut set = AddressSet::new();
        set.insert("Bafy".into());
        assert!(!set.contains(&"bafy".into()));
    }
}
