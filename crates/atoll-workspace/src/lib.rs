//! Atoll workspace convergence core
//!
//! A set of peers identified only by a shared workspace name converge on a
//! common list of content-addressed files without a central server. Any
//! peer adding a file broadcasts its content address on the workspace
//! topic; every other peer deduplicates, fetches the content, and records
//! the address. A periodic announcer re-broadcasts the whole known set so
//! late joiners recover it without a pull protocol.
//!
//! # Consistency model
//!
//! Deliberately at-least-once and eventually consistent: duplicate
//! delivery is harmless because insertion is idempotent, and there is no
//! conflict resolution beyond set union. Publishers are not
//! authenticated; any peer subscribed to a workspace name can inject
//! addresses.
//!
//! # Architecture
//!
//! All state lives in a single actor task ([`WorkspaceController`]) that
//! owns the [`AddressSet`] and processes typed commands one at a time, so
//! the check-then-insert critical section needs no locking. Network I/O
//! (content fetches, announce floods) runs on detached tasks tagged with
//! the workspace generation they belong to; results from a generation
//! that is no longer current are discarded.

mod address;
mod announcer;
mod controller;
mod error;
mod store;

pub use address::{AddressSet, ContentAddress};
pub use announcer::PeriodicAnnouncer;
pub use controller::{
    AddOutcome, AddressOrigin, WorkspaceController, WorkspaceEvent, WorkspaceHandle,
};
pub use error::{Error, Result};
pub use store::{ContentStore, FetchedContent, MemoryStore};
