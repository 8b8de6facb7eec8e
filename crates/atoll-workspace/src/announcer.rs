//! Periodic re-announcement of the known address set.
//!
//! There is no "sync on join" handshake: a peer that subscribes after
//! files were already added recovers the list on the next tick, because
//! every holder re-publishes every address it knows on a fixed interval.
//! Duplicate delivery is harmless (insertion is idempotent).

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::controller::WorkspaceHandle;

/// Drives announce ticks into a workspace controller.
pub struct PeriodicAnnouncer;

impl PeriodicAnnouncer {
    /// Default announce interval, matching the original design.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

    /// Spawn the announce loop. The task ends when the controller does.
    pub fn spawn(handle: WorkspaceHandle, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick fires immediately; skip it so the first
            // announce happens one full interval after startup.
            interval.tick().await;
            loop {
                interval.tick().await;
                if handle.announce_now().is_err() {
                    debug!("controller gone, announcer stopping");
                    break;
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::WorkspaceController;
    use crate::store::MemoryStore;
    use atoll_pubsub::MemoryBus;
    use std::sync::Arc;

    #[tokio::test]
    async fn announcer_stops_when_controller_shuts_down() {
        let bus = MemoryBus::new();
        let handle = WorkspaceController::spawn(
            Arc::new(bus.endpoint()),
            Arc::new(MemoryStore::new()),
        );

        let task = PeriodicAnnouncer::spawn(handle.clone(), Duration::from_millis(10));

        handle.shutdown();
        // The next tick notices the closed channel and the task exits.
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("announcer did not stop")
            .unwrap();
    }
}
