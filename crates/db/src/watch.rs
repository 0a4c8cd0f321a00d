//! In-process registry of document watchers shared by the store backends.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use tokio::sync::watch;

use crate::document::Snapshot;
use crate::path::DocumentPath;

/// Fan-out of committed document changes to watchers.
#[derive(Debug, Default)]
pub struct WatchRegistry {
    senders: Mutex<HashMap<DocumentPath, watch::Sender<Snapshot>>>,
}

impl WatchRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to `current.path`.
    ///
    /// `current` seeds the channel only when no live channel exists; a live
    /// channel already holds the latest published snapshot.
    pub fn subscribe(&self, current: Snapshot) -> watch::Receiver<Snapshot> {
        let mut senders = self.senders.lock().unwrap_or_else(PoisonError::into_inner);
        match senders.get(&current.path) {
            Some(sender) if !sender.is_closed() => sender.subscribe(),
            _ => {
                let path = current.path.clone();
                let (sender, receiver) = watch::channel(current);
                senders.insert(path, sender);
                receiver
            }
        }
    }

    /// Notify watchers of a committed snapshot.
    pub fn publish(&self, snapshot: Snapshot) {
        let mut senders = self.senders.lock().unwrap_or_else(PoisonError::into_inner);
        let path = snapshot.path.clone();
        if let Some(sender) = senders.get(&path) {
            // Closed once every receiver is dropped.
            if sender.send(snapshot).is_err() {
                senders.remove(&path);
            }
        }
    }

    /// Number of documents with at least one live watcher.
    #[must_use]
    pub fn active_watches(&self) -> usize {
        let senders = self.senders.lock().unwrap_or_else(PoisonError::into_inner);
        senders.values().filter(|s| !s.is_closed()).count()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn path() -> DocumentPath {
        DocumentPath::parse("users/u1/following/c1").unwrap()
    }

    #[tokio::test]
    async fn test_subscriber_sees_initial_and_published() {
        let registry = WatchRegistry::new();
        let mut rx = registry.subscribe(Snapshot::missing(path()));
        assert!(!rx.borrow_and_update().exists());

        registry.publish(Snapshot::found(path(), Map::new()));
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().exists());
    }

    #[test]
    fn test_dropped_receivers_are_pruned() {
        let registry = WatchRegistry::new();
        let rx = registry.subscribe(Snapshot::missing(path()));
        assert_eq!(registry.active_watches(), 1);

        drop(rx);
        assert_eq!(registry.active_watches(), 0);
        registry.publish(Snapshot::missing(path()));
        assert!(registry.senders.lock().unwrap().is_empty());
    }

    #[test]
    fn test_publish_without_watchers_is_a_no_op() {
        let registry = WatchRegistry::new();
        registry.publish(Snapshot::missing(path()));
        assert_eq!(registry.active_watches(), 0);
    }
}
