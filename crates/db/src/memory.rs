//! In-memory document store.
//!
//! Documents live in an ordered map behind an async mutex. A transaction owns
//! the mutex from `begin` until commit or rollback, so transactions are fully
//! serialized. Non-transactional calls made by the same task while it holds an
//! open transaction will wait forever; finish the transaction first.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard, watch};
use wildwatch_common::{AppError, AppResult};

use crate::document::{DocumentData, Snapshot, Update};
use crate::path::{CollectionPath, DocumentPath};
use crate::store::{DocumentStore, ListOrder, StoreTransaction};
use crate::watch::WatchRegistry;

type Documents = BTreeMap<DocumentPath, DocumentData>;

/// Process-local [`DocumentStore`].
#[derive(Clone, Default)]
pub struct MemoryStore {
    documents: Arc<Mutex<Documents>>,
    watchers: Arc<WatchRegistry>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents with a live watcher.
    #[must_use]
    pub fn active_watches(&self) -> usize {
        self.watchers.active_watches()
    }

    /// Number of stored documents.
    pub async fn len(&self) -> usize {
        self.documents.lock().await.len()
    }

    /// Whether the store holds no documents.
    pub async fn is_empty(&self) -> bool {
        self.documents.lock().await.is_empty()
    }
}

fn snapshot_of(documents: &Documents, path: &DocumentPath) -> Snapshot {
    match documents.get(path) {
        Some(data) => Snapshot::found(path.clone(), data.clone()),
        None => Snapshot::missing(path.clone()),
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, path: &DocumentPath) -> AppResult<Snapshot> {
        let documents = self.documents.lock().await;
        Ok(snapshot_of(&documents, path))
    }

    async fn set(&self, path: &DocumentPath, data: DocumentData) -> AppResult<()> {
        let mut documents = self.documents.lock().await;
        documents.insert(path.clone(), data.clone());
        self.watchers.publish(Snapshot::found(path.clone(), data));
        Ok(())
    }

    async fn merge(&self, path: &DocumentPath, data: DocumentData) -> AppResult<()> {
        let mut documents = self.documents.lock().await;
        let merged = documents.entry(path.clone()).or_default();
        merged.extend(data);
        let merged = merged.clone();
        self.watchers.publish(Snapshot::found(path.clone(), merged));
        Ok(())
    }

    async fn update(&self, path: &DocumentPath, update: Update) -> AppResult<()> {
        let mut documents = self.documents.lock().await;
        let data = documents
            .get_mut(path)
            .ok_or_else(|| AppError::NotFound(path.to_string()))?;
        let mut updated = data.clone();
        update.apply(&mut updated)?;
        *data = updated.clone();
        self.watchers.publish(Snapshot::found(path.clone(), updated));
        Ok(())
    }

    async fn delete(&self, path: &DocumentPath) -> AppResult<()> {
        let mut documents = self.documents.lock().await;
        if documents.remove(path).is_some() {
            self.watchers.publish(Snapshot::missing(path.clone()));
        }
        Ok(())
    }

    async fn list(
        &self,
        collection: &CollectionPath,
        order: ListOrder,
        limit: u64,
    ) -> AppResult<Vec<Snapshot>> {
        let documents = self.documents.lock().await;
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        let prefix = collection.child_prefix();

        let mut children: Vec<_> = documents
            .iter()
            .skip_while(|(path, _)| path.as_str() < prefix.as_str())
            .take_while(|(path, _)| path.as_str().starts_with(&prefix))
            .filter(|(path, _)| collection.contains(path))
            .collect();
        if order == ListOrder::Descending {
            children.reverse();
        }

        Ok(children
            .into_iter()
            .take(limit)
            .map(|(path, data)| Snapshot::found(path.clone(), data.clone()))
            .collect())
    }

    async fn begin(&self) -> AppResult<Box<dyn StoreTransaction>> {
        let guard = Arc::clone(&self.documents).lock_owned().await;
        Ok(Box::new(MemoryTransaction {
            documents: guard,
            pending: BTreeMap::new(),
            watchers: Arc::clone(&self.watchers),
        }))
    }

    async fn watch(&self, path: &DocumentPath) -> AppResult<watch::Receiver<Snapshot>> {
        // Holding the lock keeps the seed snapshot consistent with publishes.
        let documents = self.documents.lock().await;
        Ok(self.watchers.subscribe(snapshot_of(&documents, path)))
    }
}

/// Transaction over a [`MemoryStore`].
///
/// Writes are buffered in `pending` (`None` marks a delete) and applied on commit.
struct MemoryTransaction {
    documents: OwnedMutexGuard<Documents>,
    pending: BTreeMap<DocumentPath, Option<DocumentData>>,
    watchers: Arc<WatchRegistry>,
}

impl MemoryTransaction {
    fn current(&self, path: &DocumentPath) -> Option<DocumentData> {
        match self.pending.get(path) {
            Some(pending) => pending.clone(),
            None => self.documents.get(path).cloned(),
        }
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn get(&mut self, path: &DocumentPath) -> AppResult<Snapshot> {
        Ok(match self.current(path) {
            Some(data) => Snapshot::found(path.clone(), data),
            None => Snapshot::missing(path.clone()),
        })
    }

    async fn set(&mut self, path: &DocumentPath, data: DocumentData) -> AppResult<()> {
        self.pending.insert(path.clone(), Some(data));
        Ok(())
    }

    async fn update(&mut self, path: &DocumentPath, update: Update) -> AppResult<()> {
        let mut data = self
            .current(path)
            .ok_or_else(|| AppError::NotFound(path.to_string()))?;
        update.apply(&mut data)?;
        self.pending.insert(path.clone(), Some(data));
        Ok(())
    }

    async fn delete(&mut self, path: &DocumentPath) -> AppResult<()> {
        self.pending.insert(path.clone(), None);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let Self {
            mut documents,
            pending,
            watchers,
        } = *self;

        for (path, change) in pending {
            let snapshot = match change {
                Some(data) => {
                    documents.insert(path.clone(), data.clone());
                    Snapshot::found(path, data)
                }
                None => {
                    documents.remove(&path);
                    Snapshot::missing(path)
                }
            };
            watchers.publish(snapshot);
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::document::to_data;
    use crate::store::run_transaction;
    use serde_json::json;

    fn path(p: &str) -> DocumentPath {
        DocumentPath::parse(p).unwrap()
    }

    fn data(value: serde_json::Value) -> DocumentData {
        to_data(&value).unwrap()
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = MemoryStore::new();
        let p = path("creators/c1");

        assert!(!store.get(&p).await.unwrap().exists());
        store.set(&p, data(json!({ "name": "Kestrel" }))).await.unwrap();
        assert_eq!(
            store.get(&p).await.unwrap().data.unwrap()["name"],
            json!("Kestrel")
        );

        store.delete(&p).await.unwrap();
        assert!(!store.get(&p).await.unwrap().exists());
        // Idempotent
        store.delete(&p).await.unwrap();
    }

    #[tokio::test]
    async fn test_set_replaces_merge_extends() {
        let store = MemoryStore::new();
        let p = path("creators/c1");

        store.set(&p, data(json!({ "name": "a", "bio": "b" }))).await.unwrap();
        store.set(&p, data(json!({ "name": "c" }))).await.unwrap();
        assert_eq!(store.get(&p).await.unwrap().data.unwrap(), data(json!({ "name": "c" })));

        store.merge(&p, data(json!({ "bio": "d" }))).await.unwrap();
        assert_eq!(
            store.get(&p).await.unwrap().data.unwrap(),
            data(json!({ "name": "c", "bio": "d" }))
        );
    }

    #[tokio::test]
    async fn test_update_missing_document_fails() {
        let store = MemoryStore::new();
        let result = store
            .update(&path("creators/nobody"), Update::new().increment("postCount", 1))
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_list_only_direct_children() {
        let store = MemoryStore::new();
        store.set(&path("creators/c1"), data(json!({}))).await.unwrap();
        store.set(&path("creators/c1/members/u2"), data(json!({}))).await.unwrap();
        store.set(&path("creators/c1/members/u1"), data(json!({}))).await.unwrap();
        store.set(&path("creators/c1/members/u1/x/y"), data(json!({}))).await.unwrap();
        store.set(&path("creators/c10/members/u9"), data(json!({}))).await.unwrap();

        let members = CollectionPath::parse("creators/c1/members").unwrap();
        let ids: Vec<_> = store
            .list(&members, ListOrder::Ascending, 10)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.path.id().to_string())
            .collect();
        assert_eq!(ids, vec!["u1", "u2"]);

        let newest = store
            .list(&members, ListOrder::Descending, 1)
            .await
            .unwrap();
        assert_eq!(newest.len(), 1);
        assert_eq!(newest[0].path.id(), "u2");
    }

    #[tokio::test]
    async fn test_transaction_commit_is_atomic() {
        let store = MemoryStore::new();
        let a = path("things/a");
        let b = path("things/b");

        let mut tx = store.begin().await.unwrap();
        tx.set(&a, data(json!({ "n": 1 }))).await.unwrap();
        tx.set(&b, data(json!({ "n": 2 }))).await.unwrap();
        assert!(tx.get(&a).await.unwrap().exists());
        tx.commit().await.unwrap();

        assert!(store.get(&a).await.unwrap().exists());
        assert!(store.get(&b).await.unwrap().exists());
    }

    #[tokio::test]
    async fn test_dropped_transaction_discards_writes() {
        let store = MemoryStore::new();
        let a = path("things/a");

        let mut tx = store.begin().await.unwrap();
        tx.set(&a, data(json!({}))).await.unwrap();
        drop(tx);

        assert!(!store.get(&a).await.unwrap().exists());
    }

    #[tokio::test]
    async fn test_run_transaction_rolls_back_on_error() {
        let store = MemoryStore::new();
        let a = path("things/a");

        let result: AppResult<()> = run_transaction(&store, |tx| {
            let a = a.clone();
            Box::pin(async move {
                tx.set(&a, data(json!({}))).await?;
                Err(AppError::BadRequest("abort".to_string()))
            })
        })
        .await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
        assert!(!store.get(&a).await.unwrap().exists());
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_serialized() {
        let store = MemoryStore::new();
        let counter = path("counters/c");
        store.set(&counter, data(json!({ "n": 0 }))).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..25 {
            let store = store.clone();
            let counter = counter.clone();
            handles.push(tokio::spawn(async move {
                run_transaction(&store, |tx| {
                    Box::pin(async move {
                        let current = tx.get(&counter).await?.data.unwrap()["n"]
                            .as_i64()
                            .unwrap();
                        tokio::task::yield_now().await;
                        tx.set(&counter, data(json!({ "n": current + 1 }))).await
                    })
                })
                .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.get(&counter).await.unwrap().data.unwrap()["n"], json!(25));
    }

    #[tokio::test]
    async fn test_watch_sees_committed_changes_only() {
        let store = MemoryStore::new();
        let a = path("things/a");
        let mut rx = store.watch(&a).await.unwrap();
        assert!(!rx.borrow_and_update().exists());
        assert_eq!(store.active_watches(), 1);

        let mut tx = store.begin().await.unwrap();
        tx.set(&a, data(json!({}))).await.unwrap();
        assert!(!rx.has_changed().unwrap());
        tx.commit().await.unwrap();

        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().exists());

        store.delete(&a).await.unwrap();
        rx.changed().await.unwrap();
        assert!(!rx.borrow_and_update().exists());

        drop(rx);
        assert_eq!(store.active_watches(), 0);
    }
}
