//! Document store abstraction.
//!
//! Services talk to persistence only through [`DocumentStore`]. Atomic
//! multi-document changes go through [`StoreTransaction`], usually via
//! [`run_transaction`].

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::sync::watch;
use wildwatch_common::AppResult;

use crate::document::{DocumentData, Snapshot, Update};
use crate::path::{CollectionPath, DocumentPath};

/// Ordering of [`DocumentStore::list`] results by document ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListOrder {
    #[default]
    Ascending,
    Descending,
}

/// Key-path addressed document persistence.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read a single document.
    async fn get(&self, path: &DocumentPath) -> AppResult<Snapshot>;

    /// Create or fully replace a document.
    async fn set(&self, path: &DocumentPath, data: DocumentData) -> AppResult<()>;

    /// Merge top-level fields into a document, creating it if absent.
    async fn merge(&self, path: &DocumentPath, data: DocumentData) -> AppResult<()>;

    /// Partially update an existing document. Fails with `NotFound` if absent.
    async fn update(&self, path: &DocumentPath, update: Update) -> AppResult<()>;

    /// Delete a document. Deleting a missing document is not an error.
    async fn delete(&self, path: &DocumentPath) -> AppResult<()>;

    /// List up to `limit` documents directly inside `collection`, ordered by
    /// document ID.
    async fn list(
        &self,
        collection: &CollectionPath,
        order: ListOrder,
        limit: u64,
    ) -> AppResult<Vec<Snapshot>>;

    /// Begin a transaction.
    ///
    /// Conflicting transactions never both commit.
    async fn begin(&self) -> AppResult<Box<dyn StoreTransaction>>;

    /// Watch a document.
    ///
    /// The receiver starts with the current snapshot and observes every
    /// committed change. Dropping the receiver ends the watch.
    async fn watch(&self, path: &DocumentPath) -> AppResult<watch::Receiver<Snapshot>>;
}

/// An open transaction.
///
/// Reads observe the transaction's own writes. Dropping a transaction without
/// calling [`StoreTransaction::commit`] discards its writes.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Read a document.
    async fn get(&mut self, path: &DocumentPath) -> AppResult<Snapshot>;

    /// Create or fully replace a document.
    async fn set(&mut self, path: &DocumentPath, data: DocumentData) -> AppResult<()>;

    /// Partially update an existing document.
    async fn update(&mut self, path: &DocumentPath, update: Update) -> AppResult<()>;

    /// Delete a document.
    async fn delete(&mut self, path: &DocumentPath) -> AppResult<()>;

    /// Make all writes visible atomically.
    async fn commit(self: Box<Self>) -> AppResult<()>;

    /// Discard all writes.
    async fn rollback(self: Box<Self>) -> AppResult<()>;
}

/// Run `f` inside a transaction.
///
/// Commits when `f` returns `Ok`. When `f` fails the transaction is rolled back
/// and the error is returned unchanged. No retry is attempted.
///
/// ```ignore
/// let count = run_transaction(store, |tx| {
///     Box::pin(async move {
///         let snapshot = tx.get(&path).await?;
///         tx.update(&path, Update::new().increment("count", 1)).await?;
///         Ok(snapshot.exists())
///     })
/// })
/// .await?;
/// ```
pub async fn run_transaction<T, F>(store: &dyn DocumentStore, f: F) -> AppResult<T>
where
    T: Send,
    F: for<'t> FnOnce(&'t mut (dyn StoreTransaction + 'static)) -> BoxFuture<'t, AppResult<T>>
        + Send,
{
    let mut tx = store.begin().await?;

    match f(tx.as_mut()).await {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(error = %rollback_err, "Failed to roll back transaction");
            }
            Err(e)
        }
    }
}
