//! `PostgreSQL` document store built on sea-orm.
//!
//! Every document is one row of the `document` table. Transactions run at
//! `READ COMMITTED` and take a transaction-scoped advisory lock on each path
//! before touching it, including paths with no row yet. A transaction that
//! needs a path held by another waits for it to finish and then reads the
//! committed result, so contending transactions serialize instead of failing.
//! A deadlock between transactions surfaces as
//! [`AppError::TransactionConflict`].
//!
//! Standalone `set` and `delete` are single statements and take no lock.
//! Watchers only observe writes made through this process.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseBackend, DatabaseConnection, DatabaseTransaction, DbErr,
    EntityTrait, IsolationLevel, Order, QueryFilter, QueryOrder, QuerySelect, Set, Statement,
    TransactionTrait, sea_query::OnConflict,
};
use serde_json::Value;
use tokio::sync::watch;
use wildwatch_common::{AppError, AppResult};

use crate::document::{DocumentData, Snapshot, Update};
use crate::entities::{Document, document};
use crate::path::{CollectionPath, DocumentPath};
use crate::store::{DocumentStore, ListOrder, StoreTransaction};
use crate::watch::WatchRegistry;

/// `LIMIT` must fit in a signed 64-bit integer.
const MAX_LIST_LIMIT: u64 = i64::MAX as u64;

/// Map a sea-orm error onto the application taxonomy.
pub(crate) fn db_err(err: DbErr) -> AppError {
    let message = err.to_string();
    // SQLSTATE 40001 / 40P01
    if message.contains("could not serialize access") || message.contains("deadlock detected") {
        return AppError::TransactionConflict(message);
    }
    match err {
        DbErr::Conn(_) | DbErr::ConnectionAcquire(_) => AppError::Unavailable(message),
        _ => AppError::Database(message),
    }
}

fn snapshot_from(path: &DocumentPath, model: Option<document::Model>) -> AppResult<Snapshot> {
    match model {
        None => Ok(Snapshot::missing(path.clone())),
        Some(model) => match model.data {
            Value::Object(data) => Ok(Snapshot::found(path.clone(), data)),
            other => Err(AppError::Serialization(format!(
                "{path}: stored document is not an object: {other}"
            ))),
        },
    }
}

async fn find<C: ConnectionTrait>(conn: &C, path: &DocumentPath) -> AppResult<Snapshot> {
    let model = Document::find_by_id(path.as_str().to_string())
        .one(conn)
        .await
        .map_err(db_err)?;
    snapshot_from(path, model)
}

/// Lock held until the enclosing transaction ends. Hash collisions only cause
/// extra waiting.
fn path_lock(backend: DatabaseBackend, path: &DocumentPath) -> Statement {
    Statement::from_sql_and_values(
        backend,
        "SELECT pg_advisory_xact_lock(hashtextextended($1, 0))",
        [path.as_str().into()],
    )
}

async fn upsert<C: ConnectionTrait>(
    conn: &C,
    path: &DocumentPath,
    data: DocumentData,
) -> AppResult<()> {
    let model = document::ActiveModel {
        path: Set(path.as_str().to_string()),
        collection: Set(path.parent().as_str().to_string()),
        data: Set(Value::Object(data)),
        updated_at: Set(Utc::now().into()),
    };

    Document::insert(model)
        .on_conflict(
            OnConflict::column(document::Column::Path)
                .update_columns([document::Column::Data, document::Column::UpdatedAt])
                .to_owned(),
        )
        .exec_without_returning(conn)
        .await
        .map_err(db_err)?;
    Ok(())
}

async fn remove<C: ConnectionTrait>(conn: &C, path: &DocumentPath) -> AppResult<()> {
    Document::delete_by_id(path.as_str().to_string())
        .exec(conn)
        .await
        .map_err(db_err)?;
    Ok(())
}

/// [`DocumentStore`] backed by a sea-orm connection.
#[derive(Clone)]
pub struct SqlDocumentStore {
    db: Arc<DatabaseConnection>,
    watchers: Arc<WatchRegistry>,
}

impl SqlDocumentStore {
    /// Create a store over an existing connection. Run migrations first.
    #[must_use]
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            db,
            watchers: Arc::new(WatchRegistry::new()),
        }
    }

    async fn begin_locked(&self) -> AppResult<SqlTransaction> {
        let txn = self
            .db
            .begin_with_config(Some(IsolationLevel::ReadCommitted), None)
            .await
            .map_err(db_err)?;
        Ok(SqlTransaction {
            txn,
            locked: BTreeSet::new(),
            written: BTreeMap::new(),
            watchers: Arc::clone(&self.watchers),
        })
    }
}

#[async_trait]
impl DocumentStore for SqlDocumentStore {
    async fn get(&self, path: &DocumentPath) -> AppResult<Snapshot> {
        find(self.db.as_ref(), path).await
    }

    async fn set(&self, path: &DocumentPath, data: DocumentData) -> AppResult<()> {
        upsert(self.db.as_ref(), path, data.clone()).await?;
        tracing::debug!(path = %path, "Set document");
        self.watchers.publish(Snapshot::found(path.clone(), data));
        Ok(())
    }

    async fn merge(&self, path: &DocumentPath, data: DocumentData) -> AppResult<()> {
        let mut tx = self.begin_locked().await?;
        let mut merged = StoreTransaction::get(&mut tx, path)
            .await?
            .data
            .unwrap_or_default();
        merged.extend(data);
        StoreTransaction::set(&mut tx, path, merged).await?;
        Box::new(tx).commit().await
    }

    async fn update(&self, path: &DocumentPath, update: Update) -> AppResult<()> {
        let mut tx = self.begin_locked().await?;
        StoreTransaction::update(&mut tx, path, update).await?;
        Box::new(tx).commit().await
    }

    async fn delete(&self, path: &DocumentPath) -> AppResult<()> {
        remove(self.db.as_ref(), path).await?;
        tracing::debug!(path = %path, "Deleted document");
        self.watchers.publish(Snapshot::missing(path.clone()));
        Ok(())
    }

    async fn list(
        &self,
        collection: &CollectionPath,
        order: ListOrder,
        limit: u64,
    ) -> AppResult<Vec<Snapshot>> {
        let order = match order {
            ListOrder::Ascending => Order::Asc,
            ListOrder::Descending => Order::Desc,
        };
        let models = Document::find()
            .filter(document::Column::Collection.eq(collection.as_str()))
            .order_by(document::Column::Path, order)
            .limit(limit.min(MAX_LIST_LIMIT))
            .all(self.db.as_ref())
            .await
            .map_err(db_err)?;

        models
            .into_iter()
            .map(|model| {
                let path = DocumentPath::parse(model.path.clone())?;
                snapshot_from(&path, Some(model))
            })
            .collect()
    }

    async fn begin(&self) -> AppResult<Box<dyn StoreTransaction>> {
        Ok(Box::new(self.begin_locked().await?))
    }

    async fn watch(&self, path: &DocumentPath) -> AppResult<watch::Receiver<Snapshot>> {
        let current = find(self.db.as_ref(), path).await?;
        Ok(self.watchers.subscribe(current))
    }
}

/// Transaction over a [`SqlDocumentStore`].
///
/// `written` remembers the final state of every touched path so watchers can
/// be notified once the commit succeeds.
struct SqlTransaction {
    txn: DatabaseTransaction,
    locked: BTreeSet<DocumentPath>,
    written: BTreeMap<DocumentPath, Option<DocumentData>>,
    watchers: Arc<WatchRegistry>,
}

impl SqlTransaction {
    async fn lock(&mut self, path: &DocumentPath) -> AppResult<()> {
        if self.locked.contains(path) {
            return Ok(());
        }
        let statement = path_lock(self.txn.get_database_backend(), path);
        self.txn.execute(statement).await.map_err(db_err)?;
        self.locked.insert(path.clone());
        Ok(())
    }
}

#[async_trait]
impl StoreTransaction for SqlTransaction {
    async fn get(&mut self, path: &DocumentPath) -> AppResult<Snapshot> {
        self.lock(path).await?;
        find(&self.txn, path).await
    }

    async fn set(&mut self, path: &DocumentPath, data: DocumentData) -> AppResult<()> {
        self.lock(path).await?;
        upsert(&self.txn, path, data.clone()).await?;
        self.written.insert(path.clone(), Some(data));
        Ok(())
    }

    async fn update(&mut self, path: &DocumentPath, update: Update) -> AppResult<()> {
        let mut data = self
            .get(path)
            .await?
            .data
            .ok_or_else(|| AppError::NotFound(path.to_string()))?;
        update.apply(&mut data)?;
        self.set(path, data).await
    }

    async fn delete(&mut self, path: &DocumentPath) -> AppResult<()> {
        self.lock(path).await?;
        remove(&self.txn, path).await?;
        self.written.insert(path.clone(), None);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let Self {
            txn,
            written,
            watchers,
            ..
        } = *self;

        txn.commit().await.map_err(db_err)?;
        tracing::debug!(writes = written.len(), "Committed transaction");

        for (path, data) in written {
            watchers.publish(Snapshot { path, data });
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        self.txn.rollback().await.map_err(db_err)
    }
}
