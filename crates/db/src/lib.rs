//! Persistence layer for wildwatch.
//!
//! Everything above this crate sees a key-path addressed [`DocumentStore`].
//! Two backends are provided: [`MemoryStore`] and [`SqlDocumentStore`]
//! (`PostgreSQL` through sea-orm).

pub mod document;
pub mod entities;
pub mod memory;
pub mod migrations;
pub mod path;
pub mod records;
pub mod sql;
pub mod store;
pub mod test_utils;
pub mod watch;

pub use document::{DocumentData, FieldUpdate, Snapshot, Update, to_data};
pub use memory::MemoryStore;
pub use path::{CollectionPath, DocumentPath, paths};
pub use sql::SqlDocumentStore;
pub use store::{DocumentStore, ListOrder, StoreTransaction, run_transaction};

use std::sync::Arc;
use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use tracing::log::LevelFilter;
use wildwatch_common::{AppError, Config, DatabaseConfig, StoreBackend};

/// Initialize database connection.
pub async fn init(config: &DatabaseConfig) -> Result<DatabaseConnection, AppError> {
    let mut opt = ConnectOptions::new(&config.url);

    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(10))
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .sqlx_logging(true)
        .sqlx_logging_level(LevelFilter::Debug);

    Database::connect(opt).await.map_err(sql::db_err)
}

/// Run pending migrations.
pub async fn migrate(db: &DatabaseConnection) -> Result<(), AppError> {
    use sea_orm_migration::MigratorTrait;
    migrations::Migrator::up(db, None).await.map_err(sql::db_err)
}

/// Open the document store selected by configuration.
///
/// For [`StoreBackend::Postgres`] this connects and runs pending migrations.
pub async fn open_store(config: &Config) -> Result<Arc<dyn DocumentStore>, AppError> {
    match config.store.backend {
        StoreBackend::Memory => {
            tracing::info!("Using in-memory document store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Postgres => {
            let database = config.store.database.as_ref().ok_or_else(|| {
                AppError::Config("store.database is required for the postgres backend".to_string())
            })?;
            let db = init(database).await?;
            migrate(&db).await?;
            tracing::info!("Using PostgreSQL document store");
            Ok(Arc::new(SqlDocumentStore::new(Arc::new(db))))
        }
    }
}
