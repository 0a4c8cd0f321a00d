//! `PostgreSQL` document store integration tests.
//!
//! These tests require a running `PostgreSQL` instance.
//! Run with: `cargo test --test db_integration -- --ignored`
//!
//! Environment variables:
//!   `TEST_DB_HOST` (default: localhost)
//!   `TEST_DB_PORT` (default: 5433)
//!   `TEST_DB_USER` (default: `wildwatch_test`)
//!   `TEST_DB_PASSWORD` (default: `wildwatch_test`)

#![allow(clippy::unwrap_used)]

use serde_json::json;
use wildwatch_common::AppError;
use wildwatch_db::test_utils::{TestDatabase, TestDbConfig};
use wildwatch_db::{DocumentStore, ListOrder, Update, paths, run_transaction, to_data};

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_set_update_delete_roundtrip() {
    let db = TestDatabase::create_unique().await.unwrap();
    let store = db.store();
    let creator = paths::creator("c1").unwrap();

    store
        .set(&creator, to_data(&json!({ "name": "Heron", "followerCount": 0 })).unwrap())
        .await
        .unwrap();
    store
        .update(&creator, Update::new().increment("followerCount", 2))
        .await
        .unwrap();

    let data = store.get(&creator).await.unwrap().data.unwrap();
    assert_eq!(data["followerCount"], json!(2));
    assert_eq!(data["name"], json!("Heron"));

    store.delete(&creator).await.unwrap();
    assert!(!store.get(&creator).await.unwrap().exists());

    drop(store);
    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_update_missing_document_is_not_found() {
    let db = TestDatabase::create_unique().await.unwrap();
    let store = db.store();

    let result = store
        .update(&paths::creator("nobody").unwrap(), Update::new().increment("postCount", 1))
        .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));

    drop(store);
    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_failed_transaction_leaves_no_writes() {
    let db = TestDatabase::create_unique().await.unwrap();
    let store = db.store();
    let following = paths::following("u1", "c1").unwrap();

    let result: Result<(), AppError> = run_transaction(&store, |tx| {
        let following = following.clone();
        Box::pin(async move {
            tx.set(&following, to_data(&json!({})).unwrap()).await?;
            Err(AppError::AlreadyFollowing)
        })
    })
    .await;

    assert!(matches!(result, Err(AppError::AlreadyFollowing)));
    assert!(!store.get(&following).await.unwrap().exists());

    drop(store);
    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_list_collection_in_id_order() {
    let db = TestDatabase::create_unique().await.unwrap();
    let store = db.store();

    for follower in ["u3", "u1", "u2"] {
        store
            .set(&paths::member("c1", follower).unwrap(), to_data(&json!({})).unwrap())
            .await
            .unwrap();
    }
    store
        .set(&paths::member("c2", "u9").unwrap(), to_data(&json!({})).unwrap())
        .await
        .unwrap();

    let members_of = paths::members_of("c1").unwrap();
    let members = store
        .list(&members_of, ListOrder::Ascending, 10)
        .await
        .unwrap();
    let ids: Vec<_> = members.iter().map(|s| s.path.id().to_string()).collect();
    assert_eq!(ids, vec!["u1", "u2", "u3"]);

    let newest = store
        .list(&members_of, ListOrder::Descending, 2)
        .await
        .unwrap();
    assert_eq!(newest[0].path.id(), "u3");
    assert_eq!(newest.len(), 2);

    db.cleanup().await.unwrap();
    assert!(
        store
            .list(&members_of, ListOrder::Ascending, 10)
            .await
            .unwrap()
            .is_empty()
    );

    drop(store);
    db.drop_database().await.unwrap();
}

#[test]
fn test_config_from_env() {
    let config = TestDbConfig::default();
    assert!(!config.host.is_empty());
    assert!(config.port > 0);
    assert!(!config.username.is_empty());
    assert!(config.database_url().starts_with("postgres://"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires running PostgreSQL instance"]
async fn test_concurrent_transactions_never_lose_increments() {
    const WRITERS: usize = 16;
    let db = TestDatabase::create_unique().await.unwrap();
    let store = db.store();
    let creator = paths::creator("c1").unwrap();
    store
        .set(&creator, to_data(&json!({ "followerCount": 0 })).unwrap())
        .await
        .unwrap();

    let handles: Vec<_> = (0..WRITERS)
        .map(|i| {
            let store = store.clone();
            let creator = creator.clone();
            let member = paths::member("c1", &format!("u{i:02}")).unwrap();
            tokio::spawn(async move {
                run_transaction(&store, move |tx| {
                    Box::pin(async move {
                        tx.get(&member).await?;
                        tx.set(&member, to_data(&json!({}))?).await?;
                        tx.update(&creator, Update::new().increment("followerCount", 1))
                            .await
                    })
                })
                .await
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let data = store.get(&creator).await.unwrap().data.unwrap();
    assert_eq!(data["followerCount"], json!(WRITERS));
    let members = store
        .list(&paths::members_of("c1").unwrap(), ListOrder::Ascending, 100)
        .await
        .unwrap();
    assert_eq!(members.len(), WRITERS);

    drop(store);
    db.drop_database().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires running PostgreSQL instance"]
async fn test_transactions_serialize_on_missing_documents() {
    let db = TestDatabase::create_unique().await.unwrap();
    let store = db.store();
    let marker = paths::following("u1", "c1").unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            let marker = marker.clone();
            tokio::spawn(async move {
                run_transaction(&store, move |tx| {
                    Box::pin(async move {
                        if tx.get(&marker).await?.exists() {
                            return Ok(false);
                        }
                        tx.set(&marker, to_data(&json!({}))?).await?;
                        Ok(true)
                    })
                })
                .await
            })
        })
        .collect();

    let mut created = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap() {
            created += 1;
        }
    }
    assert_eq!(created, 1);

    drop(store);
    db.drop_database().await.unwrap();
}
