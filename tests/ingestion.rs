//! End-to-end ingestion pipeline tests.
//!
//! Covers the inbound-IHAVE and duplicate-submission scenarios from the
//! daemon's scenario list: an article pushed onto `infeed` must appear in
//! both the database and the store within a few ingestion ticks, and
//! resubmitting the same Message-ID must not create a second row.

use std::sync::Arc;
use std::time::Duration;

use nntpchand::article::ArticleBuilder;
use nntpchand::db::{Database, SqliteDatabase};
use nntpchand::expire::ExpirationCore;
use nntpchand::ingest::{self, Pipeline};
use nntpchand::registry;
use nntpchand::store::{ArticleStore, FilesystemStore};
use sqlx::sqlite::SqlitePoolOptions;

async fn test_pipeline() -> (ingest::IngestHandles, Arc<dyn Database>, Arc<dyn ArticleStore>) {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn ArticleStore> = Arc::new(FilesystemStore::open(dir.path()).await.unwrap());

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let db: Arc<dyn Database> = Arc::new(SqliteDatabase::from_pool(pool));
    db.create_tables().await.unwrap();

    let expire = Arc::new(ExpirationCore::new(db.clone(), store.clone(), 100));
    let registry = registry::spawn();

    let pipeline = Pipeline {
        store: store.clone(),
        db: db.clone(),
        expire,
        registry,
        instance_name: "test.example.com".to_string(),
        frontend: None,
    };
    let handles = ingest::spawn(pipeline);
    (handles, db, store)
}

async fn wait_for_count(db: &Arc<dyn Database>, target: i64) {
    for _ in 0..200 {
        if db.article_count().await.unwrap() == target {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("article count never reached {target}");
}

#[tokio::test]
async fn test_ingested_article_appears_in_db_and_store() {
    let (handles, db, store) = test_pipeline().await;

    let article = ArticleBuilder::new()
        .from("poster@example.com")
        .subject("hello")
        .newsgroups(vec!["overchan.random"])
        .message_id("<a1$1@x.example>")
        .body("first post")
        .build()
        .unwrap();

    handles.infeed.send(article).await.unwrap();

    wait_for_count(&db, 1).await;

    let msgid = nntpchand::MessageId::parse("<a1$1@x.example>").unwrap();
    assert!(store.get_message(&msgid).await.unwrap().is_some());
}

#[tokio::test]
async fn test_duplicate_submission_does_not_duplicate_row() {
    let (handles, db, _store) = test_pipeline().await;

    let make = || {
        ArticleBuilder::new()
            .from("poster@example.com")
            .subject("hello")
            .newsgroups(vec!["overchan.random"])
            .message_id("<dup$1@x.example>")
            .body("first post")
            .build()
            .unwrap()
    };

    handles.infeed.send(make()).await.unwrap();
    handles.infeed.send(make()).await.unwrap();

    wait_for_count(&db, 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(db.article_count().await.unwrap(), 1);
}
