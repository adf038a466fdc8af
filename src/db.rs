//! Index of known message-ids, per-group listings, and article metadata.
//!
//! Backed by `sqlx`'s SQLite pool, generalising the teacher's `bb8`-based
//! connection pool (there, a pool of client connections to a remote peer)
//! into a pool of connections to the local metadata database.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use crate::config::DatabaseConfig;
use crate::message_id::MessageId;
use crate::Result;

/// Operations the ingestion pipeline and expiration core drive against the
/// metadata index.
#[async_trait]
pub trait Database: Send + Sync {
    /// Creates the schema if it does not already exist.
    async fn create_tables(&self) -> Result<()>;

    /// Total number of registered articles.
    async fn article_count(&self) -> Result<i64>;

    /// Upserts an article's (message-id, newsgroup) by message-id.
    async fn register_article(&self, msgid: &MessageId, newsgroup: &str) -> Result<()>;

    /// All registered (message-id, newsgroup) pairs.
    async fn get_all_articles(&self) -> Result<Vec<(MessageId, String)>>;

    /// All registered message-ids for one newsgroup, oldest first.
    async fn get_articles_in_group(&self, newsgroup: &str) -> Result<Vec<MessageId>>;

    /// Removes a single article's row (used by the expiration core).
    async fn remove_article(&self, msgid: &MessageId) -> Result<()>;
}

/// SQLite-backed [`Database`].
pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    /// Opens (creating if necessary) the database file named by
    /// `config.schema`.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(&config.schema)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        let db = Self { pool };
        db.create_tables().await?;
        Ok(db)
    }

    /// Wraps an already-open pool (used by tests against an in-memory DB).
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn create_tables(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS articles (
                message_id TEXT PRIMARY KEY,
                newsgroup TEXT NOT NULL,
                received_at INTEGER NOT NULL DEFAULT (unixepoch())
            )",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_articles_newsgroup ON articles(newsgroup)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn article_count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM articles")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>("n")?)
    }

    async fn register_article(&self, msgid: &MessageId, newsgroup: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO articles (message_id, newsgroup) VALUES (?1, ?2)
             ON CONFLICT(message_id) DO UPDATE SET newsgroup = excluded.newsgroup",
        )
        .bind(msgid.as_str())
        .bind(newsgroup)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_all_articles(&self) -> Result<Vec<(MessageId, String)>> {
        let rows = sqlx::query("SELECT message_id, newsgroup FROM articles ORDER BY received_at")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|row| {
                let raw: String = row.try_get("message_id")?;
                let newsgroup: String = row.try_get("newsgroup")?;
                Ok((MessageId::parse(raw)?, newsgroup))
            })
            .collect()
    }

    async fn get_articles_in_group(&self, newsgroup: &str) -> Result<Vec<MessageId>> {
        let rows = sqlx::query(
            "SELECT message_id FROM articles WHERE newsgroup = ?1 ORDER BY received_at",
        )
        .bind(newsgroup)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|row| {
                let raw: String = row.try_get("message_id")?;
                MessageId::parse(raw)
            })
            .collect()
    }

    async fn remove_article(&self, msgid: &MessageId) -> Result<()> {
        sqlx::query("DELETE FROM articles WHERE message_id = ?1")
            .bind(msgid.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
