//! Background pruning of old articles per newsgroup.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::db::Database;
use crate::store::ArticleStore;
use crate::Result;

const MAINLOOP_INTERVAL: Duration = Duration::from_secs(60);

/// Trims each newsgroup down to its most recently registered `keep`
/// articles, out of band from ingestion.
pub struct ExpirationCore {
    db: Arc<dyn Database>,
    store: Arc<dyn ArticleStore>,
    keep: u32,
}

impl ExpirationCore {
    pub fn new(db: Arc<dyn Database>, store: Arc<dyn ArticleStore>, keep: u32) -> Self {
        Self { db, store, keep }
    }

    /// Trims `newsgroup` to its most recent `keep` articles. Concurrent
    /// ingestion of the same group is tolerated: articles are selected by
    /// insertion order, so an article registered after this call started
    /// is never the one removed.
    pub async fn expire_group(&self, newsgroup: &str) -> Result<()> {
        let ids = self.db.get_articles_in_group(newsgroup).await?;
        if ids.len() <= self.keep as usize {
            return Ok(());
        }
        let overflow = ids.len() - self.keep as usize;
        for msgid in &ids[..overflow] {
            self.store.remove(msgid).await?;
            self.db.remove_article(msgid).await?;
            debug!(newsgroup, %msgid, "expired article");
        }
        Ok(())
    }

    /// Long-running loop: periodically walks every known newsgroup and
    /// expires it. Runs independently of the ingestion pipeline.
    pub async fn mainloop(&self) {
        loop {
            tokio::time::sleep(MAINLOOP_INTERVAL).await;
            let groups = match self.db.get_all_articles().await {
                Ok(articles) => {
                    let mut groups: Vec<String> =
                        articles.into_iter().map(|(_, group)| group).collect();
                    groups.sort_unstable();
                    groups.dedup();
                    groups
                }
                Err(e) => {
                    warn!(error = %e, "expiration mainloop: failed to list articles");
                    continue;
                }
            };
            for group in groups {
                if let Err(e) = self.expire_group(&group).await {
                    warn!(newsgroup = %group, error = %e, "expiration failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteDatabase;
    use crate::message_id::MessageId;
    use crate::store::FilesystemStore;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup(keep: u32) -> (ExpirationCore, Arc<dyn Database>, Arc<dyn ArticleStore>) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let db: Arc<dyn Database> = Arc::new(SqliteDatabase::from_pool(pool));
        db.create_tables().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        // Leak the tempdir path so the store outlives this function; tests
        // only need the directory, not cleanup timing.
        let store: Arc<dyn ArticleStore> =
            Arc::new(FilesystemStore::open(dir.keep()).await.unwrap());
        let core = ExpirationCore::new(db.clone(), store.clone(), keep);
        (core, db, store)
    }

    #[tokio::test]
    async fn test_expire_group_keeps_most_recent() {
        let (core, db, _store) = setup(2).await;
        for i in 0..5 {
            let msgid = MessageId::parse(format!("<a{i}$1@host.example>")).unwrap();
            db.register_article(&msgid, "overchan.test").await.unwrap();
        }
        core.expire_group("overchan.test").await.unwrap();
        let remaining = db.get_articles_in_group("overchan.test").await.unwrap();
        assert_eq!(remaining.len(), 2);
        assert_eq!(remaining[0].as_str(), "<a3$1@host.example>");
        assert_eq!(remaining[1].as_str(), "<a4$1@host.example>");
    }

    #[tokio::test]
    async fn test_expire_group_under_limit_is_noop() {
        let (core, db, _store) = setup(10).await;
        let msgid = MessageId::parse("<a0$1@host.example>").unwrap();
        db.register_article(&msgid, "overchan.test").await.unwrap();
        core.expire_group("overchan.test").await.unwrap();
        assert_eq!(
            db.get_articles_in_group("overchan.test").await.unwrap().len(),
            1
        );
    }
}
