//! Top-level daemon wiring: Config in, every component running.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::article::ArticleBuilder;
use crate::config::Config;
use crate::db::{Database, SqliteDatabase};
use crate::expire::ExpirationCore;
use crate::feed_policy::FeedPolicy;
use crate::frontend::PollNewPosts;
use crate::ingest::{self, Pipeline};
use crate::registry::{self, RegistryHandle};
use crate::store::{ArticleStore, FilesystemStore};
use crate::supervisor;
use crate::Result;

/// A fully wired daemon, ready to [`Daemon::run`].
pub struct Daemon {
    config: Config,
    store: Arc<dyn ArticleStore>,
    db: Arc<dyn Database>,
    registry: RegistryHandle,
    frontend: Option<Arc<dyn PollNewPosts>>,
    shutdown: CancellationToken,
}

impl Daemon {
    /// Opens the store and database named in `config` and wires the feed
    /// registry, but does not yet start the acceptor, supervisors, or
    /// ingestion pipeline — that happens in [`Daemon::run`].
    pub async fn init(config: Config, frontend: Option<Arc<dyn PollNewPosts>>) -> Result<Self> {
        let store: Arc<dyn ArticleStore> =
            Arc::new(FilesystemStore::open(&config.store.path).await?);
        let db: Arc<dyn Database> = Arc::new(SqliteDatabase::connect(&config.database).await?);
        let registry = registry::spawn();

        Ok(Self {
            config,
            store,
            db,
            registry,
            frontend,
            shutdown: CancellationToken::new(),
        })
    }

    /// A token the caller can cancel to shut every supervisor and the
    /// acceptor down cleanly (§4.F's explicit cancellation).
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Runs until `shutdown_token()` is cancelled or the acceptor hits a
    /// fatal error.
    pub async fn run(self) -> Result<()> {
        if self.db.article_count().await? == 0 {
            self.post_welcome_article().await?;
        }

        let expire = Arc::new(ExpirationCore::new(
            self.db.clone(),
            self.store.clone(),
            self.config.store.expire_keep,
        ));
        tokio::spawn({
            let expire = expire.clone();
            async move { expire.mainloop().await }
        });

        let pipeline = Pipeline {
            store: self.store.clone(),
            db: self.db.clone(),
            expire,
            registry: self.registry.clone(),
            instance_name: self.config.daemon.instance_name.clone(),
            frontend: self.frontend.clone(),
        };
        let ingest_handles = ingest::spawn(pipeline);

        let read_timeout =
            std::time::Duration::from_secs(self.config.session.read_timeout_secs);

        for feed in &self.config.feeds {
            let policy = FeedPolicy::from_config(&feed.policy)?;
            let feed = feed.clone();
            let store = self.store.clone();
            let db = self.db.clone();
            let registry = self.registry.clone();
            let sync_on_start = self.config.daemon.sync_on_start;
            let shutdown = self.shutdown.clone();
            tokio::spawn(async move {
                supervisor::run(
                    feed,
                    policy,
                    store,
                    db,
                    registry,
                    sync_on_start,
                    read_timeout,
                    shutdown,
                )
                .await;
            });
        }

        info!(bind = self.config.daemon.bind, "starting inbound acceptor");
        crate::acceptor::run(
            &self.config.daemon.bind,
            self.store.clone(),
            ingest_handles.infeed_load,
            read_timeout,
            self.shutdown.clone(),
        )
        .await
    }

    async fn post_welcome_article(&self) -> Result<()> {
        let instance = &self.config.daemon.instance_name;
        let article = ArticleBuilder::new()
            .from(format!("system@{instance}"))
            .subject("Welcome to nntpchan")
            .newsgroups(vec!["overchan.test"])
            .path(instance.clone())
            .body("welcome to nntpchan, this post was inserted on startup automatically")
            .build()?;

        let msgid = crate::message_id::MessageId::parse(&article.headers.message_id)?;
        self.store.write_temp(&msgid, &article).await?;
        let article = self.store.verify_message(article).await?;
        self.db
            .register_article(&msgid, article.newsgroup().unwrap_or("overchan.test"))
            .await?;
        self.store.store_post(&article).await?;
        info!(%msgid, "posted welcome article");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    #[tokio::test]
    async fn test_welcome_article_posted_once() {
        let dir = tempfile::tempdir().unwrap();
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let db: Arc<dyn Database> = Arc::new(SqliteDatabase::from_pool(pool));
        db.create_tables().await.unwrap();
        let store: Arc<dyn ArticleStore> =
            Arc::new(FilesystemStore::open(dir.path()).await.unwrap());

        let daemon = Daemon {
            config: minimal_config(),
            store,
            db: db.clone(),
            registry: registry::spawn(),
            frontend: None,
            shutdown: CancellationToken::new(),
        };

        assert_eq!(db.article_count().await.unwrap(), 0);
        daemon.post_welcome_article().await.unwrap();
        assert_eq!(db.article_count().await.unwrap(), 1);
        let all = db.get_all_articles().await.unwrap();
        assert_eq!(all[0].1, "overchan.test");
    }

    fn minimal_config() -> Config {
        toml::from_str(
            r#"
                [daemon]
                bind = "127.0.0.1:0"
                instance_name = "test.example.com"

                [database]
                schema = ":memory:"

                [store]
                path = "/tmp/nntpchand-test"
            "#,
        )
        .unwrap()
    }
}
