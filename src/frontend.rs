//! Front-end Poll: bridges the external front-end into the ingestion
//! pipeline and notifies it of newly committed articles.
//!
//! Modelled as two distinct traits rather than the source's single shared
//! channel (§9 design note): `PollNewPosts` is how the front-end feeds new
//! posts in, `NotifyCommitted` is how the pipeline tells it what landed.

use async_trait::async_trait;

use crate::article::Article;
use crate::ingest::IngestHandles;

/// Implemented by the front-end collaborator; the pipeline calls this after
/// every successful commit. Best-effort: a slow or absent front-end must
/// never block ingestion.
#[async_trait]
pub trait PollNewPosts: Send + Sync {
    async fn notify_committed(&self, article: &Article);
}

/// Drains a front-end's outbound stream of freshly authored posts into
/// `infeed`. Runs as its own task; exits when the front-end's channel
/// closes.
pub async fn drain_new_posts(
    mut new_posts: tokio::sync::mpsc::Receiver<Article>,
    ingest: IngestHandles,
) {
    while let Some(article) = new_posts.recv().await {
        if ingest.infeed.send(article).await.is_err() {
            tracing::warn!("infeed closed; front-end post dropped");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article::ArticleBuilder;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_drain_forwards_posts_to_infeed() {
        let (new_posts_tx, new_posts_rx) = mpsc::channel(4);
        let (infeed_tx, mut infeed_rx) = mpsc::channel(4);
        let (infeed_load_tx, _infeed_load_rx) = mpsc::channel(4);
        let (send_all_feeds_tx, _send_all_feeds_rx) = mpsc::channel(4);
        let handles = IngestHandles {
            infeed: infeed_tx,
            infeed_load: infeed_load_tx,
            send_all_feeds: send_all_feeds_tx,
        };

        tokio::spawn(drain_new_posts(new_posts_rx, handles));

        let article = ArticleBuilder::new()
            .from("user@example.com")
            .subject("hi")
            .newsgroups(vec!["overchan.test"])
            .body("body")
            .build()
            .unwrap();
        new_posts_tx.send(article).await.unwrap();
        let received = infeed_rx.recv().await.unwrap();
        assert_eq!(received.headers.subject, "hi");
    }
}
