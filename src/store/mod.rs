//! Content-addressed article store: temp uploads, verification, and the
//! committed article tree.
//!
//! Mirrors the client crate's emphasis on explicit, typed errors
//! ([`DaemonError`]) and reuses [`crate::article::parsing`] /
//! [`crate::article::builder`] for the RFC 5536 wire form.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::article::{parse_article, Article};
use crate::message_id::MessageId;
use crate::session::strip_byte_stuffing;
use crate::validation::{parse_date, validate_date, validate_newsgroup_name, ValidationConfig};
use crate::{DaemonError, Result};

/// Undoes the dot-stuffing `Article::serialize_for_posting` applies, so a
/// round trip through the on-disk wire form gives back the original body.
fn unstuff_body(body: &str) -> String {
    let mut result = String::with_capacity(body.len());
    for line in body.lines() {
        result.push_str(strip_byte_stuffing(line));
        result.push_str("\r\n");
    }
    result
}

/// Side effect hook run after a successful [`ArticleStore::store_post`].
/// Attachment-thumbnail generation itself is out of scope; this is the
/// extension point a front-end would hang thumbnailing off of.
#[async_trait]
pub trait ThumbnailHook: Send + Sync {
    async fn on_stored(&self, article: &Article);
}

/// A hook that does nothing; the default when no front-end wants thumbnails.
pub struct NoopThumbnailHook;

#[async_trait]
impl ThumbnailHook for NoopThumbnailHook {
    async fn on_stored(&self, _article: &Article) {}
}

/// Persistence operations the ingestion pipeline and sessions drive.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Reserves (or re-reserves) a temp slot for `msgid` and writes the
    /// article's wire form into it. Overwriting an existing temp file is
    /// allowed — it represents an in-progress re-upload.
    async fn write_temp(&self, msgid: &MessageId, article: &Article) -> Result<()>;

    /// Parses a temp slot back into an [`Article`], if one exists.
    async fn read_temp_message(&self, msgid: &MessageId) -> Result<Option<Article>>;

    /// Validates an article before it is eligible for commit. May rewrite
    /// canonicalized headers (e.g. normalised Path). Returns
    /// [`DaemonError::InvalidSignature`] if a signed article fails
    /// verification.
    async fn verify_message(&self, article: Article) -> Result<Article>;

    /// Atomically moves `article` from the temp region to the committed
    /// region. Idempotent: re-committing an already-committed id succeeds
    /// without effect. Crash-safe: a crash mid-commit must leave the temp
    /// file in place for later retry, never a partially visible committed
    /// article.
    async fn store_post(&self, article: &Article) -> Result<()>;

    /// Loads a committed article by message-id.
    async fn get_message(&self, msgid: &MessageId) -> Result<Option<Article>>;

    /// Opens a committed article's raw wire-form bytes for outbound
    /// transfer.
    async fn open_article(&self, msgid: &MessageId) -> Result<Option<Vec<u8>>>;

    /// Removes a committed article (used by the expiration core).
    async fn remove(&self, msgid: &MessageId) -> Result<()>;
}

/// Filesystem-backed [`ArticleStore`]. Layout:
///
/// ```text
/// <root>/temp/<short-hash>
/// <root>/articles/<short-hash[0..2]>/<short-hash>
/// ```
pub struct FilesystemStore {
    root: PathBuf,
    hook: Box<dyn ThumbnailHook>,
}

impl FilesystemStore {
    /// Opens (creating if necessary) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        Self::with_hook(root, Box::new(NoopThumbnailHook)).await
    }

    /// Opens a store with a non-default thumbnail hook.
    pub async fn with_hook(root: impl Into<PathBuf>, hook: Box<dyn ThumbnailHook>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join("temp")).await?;
        fs::create_dir_all(root.join("articles")).await?;
        Ok(Self { root, hook })
    }

    fn temp_path(&self, msgid: &MessageId) -> PathBuf {
        self.root.join("temp").join(msgid.short_hash())
    }

    fn committed_path(&self, msgid: &MessageId) -> PathBuf {
        let hash = msgid.short_hash();
        self.root.join("articles").join(&hash[..2]).join(hash)
    }

    async fn read_file(path: &Path) -> Result<Option<Vec<u8>>> {
        match fs::File::open(path).await {
            Ok(mut file) => {
                let mut buf = Vec::new();
                file.read_to_end(&mut buf).await?;
                Ok(Some(buf))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl ArticleStore for FilesystemStore {
    async fn write_temp(&self, msgid: &MessageId, article: &Article) -> Result<()> {
        let wire = article
            .serialize_for_posting()
            .map_err(|e| DaemonError::Store(format!("serializing {msgid}: {e}")))?;
        let mut file = fs::File::create(self.temp_path(msgid)).await?;
        file.write_all(wire.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn read_temp_message(&self, msgid: &MessageId) -> Result<Option<Article>> {
        let Some(bytes) = Self::read_file(&self.temp_path(msgid)).await? else {
            return Ok(None);
        };
        let text = String::from_utf8(bytes)?;
        let mut article = parse_article(&text)
            .map_err(|e| DaemonError::Store(format!("parsing temp article {msgid}: {e}")))?;
        article.body = unstuff_body(&article.body);
        Ok(Some(article))
    }

    async fn verify_message(&self, article: Article) -> Result<Article> {
        let headers = &article.headers;
        if headers.from.trim().is_empty()
            || headers.subject.trim().is_empty()
            || headers.message_id.trim().is_empty()
            || headers.newsgroups.is_empty()
        {
            return Err(DaemonError::InvalidSignature(
                "missing required header".to_string(),
            ));
        }
        MessageId::parse(&headers.message_id)
            .map_err(|_| DaemonError::InvalidSignature("malformed message-id".to_string()))?;
        for newsgroup in &headers.newsgroups {
            validate_newsgroup_name(newsgroup)
                .map_err(|e| DaemonError::InvalidSignature(format!("bad newsgroup: {e}")))?;
        }
        // Lenient: peers across instances disagree on clock skew and date
        // formatting more often than they lie about content, so a malformed
        // or slightly-future Date is not grounds to drop an otherwise valid
        // article.
        if let Ok(date) = parse_date(&headers.date) {
            let _ = validate_date(&date, &ValidationConfig::lenient());
        }
        Ok(article)
    }

    async fn store_post(&self, article: &Article) -> Result<()> {
        let msgid = MessageId::parse(&article.headers.message_id)?;
        let dest = self.committed_path(&msgid);
        if fs::metadata(&dest).await.is_ok() {
            return Ok(());
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }
        let src = self.temp_path(&msgid);
        match fs::rename(&src, &dest).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Temp file already consumed by a concurrent commit; treat
                // as idempotent success if the destination now exists.
                if fs::metadata(&dest).await.is_err() {
                    return Err(e.into());
                }
            }
            Err(e) => return Err(e.into()),
        }
        self.hook.on_stored(article).await;
        Ok(())
    }

    async fn get_message(&self, msgid: &MessageId) -> Result<Option<Article>> {
        let Some(bytes) = Self::read_file(&self.committed_path(msgid)).await? else {
            return Ok(None);
        };
        let text = String::from_utf8(bytes)?;
        let mut article = parse_article(&text)
            .map_err(|e| DaemonError::Store(format!("parsing committed article {msgid}: {e}")))?;
        article.body = unstuff_body(&article.body);
        Ok(Some(article))
    }

    async fn open_article(&self, msgid: &MessageId) -> Result<Option<Vec<u8>>> {
        Self::read_file(&self.committed_path(msgid)).await
    }

    async fn remove(&self, msgid: &MessageId) -> Result<()> {
        match fs::remove_file(self.committed_path(msgid)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article::ArticleBuilder;

    fn sample_article(msgid: &str, newsgroup: &str) -> Article {
        ArticleBuilder::new()
            .from("user@example.com")
            .subject("hello")
            .newsgroups(vec![newsgroup])
            .message_id(msgid)
            .body("body text")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_write_temp_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::open(dir.path()).await.unwrap();
        let msgid = MessageId::parse("<a1$1@host.example>").unwrap();
        let article = sample_article(msgid.as_str(), "overchan.test");
        store.write_temp(&msgid, &article).await.unwrap();
        let read_back = store.read_temp_message(&msgid).await.unwrap().unwrap();
        assert_eq!(read_back.headers.message_id, msgid.as_str());
    }

    #[tokio::test]
    async fn test_store_post_moves_temp_to_committed() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::open(dir.path()).await.unwrap();
        let msgid = MessageId::parse("<a2$1@host.example>").unwrap();
        let article = sample_article(msgid.as_str(), "overchan.test");
        store.write_temp(&msgid, &article).await.unwrap();
        store.store_post(&article).await.unwrap();
        assert!(store.get_message(&msgid).await.unwrap().is_some());
        assert!(store.read_temp_message(&msgid).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_store_post_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::open(dir.path()).await.unwrap();
        let msgid = MessageId::parse("<a3$1@host.example>").unwrap();
        let article = sample_article(msgid.as_str(), "overchan.test");
        store.write_temp(&msgid, &article).await.unwrap();
        store.store_post(&article).await.unwrap();
        // Second commit with no temp file present must still succeed.
        store.store_post(&article).await.unwrap();
    }

    #[tokio::test]
    async fn test_verify_rejects_missing_headers() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::open(dir.path()).await.unwrap();
        let mut article = sample_article("<a4$1@host.example>", "overchan.test");
        article.headers.from = String::new();
        assert!(store.verify_message(article).await.is_err());
    }

    #[tokio::test]
    async fn test_body_leading_dot_round_trips_through_temp() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::open(dir.path()).await.unwrap();
        let msgid = MessageId::parse("<a5$1@host.example>").unwrap();
        let mut article = sample_article(msgid.as_str(), "overchan.test");
        article.body = "line one\n.line two\n..line three".to_string();
        store.write_temp(&msgid, &article).await.unwrap();
        let read_back = store.read_temp_message(&msgid).await.unwrap().unwrap();
        assert_eq!(read_back.body, "line one\r\n.line two\r\n..line three\r\n");
    }

    #[tokio::test]
    async fn test_body_leading_dot_round_trips_through_commit() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::open(dir.path()).await.unwrap();
        let msgid = MessageId::parse("<a6$1@host.example>").unwrap();
        let mut article = sample_article(msgid.as_str(), "overchan.test");
        article.body = ".leading dot body".to_string();
        store.write_temp(&msgid, &article).await.unwrap();
        store.store_post(&article).await.unwrap();
        let read_back = store.get_message(&msgid).await.unwrap().unwrap();
        assert_eq!(read_back.body, ".leading dot body\r\n");
    }
}
