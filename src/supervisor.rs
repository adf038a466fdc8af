//! Outbound Feed Supervisor: maintains a persistent connection to one peer,
//! with reconnect and optional SOCKS4a proxy.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{FeedConfig, ProxyType};
use crate::db::Database;
use crate::feed_policy::FeedPolicy;
use crate::proxy::connect_via_socks4a;
use crate::registry::{FeedHandle, RegistryHandle};
use crate::session::outbound;
use crate::store::ArticleStore;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

const SYNC_QUEUE_CAPACITY: usize = 512;
const RECONNECT_MIN: Duration = Duration::from_secs(1);
const RECONNECT_MAX: Duration = Duration::from_secs(5);

fn reconnect_backoff() -> Duration {
    rand::thread_rng().gen_range(RECONNECT_MIN..=RECONNECT_MAX)
}

async fn dial(feed: &FeedConfig) -> crate::Result<TcpStream> {
    let (host, port) = feed
        .addr
        .rsplit_once(':')
        .ok_or_else(|| crate::DaemonError::Config(format!("invalid feed addr {}", feed.addr)))?;
    let port: u16 = port
        .parse()
        .map_err(|_| crate::DaemonError::Config(format!("invalid feed port in {}", feed.addr)))?;

    match feed.proxy_type {
        ProxyType::None => Ok(TcpStream::connect(&feed.addr).await?),
        ProxyType::Socks4a => {
            let proxy_addr = feed.proxy_addr.as_deref().ok_or_else(|| {
                crate::DaemonError::Config(format!(
                    "feed {}: socks4a proxy_type requires proxy_addr",
                    feed.name
                ))
            })?;
            connect_via_socks4a(proxy_addr, host, port).await
        }
    }
}

/// Runs the supervisor loop for one `FeedConfig` until `shutdown` is
/// cancelled. At most one live session exists at any time.
pub async fn run(
    feed: FeedConfig,
    policy: FeedPolicy,
    store: Arc<dyn ArticleStore>,
    db: Arc<dyn Database>,
    registry: RegistryHandle,
    daemon_sync_on_start: bool,
    read_timeout: Duration,
    shutdown: CancellationToken,
) {
    let sync_on_start = feed.sync_on_start.unwrap_or(daemon_sync_on_start);

    loop {
        if shutdown.is_cancelled() {
            return;
        }

        let stream = tokio::select! {
            result = dial(&feed) => match result {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(feed = feed.name, error = %e, "dial failed, retrying");
                    tokio::select! {
                        _ = tokio::time::sleep(reconnect_backoff()) => {}
                        _ = shutdown.cancelled() => return,
                    }
                    continue;
                }
            },
            _ = shutdown.cancelled() => return,
        };

        info!(feed = feed.name, "connected");
        let session_id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
        let (sync_tx, sync_rx) = mpsc::channel(SYNC_QUEUE_CAPACITY);
        registry
            .register(FeedHandle {
                session_id,
                policy: policy.clone(),
                sync_tx: sync_tx.clone(),
            })
            .await;

        let ready = Arc::new(Notify::new());
        if sync_on_start {
            spawn_sync_on_start(db.clone(), policy.clone(), sync_tx.clone(), ready.clone());
        }

        let drive = outbound::drive(stream, store.clone(), sync_rx, sync_tx, read_timeout, ready);

        tokio::select! {
            result = drive => {
                if let Err(e) = result {
                    debug!(feed = feed.name, error = %e, "outbound session closed");
                }
            }
            _ = shutdown.cancelled() => {
                registry.unregister(session_id).await;
                return;
            }
        }

        registry.unregister(session_id).await;
    }
}

/// Background task: walks every known article and, for each one matching
/// `policy`, pushes its id onto the session's sync queue. Waits for the
/// session's readiness signal instead of the source's fixed 5-second delay
/// (§9 open question).
fn spawn_sync_on_start(
    db: Arc<dyn Database>,
    policy: FeedPolicy,
    sync_tx: mpsc::Sender<crate::message_id::MessageId>,
    ready: Arc<Notify>,
) {
    tokio::spawn(async move {
        ready.notified().await;
        let articles = match db.get_all_articles().await {
            Ok(articles) => articles,
            Err(e) => {
                warn!(error = %e, "sync-on-start: failed to list articles");
                return;
            }
        };
        let mut pushed = 0usize;
        for (msgid, newsgroup) in articles {
            if !policy.allows_newsgroup(&newsgroup) {
                continue;
            }
            if sync_tx.send(msgid).await.is_err() {
                break;
            }
            pushed += 1;
        }
        debug!(pushed, "sync-on-start walk complete");
    });
}
