//! Ingestion Pipeline: the central multiplexer. Drains `infeed`,
//! `infeed_load`, and `send_all_feeds`, all behind one consumer so
//! processing is serialised per §4.H.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, instrument, warn};

use crate::article::Article;
use crate::db::Database;
use crate::expire::ExpirationCore;
use crate::frontend::PollNewPosts;
use crate::message_id::MessageId;
use crate::registry::RegistryHandle;
use crate::store::ArticleStore;

pub const INFEED_CAPACITY: usize = 64;
pub const INFEED_LOAD_CAPACITY: usize = 64;
pub const SEND_ALL_FEEDS_CAPACITY: usize = 64;

/// Senders for the three channels the pipeline drains. Clonable so every
/// inbound Session and the front-end poll can push into it.
#[derive(Clone)]
pub struct IngestHandles {
    pub infeed: mpsc::Sender<Article>,
    pub infeed_load: mpsc::Sender<MessageId>,
    pub send_all_feeds: mpsc::Sender<MessageId>,
}

struct IngestReceivers {
    infeed: mpsc::Receiver<Article>,
    infeed_load: mpsc::Receiver<MessageId>,
    send_all_feeds: mpsc::Receiver<MessageId>,
}

/// Collaborators the pipeline needs to process each article.
pub struct Pipeline {
    pub store: Arc<dyn ArticleStore>,
    pub db: Arc<dyn Database>,
    pub expire: Arc<ExpirationCore>,
    pub registry: RegistryHandle,
    pub instance_name: String,
    pub frontend: Option<Arc<dyn PollNewPosts>>,
}

/// Builds the three channels and returns the sender handles alongside the
/// task that drains them. `pipeline` is moved into the returned future.
pub fn spawn(pipeline: Pipeline) -> IngestHandles {
    let (infeed_tx, infeed_rx) = mpsc::channel(INFEED_CAPACITY);
    let (infeed_load_tx, infeed_load_rx) = mpsc::channel(INFEED_LOAD_CAPACITY);
    let (send_all_feeds_tx, send_all_feeds_rx) = mpsc::channel(SEND_ALL_FEEDS_CAPACITY);

    let handles = IngestHandles {
        infeed: infeed_tx.clone(),
        infeed_load: infeed_load_tx,
        send_all_feeds: send_all_feeds_tx.clone(),
    };
    let receivers = IngestReceivers {
        infeed: infeed_rx,
        infeed_load: infeed_load_rx,
        send_all_feeds: send_all_feeds_rx,
    };

    tokio::spawn(run(pipeline, receivers, infeed_tx, send_all_feeds_tx));
    handles
}

async fn run(
    pipeline: Pipeline,
    mut receivers: IngestReceivers,
    infeed_tx: mpsc::Sender<Article>,
    send_all_feeds_tx: mpsc::Sender<MessageId>,
) {
    loop {
        tokio::select! {
            Some(article) = receivers.infeed.recv() => {
                process_article(&pipeline, article, &send_all_feeds_tx).await;
            }
            Some(msgid) = receivers.infeed_load.recv() => {
                load_and_forward(&pipeline.store, &msgid, &infeed_tx).await;
            }
            Some(msgid) = receivers.send_all_feeds.recv() => {
                fan_out(&pipeline, msgid).await;
            }
            else => {
                debug!("ingestion pipeline: all channels closed, exiting");
                return;
            }
        }
    }
}

async fn load_and_forward(
    store: &Arc<dyn ArticleStore>,
    msgid: &MessageId,
    infeed_tx: &mpsc::Sender<Article>,
) {
    match store.read_temp_message(msgid).await {
        Ok(Some(article)) => {
            if infeed_tx.send(article).await.is_err() {
                error!(%msgid, "infeed closed; dropping loaded article");
            }
        }
        Ok(None) => {
            warn!(%msgid, "infeed_load: no temp file present, dropping");
        }
        Err(e) => {
            error!(%msgid, error = %e, "infeed_load: failed to read temp file");
        }
    }
}

#[instrument(skip(pipeline, article, send_all_feeds_tx), fields(msgid = %article.message_id()))]
async fn process_article(
    pipeline: &Pipeline,
    mut article: Article,
    send_all_feeds_tx: &mpsc::Sender<MessageId>,
) {
    article.append_path(&pipeline.instance_name);

    let article = match pipeline.store.verify_message(article).await {
        Ok(a) => a,
        Err(e) => {
            error!(error = %e, "invalid signature, dropping article");
            return;
        }
    };

    let msgid = match MessageId::parse(&article.headers.message_id) {
        Ok(id) => id,
        Err(e) => {
            error!(error = %e, "invalid message-id after verification, dropping");
            return;
        }
    };
    let Some(newsgroup) = article.newsgroup().map(str::to_string) else {
        error!(%msgid, "article has no newsgroup, dropping");
        return;
    };

    if let Err(e) = pipeline.db.register_article(&msgid, &newsgroup).await {
        error!(%msgid, error = %e, "database registration failed, dropping");
        return;
    }

    if let Err(e) = pipeline.store.store_post(&article).await {
        error!(%msgid, error = %e, "store commit failed, temp file retained");
        return;
    }

    if let Err(mpsc::error::TrySendError::Full(_)) = send_all_feeds_tx.try_send(msgid.clone()) {
        warn!(%msgid, "send_all_feeds queue full, dropping fan-out trigger");
    }

    if let Err(e) = pipeline.expire.expire_group(&newsgroup).await {
        warn!(newsgroup, error = %e, "expiration failed");
    }

    if let Some(frontend) = &pipeline.frontend {
        frontend.notify_committed(&article).await;
    }
}

async fn fan_out(pipeline: &Pipeline, msgid: MessageId) {
    let article = match pipeline.store.get_message(&msgid).await {
        Ok(Some(a)) => a,
        Ok(None) => {
            warn!(%msgid, "send_all_feeds: article missing from store, skipping fan-out");
            return;
        }
        Err(e) => {
            error!(%msgid, error = %e, "send_all_feeds: failed to load article");
            return;
        }
    };
    let Some(newsgroup) = article.newsgroup().map(str::to_string) else {
        return;
    };
    pipeline.registry.fan_out(msgid, newsgroup).await;
}
