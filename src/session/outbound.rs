//! Outbound session state machine: CONNECT -> READY (streaming or IHAVE
//! mode) driven by the per-session sync queue.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::message_id::MessageId;
use crate::response::codes;
use crate::session::SessionIo;
use crate::store::ArticleStore;
use crate::{commands, DaemonError, Result};

const MAX_CHECK_RETRIES: u32 = 3;

/// Whether the peer accepted `MODE STREAM` or the session must fall back to
/// one-article-at-a-time IHAVE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransferMode {
    Streaming,
    Ihave,
}

/// Drives one outbound connection. `ready` is signalled once the initial
/// banner/MODE negotiation completes, replacing the source's fixed
/// 5-second pre-sync delay (§9) with an explicit readiness event the
/// supervisor's sync-on-start task can await.
pub async fn drive(
    stream: TcpStream,
    store: Arc<dyn ArticleStore>,
    mut sync_rx: mpsc::Receiver<MessageId>,
    sync_tx: mpsc::Sender<MessageId>,
    read_timeout: Duration,
    ready: Arc<Notify>,
) -> Result<()> {
    let mut io = SessionIo::new(stream, read_timeout);

    // CONNECT: banner, then negotiate MODE STREAM.
    let banner = io.read_response().await?;
    debug!(code = banner.code, "received banner");

    io.write_line(commands::mode_stream()).await?;
    let mode_response = io.read_response().await?;
    let mode = if mode_response.code == codes::STREAMING_OK {
        TransferMode::Streaming
    } else {
        TransferMode::Ihave
    };
    debug!(?mode, "negotiated transfer mode");
    // notify_one (not notify_waiters): stores a permit if sync-on-start
    // hasn't called notified() yet, so the signal is never lost to a race.
    ready.notify_one();

    let mut retries: std::collections::HashMap<MessageId, u32> = std::collections::HashMap::new();

    while let Some(msgid) = sync_rx.recv().await {
        let result = match mode {
            TransferMode::Streaming => {
                deliver_streaming(&mut io, &store, &msgid, &sync_tx, &mut retries).await
            }
            TransferMode::Ihave => deliver_ihave(&mut io, &store, &msgid).await,
        };
        if let Err(e) = result {
            warn!(%msgid, error = %e, "outbound transfer failed, closing session");
            return Err(e);
        }
    }
    Ok(())
}

async fn load_wire(store: &Arc<dyn ArticleStore>, msgid: &MessageId) -> Result<Option<Vec<u8>>> {
    store.open_article(msgid).await
}

async fn deliver_streaming(
    io: &mut SessionIo,
    store: &Arc<dyn ArticleStore>,
    msgid: &MessageId,
    sync_tx: &mpsc::Sender<MessageId>,
    retries: &mut std::collections::HashMap<MessageId, u32>,
) -> Result<()> {
    io.write_line(&commands::check(msgid.as_str())).await?;
    let response = io.read_response().await?;

    match response.code {
        codes::CHECK_SEND => {
            let Some(wire) = load_wire(store, msgid).await? else {
                return Ok(());
            };
            io.write_line(&commands::takethis(msgid.as_str(), &String::from_utf8_lossy(&wire)))
                .await?;
            io.write_line(".\r\n").await?;
            let result = io.read_response().await?;
            if result.code != codes::TAKETHIS_RECEIVED {
                debug!(%msgid, code = result.code, "peer rejected TAKETHIS");
            }
            retries.remove(msgid);
        }
        codes::CHECK_LATER => {
            let attempts = retries.entry(msgid.clone()).or_insert(0);
            *attempts += 1;
            if *attempts <= MAX_CHECK_RETRIES {
                let _ = sync_tx.try_send(msgid.clone());
            } else {
                retries.remove(msgid);
            }
        }
        codes::CHECK_NOT_WANTED => {
            retries.remove(msgid);
        }
        other => {
            return Err(DaemonError::Protocol {
                code: other,
                message: response.message,
            });
        }
    }
    Ok(())
}

async fn deliver_ihave(
    io: &mut SessionIo,
    store: &Arc<dyn ArticleStore>,
    msgid: &MessageId,
) -> Result<()> {
    io.write_line(&commands::ihave(msgid.as_str())).await?;
    let response = io.read_response().await?;

    match response.code {
        codes::SEND_ARTICLE_TRANSFER => {
            let Some(wire) = load_wire(store, msgid).await? else {
                return Ok(());
            };
            io.write_line(&String::from_utf8_lossy(&wire)).await?;
            io.write_line(".\r\n").await?;
            let result = io.read_response().await?;
            match result.code {
                codes::ARTICLE_TRANSFERRED => {}
                codes::TRANSFER_REJECTED | codes::TRANSFER_NOT_POSSIBLE => {
                    debug!(%msgid, code = result.code, "peer rejected IHAVE transfer");
                }
                other => {
                    return Err(DaemonError::Protocol {
                        code: other,
                        message: result.message,
                    });
                }
            }
        }
        codes::ARTICLE_NOT_WANTED | codes::TRANSFER_NOT_POSSIBLE => {}
        other => {
            return Err(DaemonError::Protocol {
                code: other,
                message: response.message,
            });
        }
    }
    Ok(())
}
