//! Inbound Acceptor: listens on the bind address, spawns an inbound Session
//! per accepted TCP connection.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::message_id::MessageId;
use crate::session::inbound;
use crate::store::ArticleStore;
use crate::Result;

/// Binds `addr` and accepts inbound connections until `shutdown` fires.
/// Accept errors are fatal (the listener itself is gone); per-connection
/// errors only end that connection.
pub async fn run(
    addr: &str,
    store: Arc<dyn ArticleStore>,
    infeed_load_tx: mpsc::Sender<MessageId>,
    read_timeout: Duration,
    shutdown: CancellationToken,
) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr, "inbound acceptor listening");

    loop {
        let accepted = tokio::select! {
            result = listener.accept() => result,
            _ = shutdown.cancelled() => {
                info!("inbound acceptor shutting down");
                return Ok(());
            }
        };

        let (stream, peer_addr) = accepted?;
        debug!(%peer_addr, "accepted inbound connection");

        let store = store.clone();
        let infeed_load_tx = infeed_load_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = inbound::drive(stream, store, infeed_load_tx, read_timeout).await {
                error!(%peer_addr, error = %e, "inbound session ended with error");
            }
        });
    }
}
