//! Inbound session state machine: GREET -> IDLE -> (CAPABILITIES | MODE
//! READER | IHAVE)* -> QUIT -> CLOSED.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::article::parse_article;
use crate::message_id::MessageId;
use crate::response::codes;
use crate::session::SessionIo;
use crate::store::ArticleStore;
use crate::Result;

const GREETING: &str = "200 nntpchand ready\r\n";

/// Drives one inbound connection to completion. Accept-loop callers spawn
/// this per connection; a transport or protocol error simply closes the
/// session (never fatal to the daemon).
pub async fn drive(
    stream: TcpStream,
    store: Arc<dyn ArticleStore>,
    infeed_load_tx: mpsc::Sender<MessageId>,
    read_timeout: Duration,
) -> Result<()> {
    let mut io = SessionIo::new(stream, read_timeout);
    io.write_line(GREETING).await?;

    loop {
        let command_line = match io.read_command_line().await {
            Ok(line) => line,
            Err(e) => {
                debug!(error = %e, "inbound session closed");
                return Ok(());
            }
        };
        let mut parts = command_line.splitn(2, ' ');
        let verb = parts.next().unwrap_or("").to_ascii_uppercase();
        let arg = parts.next().unwrap_or("").trim();

        match verb.as_str() {
            "CAPABILITIES" => {
                io.write_line(&format!(
                    "{} Capability list:\r\n.\r\n",
                    codes::CAPABILITY_LIST
                ))
                .await?;
            }
            "MODE" if arg.eq_ignore_ascii_case("READER") => {
                io.write_line(&format!("{} Posting prohibited\r\n", codes::READY_NO_POSTING))
                    .await?;
            }
            "IHAVE" => {
                handle_ihave(&mut io, arg, &store, &infeed_load_tx).await?;
            }
            "QUIT" => {
                io.write_line(&format!("{} Bye\r\n", codes::CLOSING_CONNECTION))
                    .await?;
                return Ok(());
            }
            _ => {
                io.write_line(&format!(
                    "{} Command not recognized\r\n",
                    codes::COMMAND_NOT_RECOGNIZED
                ))
                .await?;
            }
        }
    }
}

async fn handle_ihave(
    io: &mut SessionIo,
    arg: &str,
    store: &Arc<dyn ArticleStore>,
    infeed_load_tx: &mpsc::Sender<MessageId>,
) -> Result<()> {
    let msgid = match MessageId::parse(arg) {
        Ok(id) => id,
        Err(_) => {
            io.write_line(&format!(
                "{} Command syntax error\r\n",
                codes::COMMAND_SYNTAX_ERROR
            ))
            .await?;
            return Ok(());
        }
    };

    if store.get_message(&msgid).await?.is_some() {
        io.write_line(&format!("{} Article not wanted\r\n", codes::ARTICLE_NOT_WANTED))
            .await?;
        return Ok(());
    }

    io.write_line(&format!(
        "{} Send article to be transferred\r\n",
        codes::SEND_ARTICLE_TRANSFER
    ))
    .await?;

    let wire = io.read_dotted_body().await?;
    let article = match parse_article(&wire) {
        Ok(a) if a.headers.message_id == msgid.as_str() => a,
        Ok(_) => {
            warn!(%msgid, "IHAVE article body's Message-ID does not match offer");
            io.write_line(&format!(
                "{} Transfer rejected; do not retry\r\n",
                codes::TRANSFER_REJECTED
            ))
            .await?;
            return Ok(());
        }
        Err(e) => {
            warn!(%msgid, error = %e, "malformed IHAVE article body");
            io.write_line(&format!(
                "{} Transfer rejected; do not retry\r\n",
                codes::TRANSFER_REJECTED
            ))
            .await?;
            return Ok(());
        }
    };

    if let Err(e) = store.write_temp(&msgid, &article).await {
        warn!(%msgid, error = %e, "failed to write temp article");
        io.write_line(&format!(
            "{} Transfer not possible; try again later\r\n",
            codes::TRANSFER_NOT_POSSIBLE
        ))
        .await?;
        return Ok(());
    }

    io.write_line(&format!(
        "{} Article transferred OK\r\n",
        codes::ARTICLE_TRANSFERRED
    ))
    .await?;

    if infeed_load_tx.send(msgid).await.is_err() {
        warn!("ingestion pipeline closed; article left in temp store for recovery");
    }
    Ok(())
}
