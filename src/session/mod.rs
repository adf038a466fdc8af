//! NNTP session state machines: one live TCP connection, inbound or
//! outbound.
//!
//! Read/write primitives here mirror the teacher's `client::io` module
//! (`SINGLE_LINE_TIMEOUT`/`MULTILINE_TIMEOUT`-style per-read deadlines over a
//! `BufReader`-wrapped stream), generalised to drive both directions of a
//! federation session rather than a single pull-reading client.

pub mod inbound;
pub mod outbound;

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::trace;

use crate::commands;
use crate::response::NntpResponse;
use crate::{DaemonError, Result};

/// Strip NNTP dot-stuffing from a line (leading ".." becomes ".").
pub(crate) fn strip_byte_stuffing(line: &str) -> &str {
    if line.starts_with("..") {
        &line[1..]
    } else {
        line
    }
}

/// Wraps a TCP connection with the line-oriented read/write helpers every
/// session state machine needs, plus the idle read deadline from
/// `session.read_timeout_secs` (§4.E).
pub struct SessionIo {
    stream: BufReader<TcpStream>,
    read_timeout: Duration,
}

impl SessionIo {
    pub fn new(stream: TcpStream, read_timeout: Duration) -> Self {
        Self {
            stream: BufReader::new(stream),
            read_timeout,
        }
    }

    pub async fn write_line(&mut self, line: &str) -> Result<()> {
        trace!(line = line.trim_end(), "sending");
        self.stream.get_mut().write_all(line.as_bytes()).await?;
        self.stream.get_mut().flush().await?;
        Ok(())
    }

    async fn read_raw_line(&mut self) -> Result<String> {
        let read = async {
            let mut bytes = Vec::with_capacity(512);
            let n = self.stream.read_until(b'\n', &mut bytes).await?;
            if n == 0 {
                return Err(DaemonError::ConnectionClosed);
            }
            Ok(String::from_utf8_lossy(&bytes).trim_end().to_string())
        };
        timeout(self.read_timeout, read)
            .await
            .map_err(|_| DaemonError::Timeout)?
    }

    /// Reads a single NNTP status line (for the outbound/client role).
    pub async fn read_response(&mut self) -> Result<NntpResponse> {
        let line = self.read_raw_line().await?;
        commands::parse_single_response(&line)
    }

    /// Reads a single raw command line (for the inbound/server role), e.g.
    /// `"IHAVE <id@host>"`.
    pub async fn read_command_line(&mut self) -> Result<String> {
        self.read_raw_line().await
    }

    /// Reads a dot-terminated multi-line body (e.g. the article text that
    /// follows a `335`/`340` continuation), undoing dot-stuffing.
    pub async fn read_dotted_body(&mut self) -> Result<String> {
        let mut body = String::new();
        loop {
            let line = self.read_raw_line().await?;
            if line == "." {
                break;
            }
            body.push_str(strip_byte_stuffing(&line));
            body.push_str("\r\n");
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_byte_stuffing_unstuffs_leading_dot() {
        assert_eq!(strip_byte_stuffing("..foo"), ".foo");
        assert_eq!(strip_byte_stuffing("foo"), "foo");
        assert_eq!(strip_byte_stuffing("."), ".");
    }
}
