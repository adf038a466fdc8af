//! Daemon-wide error types

use thiserror::Error;

/// Errors surfaced by the federation core
///
/// Policy for each variant is set out in spec.md §7: transport and protocol
/// errors are recoverable (the caller logs and drops/reconnects), store and
/// database failures leave the temp file in place for a later retry, and
/// configuration/listener failures are fatal at startup.
#[derive(Error, Debug)]
pub enum DaemonError {
    /// IO error during network or filesystem operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Connection timeout (idle read deadline exceeded)
    #[error("connection timeout")]
    Timeout,

    /// Invalid response from a peer
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// NNTP protocol error with response code
    #[error("NNTP error {code}: {message}")]
    Protocol {
        /// NNTP response code (e.g., 435, 438, 502)
        code: u16,
        /// Error message from the peer
        message: String,
    },

    /// A header or Message-ID failed RFC 5536 / spec validation
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// Article signature failed verification (`Store::VerifyMessage`)
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// Article not wanted (IHAVE/CHECK rejected, or already committed)
    #[error("article not wanted")]
    ArticleNotWanted,

    /// Transfer not possible; try again later (peer is temporarily unable to accept)
    #[error("transfer not possible: {0}")]
    TransferNotPossible(String),

    /// Transfer rejected; do not retry
    #[error("transfer rejected: {0}")]
    TransferRejected(String),

    /// Connection closed unexpectedly
    #[error("connection closed")]
    ConnectionClosed,

    /// Article store operation failed (temp file left in place)
    #[error("store error: {0}")]
    Store(String),

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Configuration file missing, malformed, or failed validation — fatal at startup
    #[error("configuration error: {0}")]
    Config(String),

    /// SOCKS4a proxy handshake failed
    #[error("proxy error: {0}")]
    Proxy(String),

    /// UTF-8 decoding error
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Result type alias using [`DaemonError`]
pub type Result<T> = std::result::Result<T, DaemonError>;
