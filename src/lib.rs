//! nntpchand: a federated NNTP article distribution daemon.
//!
//! Accepts inbound feeds (IHAVE / streaming CHECK-TAKETHIS), maintains
//! outbound feeds to configured peers, stores articles content-addressed by
//! Message-ID, and expires old articles per newsgroup.

/// Top-level daemon wiring.
pub mod daemon;

/// RFC 5536 Article Format
pub mod article;
/// Inbound Acceptor: accepts peer connections and spawns inbound sessions.
pub mod acceptor;
/// NNTP command builders and response parsers
pub mod commands;
mod config;
/// Database: article/newsgroup index.
pub mod db;
/// RFC 2047 Encoded Words support for international headers
pub mod encoded_words;
mod error;
/// Expiration Core: per-newsgroup retention enforcement.
pub mod expire;
/// Feed policy: newsgroup include/exclude matching for outbound feeds.
pub mod feed_policy;
/// Front-end Poll: bridges an external posting front-end into ingestion.
pub mod frontend;
/// Ingestion Pipeline: the central article processing multiplexer.
pub mod ingest;
/// Message-ID parsing, hashing, and generation.
pub mod message_id;
/// SOCKS4a proxy dialer for outbound feeds.
pub mod proxy;
/// Feed registry: tracks live outbound sessions for fan-out.
pub mod registry;
mod response;
/// NNTP session state machines (inbound and outbound).
pub mod session;
/// Article Store: content-addressed filesystem storage.
pub mod store;
/// Outbound Feed Supervisor: persistent connection management per feed.
pub mod supervisor;
/// RFC 5536 Article validation utilities
pub mod validation;

pub use article::{parse_article, parse_headers, Article, ArticleBuilder, ControlMessage, Headers};
pub use config::{Config, DaemonConfig, DatabaseConfig, FeedConfig, StoreConfig};
pub use daemon::Daemon;
pub use error::{DaemonError, Result};
pub use message_id::MessageId;
pub use response::{codes, NntpResponse};
pub use validation::{parse_date, validate_date, validate_newsgroup_name, ValidationConfig};
