//! Daemon configuration
//!
//! Loads `nntpchand.toml` into [`Config`] and validates it. Per spec, a
//! missing file, malformed TOML, or failed validation is fatal at startup.

use std::path::Path;

use serde::Deserialize;

use crate::{DaemonError, Result};

fn default_sync_on_start() -> bool {
    false
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_expire_keep() -> u32 {
    100
}

fn default_read_timeout_secs() -> u64 {
    300
}

fn default_frontend_enable() -> bool {
    false
}

/// Top-level daemon configuration, parsed from a TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub daemon: DaemonConfig,
    pub database: DatabaseConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub frontend: FrontendConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    /// Listener address, e.g. "0.0.0.0:1119"
    pub bind: String,
    /// Appended to Path and used in generated MessageIDs
    pub instance_name: String,
    /// Full re-sync to each peer on connect, unless overridden per-feed
    #[serde(default = "default_sync_on_start")]
    pub sync_on_start: bool,
    /// `tracing` EnvFilter default directive ("debug" enables verbose logging)
    #[serde(default = "default_log_level")]
    pub log: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(rename = "type", default = "default_db_type")]
    pub kind: String,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    /// For sqlite, the path to the database file; for a schema-qualified
    /// backend, the schema name.
    pub schema: String,
}

fn default_db_type() -> String {
    "sqlite".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Root directory for the temp and committed article regions
    pub path: String,
    /// Per-group retention count for the expiration core
    #[serde(default = "default_expire_keep")]
    pub expire_keep: u32,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct FrontendConfig {
    #[serde(default = "default_frontend_enable")]
    pub enable: bool,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Idle read deadline per session, in seconds
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            read_timeout_secs: default_read_timeout_secs(),
        }
    }
}

/// One outbound peer definition.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    pub name: String,
    pub addr: String,
    #[serde(default)]
    pub proxy_type: ProxyType,
    pub proxy_addr: Option<String>,
    #[serde(default)]
    pub policy: FeedPolicyConfig,
    /// Per-feed override of `daemon.sync_on_start`
    pub sync_on_start: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyType {
    #[default]
    None,
    Socks4a,
}

/// Include/exclude newsgroup patterns for a feed, as written in config.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedPolicyConfig {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl Config {
    /// Read and parse a config file from disk. Does not validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| DaemonError::Config(format!("reading {}: {e}", path.as_ref().display())))?;
        let config: Config = toml::from_str(&text)
            .map_err(|e| DaemonError::Config(format!("parsing {}: {e}", path.as_ref().display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants the rest of the daemon assumes hold; called by
    /// [`Config::load`] and should also be called after manual construction
    /// (e.g. in tests).
    pub fn validate(&self) -> Result<()> {
        if self.daemon.bind.trim().is_empty() {
            return Err(DaemonError::Config("daemon.bind must not be empty".into()));
        }
        if self.daemon.instance_name.trim().is_empty() {
            return Err(DaemonError::Config(
                "daemon.instance_name must not be empty".into(),
            ));
        }
        if self.store.path.trim().is_empty() {
            return Err(DaemonError::Config("store.path must not be empty".into()));
        }
        for feed in &self.feeds {
            if feed.addr.trim().is_empty() {
                return Err(DaemonError::Config(format!(
                    "feeds.{}: addr must not be empty",
                    feed.name
                )));
            }
            feed.addr.parse::<std::net::SocketAddr>().map_err(|e| {
                DaemonError::Config(format!("feeds.{}: invalid addr {}: {e}", feed.name, feed.addr))
            })?;
            if feed.proxy_type == ProxyType::Socks4a && feed.proxy_addr.is_none() {
                return Err(DaemonError::Config(format!(
                    "feeds.{}: proxy_type = socks4a requires proxy_addr",
                    feed.name
                )));
            }
        }
        Ok(())
    }
}
