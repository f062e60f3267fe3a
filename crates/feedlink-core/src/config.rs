//! FeedLink configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{FeedError, Result};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// REST base, e.g. `https://host/api/v1`.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Channel endpoint override; derived from `api_base` when empty.
    #[serde(default)]
    pub ws_url: String,
    /// Fixed identity; when empty the identity provider decides.
    #[serde(default)]
    pub identity: String,
    /// Bearer token sent with HTTP calls.
    #[serde(default)]
    pub auth_token: String,
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub identity_poll: IdentityPollConfig,
}

fn default_api_base() -> String { "http://localhost:8000/api/v1".into() }

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            ws_url: String::new(),
            identity: String::new(),
            auth_token: String::new(),
            channel: ChannelConfig::default(),
            reconnect: ReconnectConfig::default(),
            snapshot: SnapshotConfig::default(),
            identity_poll: IdentityPollConfig::default(),
        }
    }
}

impl FeedConfig {
    /// Load config from the default path (~/.feedlink/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| FeedError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| FeedError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to the given path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| FeedError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the FeedLink home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".feedlink")
    }

    /// Reject values that would break the client at runtime.
    pub fn validate(&self) -> Result<()> {
        if !self.api_base.starts_with("http://") && !self.api_base.starts_with("https://") {
            return Err(FeedError::Config(format!(
                "api_base must be an http(s) URL: {}",
                self.api_base
            )));
        }
        if !self.ws_url.is_empty()
            && !self.ws_url.starts_with("ws://")
            && !self.ws_url.starts_with("wss://")
        {
            return Err(FeedError::Config(format!("ws_url must be a ws(s) URL: {}", self.ws_url)));
        }
        if self.reconnect.base_delay_ms == 0 || self.reconnect.max_delay_ms < self.reconnect.base_delay_ms {
            return Err(FeedError::Config("reconnect: need 0 < base_delay_ms <= max_delay_ms".into()));
        }
        if self.snapshot.page_limit == 0 {
            return Err(FeedError::Config("snapshot.page_limit must be positive".into()));
        }
        if self.snapshot.request_timeout_ms == 0 {
            return Err(FeedError::Config("snapshot.request_timeout_ms must be positive".into()));
        }
        Ok(())
    }

    /// REST base without a trailing slash.
    pub fn api_root(&self) -> &str {
        self.api_base.trim_end_matches('/')
    }

    /// Channel endpoint without the identity segment.
    /// `http://h/api/v1` → `ws://h/api/v1/notifications/ws`.
    pub fn channel_endpoint(&self) -> String {
        if !self.ws_url.is_empty() {
            return self.ws_url.trim_end_matches('/').to_string();
        }
        let root = self.api_root();
        let ws_root = if let Some(rest) = root.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = root.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            root.to_string()
        };
        format!("{ws_root}/notifications/ws")
    }

    /// Fixed identity from config, if any.
    pub fn fixed_identity(&self) -> Option<String> {
        if self.identity.is_empty() { None } else { Some(self.identity.clone()) }
    }
}

/// Live channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_interval_ms: u64,
}

fn bool_true() -> bool { true }
fn default_heartbeat_ms() -> u64 { 30_000 }

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            heartbeat_interval_ms: default_heartbeat_ms(),
        }
    }
}

impl ChannelConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }
}

/// Reconnect backoff configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_base_delay_ms() -> u64 { 2_000 }
fn default_max_delay_ms() -> u64 { 30_000 }

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// Snapshot loader configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Upper bound on items kept in memory.
    #[serde(default = "default_max_items")]
    pub max_items: usize,
}

fn default_poll_interval_ms() -> u64 { 30_000 }
fn default_page_limit() -> u32 { 20 }
fn default_request_timeout_ms() -> u64 { 10_000 }
fn default_max_items() -> usize { 200 }

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            page_limit: default_page_limit(),
            request_timeout_ms: default_request_timeout_ms(),
            max_items: default_max_items(),
        }
    }
}

impl SnapshotConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// How long to wait for an identity before giving up on the channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityPollConfig {
    #[serde(default = "default_identity_poll_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_identity_attempts")]
    pub max_attempts: u32,
}

fn default_identity_poll_ms() -> u64 { 1_000 }
fn default_identity_attempts() -> u32 { 30 }

impl Default for IdentityPollConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_identity_poll_ms(),
            max_attempts: default_identity_attempts(),
        }
    }
}

impl IdentityPollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}
