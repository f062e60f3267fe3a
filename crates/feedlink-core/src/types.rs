//! Core data model: feed items, snapshots, connection state.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Severity attached to a feed item by the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedLevel {
    Low,
    Medium,
    High,
    #[default]
    Unspecified,
}

impl FeedLevel {
    /// Map a backend level/priority string onto the four known levels.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" | "info" => FeedLevel::Low,
            "medium" | "warning" | "warn" => FeedLevel::Medium,
            "high" | "critical" | "error" | "urgent" => FeedLevel::High,
            _ => FeedLevel::Unspecified,
        }
    }
}

impl<'de> Deserialize<'de> for FeedLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map(FeedLevel::parse).unwrap_or_default())
    }
}

impl std::fmt::Display for FeedLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedLevel::Low => write!(f, "low"),
            FeedLevel::Medium => write!(f, "medium"),
            FeedLevel::High => write!(f, "high"),
            FeedLevel::Unspecified => write!(f, "unspecified"),
        }
    }
}

/// One notification record. Created by the backend; the client only flips
/// `acknowledged` locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    #[serde(alias = "notification_id", deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "message", alias = "content")]
    pub body: String,
    #[serde(default)]
    pub level: FeedLevel,
    #[serde(default = "Utc::now", alias = "createdAt", deserialize_with = "de_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, alias = "is_read", alias = "read")]
    pub acknowledged: bool,
}

impl FeedItem {
    pub fn new(id: &str, title: &str, body: &str, level: FeedLevel) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            level,
            created_at: Utc::now(),
            acknowledged: false,
        }
    }

    /// Same item with the acknowledged flag set.
    pub fn acknowledged(mut self) -> Self {
        self.acknowledged = true;
        self
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Unsigned(u64),
    Signed(i64),
}

fn de_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Unsigned(n) => n.to_string(),
        RawId::Signed(n) => n.to_string(),
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Text(String),
    Epoch(i64),
    Fractional(f64),
}

fn de_timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let parsed = match Option::<RawTimestamp>::deserialize(deserializer)? {
        None => return Ok(Utc::now()),
        Some(RawTimestamp::Text(raw)) => parse_timestamp(&raw).ok_or(raw),
        Some(RawTimestamp::Epoch(n)) => from_epoch(n).ok_or_else(|| n.to_string()),
        Some(RawTimestamp::Fractional(f)) => from_epoch(f as i64).ok_or_else(|| f.to_string()),
    };
    parsed.map_err(|raw| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
}

/// Unix epoch in seconds, or milliseconds when the value is too large to be seconds.
fn from_epoch(n: i64) -> Option<DateTime<Utc>> {
    if n.abs() >= 100_000_000_000 {
        DateTime::from_timestamp_millis(n)
    } else {
        DateTime::from_timestamp(n, 0)
    }
}

/// Decode listing items one by one; an undecodable item is dropped, not the listing.
fn de_items<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<FeedItem>, D::Error> {
    let raw = Option::<Vec<serde_json::Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<FeedItem>(value) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::warn!("Dropping malformed feed item: {e}");
                None
            }
        })
        .collect())
}

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];

/// Parse an RFC 3339 timestamp, or a naive one which is taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    // offsets written without a colon, e.g. `+0700`
    if let Some(dt) = OFFSET_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(raw, fmt).ok())
    {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// A full or paged listing of feed items, newest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedSnapshot {
    #[serde(default, deserialize_with = "de_items")]
    pub items: Vec<FeedItem>,
    #[serde(default, alias = "unread_count")]
    pub unacknowledged_count: usize,
    #[serde(default)]
    pub total: u64,
}

impl FeedSnapshot {
    /// Build a snapshot whose counter is derived from the items.
    pub fn from_items(items: Vec<FeedItem>) -> Self {
        let unacknowledged_count = items.iter().filter(|i| !i.acknowledged).count();
        let total = items.len() as u64;
        Self {
            items,
            unacknowledged_count,
            total,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Bounded page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub skip: u32,
    pub limit: u32,
}

impl Pagination {
    pub fn first(limit: u32) -> Self {
        Self { skip: 0, limit }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::first(20)
    }
}

/// Lifecycle of the live channel, owned by the client facade.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Open,
    Reconnecting,
    Failed,
}

impl ConnectionState {
    /// Whether `self → next` is a legal transition.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        match (self, next) {
            (_, Failed) | (_, Idle) => true,
            (Idle, Connecting) => true,
            (Connecting, Open) | (Connecting, Reconnecting) => true,
            (Open, Reconnecting) => true,
            (Reconnecting, Connecting) => true,
            _ => false,
        }
    }

    pub fn is_open(self) -> bool {
        self == ConnectionState::Open
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Idle => write!(f, "idle"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Open => write!(f, "open"),
            ConnectionState::Reconnecting => write!(f, "reconnecting"),
            ConnectionState::Failed => write!(f, "failed"),
        }
    }
}
