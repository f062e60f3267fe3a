//! Notification REST API — listing and acknowledgements.
//!
//! `GET  {api}/notifications?skip&limit` → `{items, total, unread_count}`
//! `POST {api}/notifications/{id}/read`
//! `POST {api}/notifications/read-all`

use async_trait::async_trait;
use feedlink_core::config::FeedConfig;
use feedlink_core::error::{FeedError, Result};
use feedlink_core::types::{FeedSnapshot, Pagination};

/// Request/response collaborator. All calls are idempotent from the
/// client's point of view.
#[async_trait]
pub trait FeedApi: Send + Sync {
    async fn list(&self, page: Pagination) -> Result<FeedSnapshot>;
    async fn mark_read(&self, id: &str) -> Result<()>;
    async fn mark_all_read(&self) -> Result<()>;
}

/// `FeedApi` over HTTP with reqwest.
pub struct HttpFeedApi {
    client: reqwest::Client,
    base: String,
    token: Option<String>,
    timeout_ms: u64,
}

impl HttpFeedApi {
    pub fn new(config: &FeedConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.snapshot.request_timeout())
            .user_agent(concat!("feedlink/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FeedError::Http(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base: config.api_root().to_string(),
            token: if config.auth_token.is_empty() {
                None
            } else {
                Some(config.auth_token.clone())
            },
            timeout_ms: config.snapshot.request_timeout_ms,
        })
    }

    /// `{base}/notifications/{segments..}`, each segment percent-encoded.
    fn url(&self, segments: &[&str]) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.base)
            .map_err(|e| FeedError::Config(format!("Invalid api_base {}: {e}", self.base)))?;
        url.path_segments_mut()
            .map_err(|_| FeedError::Config(format!("api_base cannot carry a path: {}", self.base)))?
            .pop_if_empty()
            .push("notifications")
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    fn map_err(&self, e: reqwest::Error) -> FeedError {
        if e.is_timeout() {
            FeedError::Timeout(self.timeout_ms)
        } else {
            FeedError::Http(e.to_string())
        }
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        Err(FeedError::Api {
            status,
            message: error_message(&body),
        })
    }

    async fn post(&self, segments: &[&str]) -> Result<()> {
        let resp = self
            .authorize(self.client.post(self.url(segments)?))
            .send()
            .await
            .map_err(|e| self.map_err(e))?;
        Self::check(resp).await?;
        Ok(())
    }
}

#[async_trait]
impl FeedApi for HttpFeedApi {
    async fn list(&self, page: Pagination) -> Result<FeedSnapshot> {
        let resp = self
            .authorize(self.client.get(self.url(&[])?))
            .query(&[("skip", page.skip), ("limit", page.limit)])
            .send()
            .await
            .map_err(|e| self.map_err(e))?;
        let resp = Self::check(resp).await?;
        resp.json::<FeedSnapshot>()
            .await
            .map_err(|e| FeedError::Protocol(format!("Invalid notification listing: {e}")))
    }

    async fn mark_read(&self, id: &str) -> Result<()> {
        self.post(&[id, "read"]).await
    }

    async fn mark_all_read(&self) -> Result<()> {
        self.post(&["read-all"]).await
    }
}

/// Pull a readable message out of an error body (`{"detail": ...}` or raw text).
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| {
            json["detail"]
                .as_str()
                .or_else(|| json["message"].as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.len() > 200 {
                format!("{}...", trimmed.chars().take(200).collect::<String>())
            } else {
                trimmed.to_string()
            }
        })
}
