//! Snapshot loader — bounded, timeout-guarded listing fetches.
//!
//! `fetch` never fails: errors, non-success statuses, and timeouts all
//! degrade to an empty snapshot. `fetch_checked` reports the failure so the
//! caller can surface the degraded state.

use std::sync::Arc;
use std::time::Duration;

use feedlink_core::config::SnapshotConfig;
use feedlink_core::error::{FeedError, Result};
use feedlink_core::types::{FeedSnapshot, Pagination};

use crate::api::FeedApi;

#[derive(Clone)]
pub struct SnapshotLoader {
    api: Arc<dyn FeedApi>,
    timeout: Duration,
    page_limit: u32,
}

impl SnapshotLoader {
    pub fn new(api: Arc<dyn FeedApi>, config: &SnapshotConfig) -> Self {
        Self {
            api,
            timeout: config.request_timeout(),
            page_limit: config.page_limit,
        }
    }

    /// First page with the configured limit.
    pub fn first_page(&self) -> Pagination {
        Pagination::first(self.page_limit)
    }

    /// Fetch one page; any failure becomes an empty snapshot.
    pub async fn fetch(&self, page: Pagination) -> FeedSnapshot {
        self.fetch_checked(page).await.unwrap_or_default()
    }

    /// Fetch one page, reporting failures (timeout included).
    pub async fn fetch_checked(&self, page: Pagination) -> Result<FeedSnapshot> {
        let page = Pagination {
            skip: page.skip,
            limit: page.limit.clamp(1, self.page_limit.max(1)),
        };
        match tokio::time::timeout(self.timeout, self.api.list(page)).await {
            Ok(Ok(snapshot)) => {
                tracing::debug!(
                    "📥 Snapshot: {} items (total {}, skip {})",
                    snapshot.items.len(),
                    snapshot.total,
                    page.skip
                );
                Ok(snapshot)
            }
            Ok(Err(e)) => {
                tracing::warn!("Snapshot fetch failed: {e}");
                Err(e)
            }
            Err(_) => {
                let ms = self.timeout.as_millis() as u64;
                tracing::warn!("Snapshot fetch timed out after {ms}ms");
                Err(FeedError::Timeout(ms))
            }
        }
    }
}
