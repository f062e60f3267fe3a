//! What subscribers see: a reactive view of the store plus discrete events.

use feedlink_core::types::{ConnectionState, FeedItem};
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::{Stream, StreamExt};

/// Discrete notices emitted by the client facade.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    StateChanged(ConnectionState),
    /// A new item arrived over the live channel.
    ItemReceived(FeedItem),
    /// The live channel dropped. Once per disconnect episode.
    Disconnected,
    /// The live channel came back after a `Disconnected`.
    Reconnected,
    /// A user action was rejected and rolled back.
    ActionFailed(String),
    /// Snapshot data unavailable, or the channel gave up (identity missing).
    Degraded(String),
}

/// Read-only projection of the client's state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedView {
    pub items: Vec<FeedItem>,
    pub unread_count: usize,
    pub total: u64,
    pub state: ConnectionState,
    /// Last snapshot fetch failed.
    pub degraded: bool,
}

/// Handle returned by `FeedClient::subscribe`.
pub struct Subscription {
    view: watch::Receiver<FeedView>,
    events: broadcast::Receiver<FeedEvent>,
}

impl Subscription {
    pub(crate) fn new(view: watch::Receiver<FeedView>, events: broadcast::Receiver<FeedEvent>) -> Self {
        Self { view, events }
    }

    /// Latest view.
    pub fn current(&self) -> FeedView {
        self.view.borrow().clone()
    }

    /// Wait for the next view change. `None` once the client is gone.
    pub async fn changed(&mut self) -> Option<FeedView> {
        self.view.changed().await.ok()?;
        Some(self.view.borrow_and_update().clone())
    }

    /// Next event; lagged events are skipped. `None` once the client is gone.
    pub async fn next_event(&mut self) -> Option<FeedEvent> {
        loop {
            match self.events.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Subscriber lagged, skipped {n} events");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Events received so far, without waiting.
    pub fn drain_events(&mut self) -> Vec<FeedEvent> {
        let mut out = Vec::new();
        loop {
            match self.events.try_recv() {
                Ok(event) => out.push(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return out,
            }
        }
    }

    /// Consume into a stream of events.
    pub fn into_event_stream(self) -> impl Stream<Item = FeedEvent> {
        BroadcastStream::new(self.events).filter_map(|res: Result<FeedEvent, BroadcastStreamRecvError>| res.ok())
    }
}
