//! In-memory collaborators for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use feedlink_core::error::{FeedError, Result};
use feedlink_core::traits::{ChannelHandle, EventSink, Transport, TransportEvent, TransportEventKind};
use feedlink_core::types::{FeedItem, FeedSnapshot, Pagination};
use tokio::sync::Notify;

use crate::api::FeedApi;
use crate::notify::Notifier;

#[derive(Default)]
pub struct MockApi {
    snapshot: Mutex<FeedSnapshot>,
    fail_list: AtomicBool,
    fail_acks: AtomicBool,
    hold_list: AtomicBool,
    release: Notify,
    hold_acks: AtomicBool,
    release_acks: Notify,
    list_calls: AtomicUsize,
    last_page: Mutex<Option<Pagination>>,
    acks: Mutex<Vec<String>>,
}

impl MockApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_snapshot(&self, snapshot: FeedSnapshot) {
        *self.snapshot.lock().unwrap() = snapshot;
    }

    pub fn fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    pub fn fail_acks(&self, fail: bool) {
        self.fail_acks.store(fail, Ordering::SeqCst);
    }

    /// Make `list` block until `release` is called.
    pub fn hold_list(&self, hold: bool) {
        self.hold_list.store(hold, Ordering::SeqCst);
    }

    pub fn release(&self) {
        self.hold_list.store(false, Ordering::SeqCst);
        self.release.notify_waiters();
    }

    /// Make acknowledgement calls block until `release_acks` is called.
    pub fn hold_acks(&self, hold: bool) {
        self.hold_acks.store(hold, Ordering::SeqCst);
    }

    pub fn release_acks(&self) {
        self.hold_acks.store(false, Ordering::SeqCst);
        self.release_acks.notify_waiters();
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn last_page(&self) -> Option<Pagination> {
        *self.last_page.lock().unwrap()
    }

    pub fn acks(&self) -> Vec<String> {
        self.acks.lock().unwrap().clone()
    }

    async fn ack(&self, entry: String) -> Result<()> {
        self.acks.lock().unwrap().push(entry);
        while self.hold_acks.load(Ordering::SeqCst) {
            self.release_acks.notified().await;
        }
        if self.fail_acks.load(Ordering::SeqCst) {
            return Err(FeedError::Api {
                status: 500,
                message: "rejected".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl FeedApi for MockApi {
    async fn list(&self, page: Pagination) -> Result<FeedSnapshot> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_page.lock().unwrap() = Some(page);
        while self.hold_list.load(Ordering::SeqCst) {
            self.release.notified().await;
        }
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(FeedError::Api {
                status: 503,
                message: "unavailable".into(),
            });
        }
        Ok(self.snapshot.lock().unwrap().clone())
    }

    async fn mark_read(&self, id: &str) -> Result<()> {
        self.ack(format!("read:{id}")).await
    }

    async fn mark_all_read(&self) -> Result<()> {
        self.ack("read-all".into()).await
    }
}

#[derive(Default)]
struct TransportState {
    next_id: u64,
    opens: Vec<(ChannelHandle, String, String)>,
    sinks: HashMap<ChannelHandle, EventSink>,
    open: HashSet<ChannelHandle>,
    closed: Vec<ChannelHandle>,
    sent: Vec<(ChannelHandle, String)>,
}

/// Transport whose events are driven by the test.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<TransportState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver an event as if the network produced it.
    pub fn emit(&self, handle: ChannelHandle, kind: TransportEventKind) {
        let mut state = self.state.lock().unwrap();
        match kind {
            TransportEventKind::Open => {
                state.open.insert(handle);
            }
            TransportEventKind::Close(_) => {
                state.open.remove(&handle);
            }
            _ => {}
        }
        if let Some(sink) = state.sinks.get(&handle) {
            let _ = sink.send(TransportEvent::new(handle, kind));
        }
    }

    pub fn open_count(&self) -> usize {
        self.state.lock().unwrap().opens.len()
    }

    pub fn last_handle(&self) -> Option<ChannelHandle> {
        self.state.lock().unwrap().opens.last().map(|(h, _, _)| *h)
    }

    /// `(endpoint, identity)` of every open call.
    pub fn opened_with(&self) -> Vec<(String, String)> {
        self.state
            .lock()
            .unwrap()
            .opens
            .iter()
            .map(|(_, e, i)| (e.clone(), i.clone()))
            .collect()
    }

    pub fn closed(&self) -> Vec<ChannelHandle> {
        self.state.lock().unwrap().closed.clone()
    }

    pub fn sent(&self) -> Vec<String> {
        self.state.lock().unwrap().sent.iter().map(|(_, p)| p.clone()).collect()
    }
}

impl Transport for MockTransport {
    fn open(&mut self, endpoint: &str, identity: &str, sink: EventSink) -> ChannelHandle {
        let mut state = self.state.lock().unwrap();
        let live: Vec<_> = state.open.drain().collect();
        state.closed.extend(live);
        state.next_id += 1;
        let handle = ChannelHandle(state.next_id);
        state.opens.push((handle, endpoint.to_string(), identity.to_string()));
        state.sinks.insert(handle, sink);
        handle
    }

    fn send(&mut self, handle: ChannelHandle, payload: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if !state.open.contains(&handle) {
            return Err(FeedError::NotConnected);
        }
        state.sent.push((handle, payload.to_string()));
        Ok(())
    }

    fn close(&mut self, handle: ChannelHandle) {
        let mut state = self.state.lock().unwrap();
        state.open.remove(&handle);
        state.closed.push(handle);
    }

    fn is_open(&self, handle: ChannelHandle) -> bool {
        self.state.lock().unwrap().open.contains(&handle)
    }
}

/// Notifier that remembers what it was asked to show.
#[derive(Default)]
pub struct RecordingNotifier {
    shown: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn shown(&self) -> Vec<String> {
        self.shown.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, item: &FeedItem) {
        self.shown.lock().unwrap().push(item.id.clone());
    }
}
