//! Transport trait — one persistent duplex connection at a time.
//!
//! Failures are asynchronous: `open` never fails for network reasons, the
//! outcome arrives later as `Error` + `Close` events on the sink.

use tokio::sync::mpsc;

use crate::error::Result;

/// Identifies one `open` call. Events from older handles are stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelHandle(pub u64);

impl std::fmt::Display for ChannelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEventKind {
    Open,
    Message(String),
    Error(String),
    /// Connection closed; carries the close code when the peer sent one.
    Close(Option<u16>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransportEvent {
    pub handle: ChannelHandle,
    pub kind: TransportEventKind,
}

impl TransportEvent {
    pub fn new(handle: ChannelHandle, kind: TransportEventKind) -> Self {
        Self { handle, kind }
    }
}

pub type EventSink = mpsc::UnboundedSender<TransportEvent>;

/// A persistent duplex channel to the backend.
pub trait Transport: Send {
    /// Open a connection to `endpoint` as `identity`. A live handle is closed first.
    fn open(&mut self, endpoint: &str, identity: &str, sink: EventSink) -> ChannelHandle;

    /// Queue a text payload on an open handle.
    fn send(&mut self, handle: ChannelHandle, payload: &str) -> Result<()>;

    /// Close the handle. User-initiated, so no `Close` event is emitted.
    fn close(&mut self, handle: ChannelHandle);

    fn is_open(&self, handle: ChannelHandle) -> bool;
}
