//! WebSocket transport for the notification channel.
//!
//! Each `open` spawns one connection task. The task reports `Open`, every
//! text frame, and finally `Error`/`Close` to the event sink. `close` (or a
//! second `open`) shuts the task down without emitting events.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use feedlink_core::error::{FeedError, Result};
use feedlink_core::traits::{ChannelHandle, EventSink, Transport, TransportEvent, TransportEventKind};
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;

/// One live connection owned by the transport.
struct Connection {
    handle: ChannelHandle,
    outgoing: mpsc::UnboundedSender<WsMessage>,
    open: Arc<AtomicBool>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl Connection {
    fn shutdown(mut self) {
        self.open.store(false, Ordering::SeqCst);
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        tracing::debug!("Channel {} closed by client", self.handle);
        // Detached: the task sees the shutdown signal, sends a close frame, exits.
        drop(self.task);
    }
}

/// WebSocket transport backed by `tokio-tungstenite`.
pub struct WsTransport {
    next_id: u64,
    current: Option<Connection>,
}

impl WsTransport {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            current: None,
        }
    }

    /// Handle of the live connection, if any.
    pub fn current_handle(&self) -> Option<ChannelHandle> {
        self.current.as_ref().map(|c| c.handle)
    }
}

impl Default for WsTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for WsTransport {
    fn open(&mut self, endpoint: &str, identity: &str, sink: EventSink) -> ChannelHandle {
        if let Some(old) = self.current.take() {
            tracing::debug!("Closing {} before reopening", old.handle);
            old.shutdown();
        }

        self.next_id += 1;
        let handle = ChannelHandle(self.next_id);
        let url = format!("{}/{}", endpoint.trim_end_matches('/'), identity);

        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let open = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn(run_connection(
            handle,
            url,
            outgoing_rx,
            shutdown_rx,
            sink,
            open.clone(),
        ));

        self.current = Some(Connection {
            handle,
            outgoing: outgoing_tx,
            open,
            shutdown: Some(shutdown_tx),
            task,
        });
        handle
    }

    fn send(&mut self, handle: ChannelHandle, payload: &str) -> Result<()> {
        let conn = self
            .current
            .as_ref()
            .filter(|c| c.handle == handle && c.open.load(Ordering::SeqCst))
            .ok_or(FeedError::NotConnected)?;
        conn.outgoing
            .send(WsMessage::Text(payload.to_string()))
            .map_err(|_| FeedError::NotConnected)
    }

    fn close(&mut self, handle: ChannelHandle) {
        if self.current.as_ref().is_some_and(|c| c.handle == handle) {
            if let Some(conn) = self.current.take() {
                conn.shutdown();
            }
        }
    }

    fn is_open(&self, handle: ChannelHandle) -> bool {
        self.current
            .as_ref()
            .is_some_and(|c| c.handle == handle && c.open.load(Ordering::SeqCst))
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        if let Some(conn) = self.current.take() {
            conn.shutdown();
        }
    }
}

/// Drive one connection until it closes or the client shuts it down.
async fn run_connection(
    handle: ChannelHandle,
    url: String,
    mut outgoing: mpsc::UnboundedReceiver<WsMessage>,
    mut shutdown: oneshot::Receiver<()>,
    sink: EventSink,
    open: Arc<AtomicBool>,
) {
    let emit = |kind: TransportEventKind| sink.send(TransportEvent::new(handle, kind)).is_ok();

    tracing::info!("Connecting channel {handle}: {url}");
    let connected = tokio::select! {
        res = tokio_tungstenite::connect_async(url.as_str()) => res,
        _ = &mut shutdown => return,
    };

    let ws_stream = match connected {
        Ok((stream, _response)) => stream,
        Err(e) => {
            tracing::warn!("Channel {handle} connect failed: {e}");
            emit(channel_error("connect failed", e));
            emit(TransportEventKind::Close(None));
            return;
        }
    };

    open.store(true, Ordering::SeqCst);
    tracing::info!("Channel {handle} connected");
    if !emit(TransportEventKind::Open) {
        return;
    }

    let (mut write, mut read) = ws_stream.split();

    let close_code = loop {
        tokio::select! {
            _ = &mut shutdown => {
                let _ = write.send(WsMessage::Close(None)).await;
                let _ = write.close().await;
                return;
            }
            out = outgoing.recv() => match out {
                Some(msg) => {
                    if let Err(e) = write.send(msg).await {
                        emit(channel_error("send failed", e));
                        break None;
                    }
                }
                None => {
                    let _ = write.send(WsMessage::Close(None)).await;
                    return;
                }
            },
            incoming = read.next() => match incoming {
                Some(Ok(WsMessage::Text(text))) => {
                    if !emit(TransportEventKind::Message(text)) {
                        return;
                    }
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    tracing::info!("Channel {handle} closed by server: {:?}", frame);
                    break frame.map(|f| u16::from(f.code));
                }
                Some(Ok(WsMessage::Ping(data))) => {
                    tracing::trace!("Channel {handle} ping received ({} bytes)", data.len());
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!("Channel {handle} error: {e}");
                    emit(channel_error("read failed", e));
                    break None;
                }
                None => break None,
            },
        }
    };

    open.store(false, Ordering::SeqCst);
    emit(TransportEventKind::Close(close_code));
}

/// Error event carrying a `FeedError::Channel` description.
fn channel_error(context: &str, e: impl std::fmt::Display) -> TransportEventKind {
    TransportEventKind::Error(FeedError::Channel(format!("{context}: {e}")).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::protocol::CloseFrame;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<TransportEvent>) -> TransportEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for transport event")
            .expect("sink closed")
    }

    /// Echo server: answers `ping` with `pong`, closes on `bye`.
    async fn spawn_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                    while let Some(Ok(msg)) = ws.next().await {
                        if let WsMessage::Text(text) = msg {
                            if text == "ping" {
                                ws.send(WsMessage::Text("pong".into())).await.ok();
                            } else if text == "bye" {
                                ws.send(WsMessage::Close(Some(CloseFrame {
                                    code: CloseCode::Normal,
                                    reason: "bye".into(),
                                })))
                                .await
                                .ok();
                            }
                        }
                    }
                });
            }
        });
        format!("ws://{addr}/api/v1/notifications/ws")
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_reports_async() {
        let mut transport = WsTransport::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = transport.open("ws://127.0.0.1:1/ws", "u1", tx);

        let first = next_event(&mut rx).await;
        assert_eq!(first.handle, handle);
        match &first.kind {
            TransportEventKind::Error(msg) => assert!(msg.starts_with("Channel error: connect failed"), "{msg}"),
            other => panic!("expected an error event, got {other:?}"),
        }
        assert_eq!(next_event(&mut rx).await.kind, TransportEventKind::Close(None));
        assert!(!transport.is_open(handle));
    }

    #[tokio::test]
    async fn test_open_send_and_server_close() {
        let endpoint = spawn_server().await;
        let mut transport = WsTransport::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = transport.open(&endpoint, "user-1", tx);

        assert_eq!(next_event(&mut rx).await.kind, TransportEventKind::Open);
        assert!(transport.is_open(handle));

        transport.send(handle, "ping").unwrap();
        assert_eq!(
            next_event(&mut rx).await.kind,
            TransportEventKind::Message("pong".into())
        );

        transport.send(handle, "bye").unwrap();
        assert_eq!(next_event(&mut rx).await.kind, TransportEventKind::Close(Some(1000)));
        assert!(!transport.is_open(handle));
        assert!(transport.send(handle, "ping").is_err());
    }

    #[tokio::test]
    async fn test_reopen_closes_previous_handle() {
        let endpoint = spawn_server().await;
        let mut transport = WsTransport::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let first = transport.open(&endpoint, "user-1", tx.clone());
        assert_eq!(next_event(&mut rx).await.handle, first);

        let second = transport.open(&endpoint, "user-1", tx);
        assert_ne!(first, second);
        assert!(!transport.is_open(first));
        assert_eq!(transport.current_handle(), Some(second));

        let event = next_event(&mut rx).await;
        assert_eq!(event.handle, second);
        assert_eq!(event.kind, TransportEventKind::Open);
        assert!(transport.send(first, "ping").is_err());

        transport.close(second);
        assert!(!transport.is_open(second));
        assert!(transport.current_handle().is_none());
    }
}
