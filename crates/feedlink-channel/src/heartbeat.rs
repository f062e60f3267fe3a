//! Heartbeat monitor — periodic liveness pings on an open channel.
//!
//! The monitor only owns the timer. Each beat is handed to the owner, which
//! calls [`beat`] so the ping goes out through the transport it already owns.
//! Failure detection is left to the transport's close events.

use std::time::Duration;

use feedlink_core::traits::{ChannelHandle, Transport};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::frame::HEARTBEAT_REQUEST;

#[derive(Debug, Default)]
pub struct HeartbeatMonitor {
    task: Option<JoinHandle<()>>,
    handle: Option<ChannelHandle>,
}

impl HeartbeatMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start beating for `handle` every `interval`. The first beat fires one
    /// interval after start. `on_beat` returning `false` ends the loop.
    /// Restarts if already running.
    pub fn start<F>(&mut self, handle: ChannelHandle, interval: Duration, mut on_beat: F)
    where
        F: FnMut(ChannelHandle) -> bool + Send + 'static,
    {
        self.stop();
        if interval.is_zero() {
            tracing::warn!("Heartbeat disabled for {handle}: zero interval");
            return;
        }

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !on_beat(handle) {
                    tracing::debug!("Heartbeat for {handle} stopped (owner gone)");
                    break;
                }
            }
        });
        self.task = Some(task);
        self.handle = Some(handle);
        tracing::debug!("💓 Heartbeat started for {handle} every {}ms", interval.as_millis());
    }

    /// Stop beating. Idempotent.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            if let Some(handle) = self.handle.take() {
                tracing::debug!("Heartbeat stopped for {handle}");
            }
        }
        self.handle = None;
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Handle currently being monitored.
    pub fn handle(&self) -> Option<ChannelHandle> {
        self.handle
    }
}

impl Drop for HeartbeatMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Send one ping on `handle` if the transport reports it open.
/// Returns whether a ping went out.
pub fn beat<T: Transport + ?Sized>(transport: &mut T, handle: ChannelHandle) -> bool {
    if !transport.is_open(handle) {
        tracing::trace!("Skipping heartbeat: {handle} not open");
        return false;
    }
    match transport.send(handle, HEARTBEAT_REQUEST) {
        Ok(()) => {
            tracing::trace!("💓 ping → {handle}");
            true
        }
        Err(e) => {
            tracing::debug!("Heartbeat send failed on {handle}: {e}");
            false
        }
    }
}
