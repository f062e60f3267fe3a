//! Platform notifications for pushed items. Best effort: a missing
//! notification daemon or denied permission is a silent no-op.

use std::sync::atomic::{AtomicBool, Ordering};

use feedlink_core::types::{FeedItem, FeedLevel};

/// Side effect fired for every newly pushed item. Must not block.
pub trait Notifier: Send + Sync {
    fn notify(&self, item: &FeedItem);
}

/// Does nothing.
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _item: &FeedItem) {}
}

/// Writes each item to the log.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, item: &FeedItem) {
        match item.level {
            FeedLevel::High => tracing::warn!("🚨 {}: {}", item.title, item.body),
            _ => tracing::info!("🔔 {}: {}", item.title, item.body),
        }
    }
}

/// Desktop notification via `notify-send`. Disables itself after the first
/// spawn failure.
pub struct DesktopNotifier {
    command: String,
    available: AtomicBool,
}

impl DesktopNotifier {
    pub fn new() -> Self {
        Self::with_command("notify-send")
    }

    pub fn with_command(command: &str) -> Self {
        Self {
            command: command.to_string(),
            available: AtomicBool::new(true),
        }
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }

    fn urgency(level: FeedLevel) -> &'static str {
        match level {
            FeedLevel::High => "critical",
            FeedLevel::Low => "low",
            FeedLevel::Medium | FeedLevel::Unspecified => "normal",
        }
    }
}

impl Default for DesktopNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for DesktopNotifier {
    fn notify(&self, item: &FeedItem) {
        if !self.is_available() {
            return;
        }
        let spawned = tokio::process::Command::new(&self.command)
            .arg("--urgency")
            .arg(Self::urgency(item.level))
            .arg("--app-name=feedlink")
            .arg(&item.title)
            .arg(&item.body)
            .kill_on_drop(false)
            .spawn();
        match spawned {
            Ok(mut child) => {
                // reap in the background
                tokio::spawn(async move {
                    let _ = child.wait().await;
                });
            }
            Err(e) => {
                self.available.store(false, Ordering::Relaxed);
                tracing::debug!("Desktop notifications unavailable ({}): {e}", self.command);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urgency_mapping() {
        assert_eq!(DesktopNotifier::urgency(FeedLevel::High), "critical");
        assert_eq!(DesktopNotifier::urgency(FeedLevel::Low), "low");
        assert_eq!(DesktopNotifier::urgency(FeedLevel::Unspecified), "normal");
    }

    #[tokio::test]
    async fn test_missing_binary_is_silent() {
        let notifier = DesktopNotifier::with_command("feedlink-no-such-notifier");
        let item = FeedItem::new("1", "Account banned", "acc-9 was banned", FeedLevel::High);
        notifier.notify(&item);
        assert!(!notifier.is_available());
        // further calls are no-ops
        notifier.notify(&item);
    }

    #[test]
    fn test_simple_notifiers_do_not_panic() {
        let item = FeedItem::new("1", "t", "b", FeedLevel::Medium);
        NoopNotifier.notify(&item);
        LogNotifier.notify(&item);
    }
}
