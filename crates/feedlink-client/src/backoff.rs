//! Reconnect policy — linear backoff capped at a maximum delay.
//!
//! `delay = min(max, base * attempt)`. The attempt counter resets on every
//! successful open and grows by one per unexpected close. The policy owns no
//! timer; the facade keeps at most one pending retry.

use std::time::Duration;

use feedlink_core::config::ReconnectConfig;

#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    base: Duration,
    max: Duration,
    attempt: u32,
}

impl ReconnectPolicy {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            attempt: 0,
        }
    }

    pub fn from_config(config: &ReconnectConfig) -> Self {
        Self::new(
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        )
    }

    /// Delay before attempt number `attempt`.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        self.base.saturating_mul(attempt).min(self.max)
    }

    /// Count an unexpected close and return the delay before the next attempt.
    pub fn on_unexpected_close(&mut self) -> Duration {
        self.attempt = self.attempt.saturating_add(1);
        self.next_delay(self.attempt)
    }

    /// Called on every successful open.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from_config(&ReconnectConfig::default())
    }
}
