// Bounded-retry reconnect state machine for the streaming transport
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReconnectSettings {
    pub delay_ms: u64,
    pub max_attempts: u32,
    pub connect_timeout_ms: u64,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            delay_ms: 2000,
            max_attempts: 5,
            connect_timeout_ms: 5000,
        }
    }
}

impl ReconnectSettings {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Schedule attempt number `attempt` after `delay`
    Retry { attempt: u32, delay: Duration },
    /// Attempts exhausted; no further automatic reconnects
    GiveUp,
}

#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    delay: Duration,
    max_attempts: u32,
    attempt: u32,
    exhausted: bool,
}

impl ReconnectPolicy {
    pub fn new(settings: &ReconnectSettings) -> Self {
        Self {
            delay: settings.delay(),
            max_attempts: settings.max_attempts,
            attempt: 0,
            exhausted: false,
        }
    }

    /// Attempt currently scheduled or in flight, 0 while connected
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn on_open(&mut self) {
        self.attempt = 0;
        self.exhausted = false;
    }

    /// The connection closed or the attempt in flight failed.
    pub fn on_close(&mut self) -> ReconnectDecision {
        if self.exhausted || self.attempt >= self.max_attempts {
            self.exhausted = true;
            return ReconnectDecision::GiveUp;
        }
        self.attempt += 1;
        ReconnectDecision::Retry {
            attempt: self.attempt,
            delay: self.delay,
        }
    }

    /// Manual restart after the operator intervenes
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.exhausted = false;
    }
}
