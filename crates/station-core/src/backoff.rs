use crate::BackoffConfig;
use std::time::Duration;

/// Reconnect delay: starts at `base`, grows by `factor` per failure, capped.
#[derive(Debug, Clone)]
pub struct Backoff {
    base_ms: f64,
    factor: f64,
    max_ms: f64,
    current_ms: f64,
    failures: u32,
}

impl Backoff {
    pub fn new(config: &BackoffConfig) -> Self {
        let base_ms = config.base_ms as f64;
        Self {
            base_ms,
            factor: config.factor,
            max_ms: config.max_ms as f64,
            current_ms: base_ms,
            failures: 0,
        }
    }

    /// Delay the next failure will wait.
    pub fn current(&self) -> Duration {
        Duration::from_micros((self.current_ms * 1000.0).round() as u64)
    }

    pub fn current_ms(&self) -> f64 {
        self.current_ms
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Record a failure: returns the delay to wait now and grows the next one.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current();
        self.current_ms = (self.current_ms * self.factor).min(self.max_ms);
        self.failures = self.failures.saturating_add(1);
        delay
    }

    /// Back to `base`; only a successful open does this.
    pub fn reset(&mut self) {
        self.current_ms = self.base_ms;
        self.failures = 0;
    }
}
