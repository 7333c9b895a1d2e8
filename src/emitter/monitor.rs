//! Transport lifecycle monitor
//!
//! Maps lifecycle events to log severities and throttles repeated events of
//! the same kind so a flapping connection does not flood the log.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use super::transport::{LifecycleEvent, Severity};

/// Throttled lifecycle logger
#[derive(Debug)]
pub struct LifecycleMonitor {
    endpoint: String,
    throttle: Duration,
    last_logged: HashMap<LifecycleEvent, Instant>,
}

impl LifecycleMonitor {
    pub fn new(endpoint: impl Into<String>, throttle: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            throttle,
            last_logged: HashMap::new(),
        }
    }

    /// Record an event, logging it unless the same kind was logged within
    /// the throttle window. Returns whether a log line was written.
    pub fn observe(&mut self, event: LifecycleEvent) -> bool {
        if !self.should_log(event, Instant::now()) {
            return false;
        }

        let endpoint = self.endpoint.as_str();
        let name = event.as_str();
        match event.severity() {
            Severity::Debug => tracing::debug!(endpoint, event = name, "Transport lifecycle"),
            Severity::Info => tracing::info!(endpoint, event = name, "Transport lifecycle"),
            Severity::Warn => tracing::warn!(endpoint, event = name, "Transport lifecycle"),
            Severity::Error => tracing::error!(endpoint, event = name, "Transport lifecycle"),
        }
        true
    }

    fn should_log(&mut self, event: LifecycleEvent, now: Instant) -> bool {
        match self.last_logged.get(&event) {
            Some(last) if now.duration_since(*last) < self.throttle => false,
            _ => {
                self.last_logged.insert(event, now);
                true
            }
        }
    }
}
