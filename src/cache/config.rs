//! Outbound cache configuration

use std::time::Duration;

/// Where buffers from a failed flush are placed relative to buffers queued
/// while that flush was in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequeuePolicy {
    /// After newer buffers (submission order is not preserved across a failure)
    #[default]
    Append,
    /// Before newer buffers (submission order is preserved)
    Prepend,
}

/// Outbound cache options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Delay between the first queued buffer and its flush
    pub flush_frequency: Duration,

    /// Placement of requeued buffers after a failed flush
    pub requeue_policy: RequeuePolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            flush_frequency: Duration::from_millis(500),
            requeue_policy: RequeuePolicy::Append,
        }
    }
}

impl CacheConfig {
    /// Set the flush frequency
    pub fn flush_frequency(mut self, frequency: Duration) -> Self {
        self.flush_frequency = frequency;
        self
    }

    /// Set the requeue policy
    pub fn requeue_policy(mut self, policy: RequeuePolicy) -> Self {
        self.requeue_policy = policy;
        self
    }
}
