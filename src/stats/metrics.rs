//! Counters and snapshots for the emitter and the outbound cache
//!
//! Counters are updated with relaxed atomics from the hot path; snapshots are
//! plain structs handed to callers.

use std::sync::atomic::{AtomicU64, Ordering};

/// Emitter statistics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmitterStats {
    /// Upstream transports created
    pub transports_created: u64,
    /// Upstream transports torn down (any reason)
    pub transports_closed: u64,
    /// Connect watchdog expirations
    pub connect_timeouts: u64,
    /// Messages received from the transport
    pub messages_received: u64,
    /// Messages handed to at least one handler
    pub messages_dispatched: u64,
    /// Messages whose resolved topic matched no subscription
    pub dropped_unmatched: u64,
    /// Messages whose resolver chain did not terminate
    pub dropped_unresolvable: u64,
    /// Handler decode failures
    pub handler_errors: u64,
}

impl EmitterStats {
    /// Messages received but not delivered to any handler
    pub fn dropped(&self) -> u64 {
        self.dropped_unmatched + self.dropped_unresolvable
    }
}

/// Live emitter counters
#[derive(Debug, Default)]
pub struct EmitterCounters {
    pub transports_created: AtomicU64,
    pub transports_closed: AtomicU64,
    pub connect_timeouts: AtomicU64,
    pub messages_received: AtomicU64,
    pub messages_dispatched: AtomicU64,
    pub dropped_unmatched: AtomicU64,
    pub dropped_unresolvable: AtomicU64,
    pub handler_errors: AtomicU64,
}

impl EmitterCounters {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> EmitterStats {
        EmitterStats {
            transports_created: self.transports_created.load(Ordering::Relaxed),
            transports_closed: self.transports_closed.load(Ordering::Relaxed),
            connect_timeouts: self.connect_timeouts.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_dispatched: self.messages_dispatched.load(Ordering::Relaxed),
            dropped_unmatched: self.dropped_unmatched.load(Ordering::Relaxed),
            dropped_unresolvable: self.dropped_unresolvable.load(Ordering::Relaxed),
            handler_errors: self.handler_errors.load(Ordering::Relaxed),
        }
    }
}

/// Outbound cache statistics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Buffers accepted from callers
    pub buffers_added: u64,
    /// Successful batch writes
    pub flushes: u64,
    /// Failed flush attempts (lease or write)
    pub failed_flushes: u64,
    /// Buffers written by successful flushes
    pub buffers_written: u64,
    /// Bytes written by successful flushes
    pub bytes_written: u64,
}

impl CacheStats {
    /// Average number of buffers coalesced per successful flush
    pub fn average_batch_size(&self) -> f64 {
        if self.flushes > 0 {
            self.buffers_written as f64 / self.flushes as f64
        } else {
            0.0
        }
    }
}

/// Live cache counters
#[derive(Debug, Default)]
pub struct CacheCounters {
    pub buffers_added: AtomicU64,
    pub flushes: AtomicU64,
    pub failed_flushes: AtomicU64,
    pub buffers_written: AtomicU64,
    pub bytes_written: AtomicU64,
}

impl CacheCounters {
    /// Record a successful flush of `buffers` buffers totalling `bytes` bytes
    pub fn record_flush(&self, buffers: usize, bytes: usize) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.buffers_written
            .fetch_add(buffers as u64, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            buffers_added: self.buffers_added.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            failed_flushes: self.failed_flushes.load(Ordering::Relaxed),
            buffers_written: self.buffers_written.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
        }
    }
}
