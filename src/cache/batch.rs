//! Outbound transaction cache implementation

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::{Bytes, BytesMut};
use tokio::runtime::{Handle, TryCurrentError};

use crate::stats::{CacheCounters, CacheStats};

use super::config::{CacheConfig, RequeuePolicy};
use super::pool::{ConnectionPool, PoolError};

/// Buffers waiting for the next flush
#[derive(Debug, Default)]
struct PendingBatch {
    buffers: Vec<Bytes>,

    /// A flush is leasing or writing
    flushing: bool,

    /// A flush timer is running
    timer_armed: bool,
}

impl PendingBatch {
    /// Put a failed snapshot back into the queue
    fn requeue(&mut self, mut snapshot: Vec<Bytes>, policy: RequeuePolicy) {
        match policy {
            RequeuePolicy::Append => self.buffers.append(&mut snapshot),
            RequeuePolicy::Prepend => {
                snapshot.append(&mut self.buffers);
                self.buffers = snapshot;
            }
        }
    }
}

struct CacheInner {
    pool: Arc<dyn ConnectionPool>,
    config: CacheConfig,
    batch: Mutex<PendingBatch>,
    counters: CacheCounters,
}

/// Coalesces outbound transaction buffers into batched writes
///
/// At most one flush is in flight at any time. Buffers within one flush are
/// written in insertion order. Failed flushes are requeued and retried after
/// `flush_frequency`, indefinitely; callers are never told about failures.
///
/// Cheap to clone. Flushes run on the tokio runtime current at the time a
/// buffer is added; buffers added outside a runtime stay queued until the
/// next add from within one.
#[derive(Clone)]
pub struct OutboundCache {
    inner: Arc<CacheInner>,
}

impl OutboundCache {
    pub fn new(pool: Arc<dyn ConnectionPool>, config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                pool,
                config,
                batch: Mutex::new(PendingBatch::default()),
                counters: CacheCounters::default(),
            }),
        }
    }

    /// Queue a buffer for the next flush
    ///
    /// Starts the flush timer unless a timer is already running or a flush
    /// is in flight (that flush picks the buffer up when it completes).
    pub fn add_transaction_buffer(&self, buffer: Bytes) {
        let mut batch = self.inner.lock_batch();
        batch.buffers.push(buffer);
        self.inner
            .counters
            .buffers_added
            .fetch_add(1, Ordering::Relaxed);

        if !batch.flushing && !batch.timer_armed {
            batch.timer_armed = true;
            drop(batch);
            CacheInner::arm_timer(&self.inner);
        }
    }

    /// Number of buffers waiting to be flushed
    pub fn pending_len(&self) -> usize {
        self.inner.lock_batch().buffers.len()
    }

    /// Whether a flush is currently in flight
    pub fn is_flushing(&self) -> bool {
        self.inner.lock_batch().flushing
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        self.inner.counters.snapshot()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }
}

impl CacheInner {
    fn lock_batch(&self) -> MutexGuard<'_, PendingBatch> {
        self.batch.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawn the flush timer; `timer_armed` must already be set and is
    /// cleared again if no runtime is available
    fn arm_timer(inner: &Arc<Self>) {
        if let Err(e) = Self::schedule_flush(inner) {
            tracing::warn!(
                pending = inner.lock_batch().buffers.len(),
                error = %e,
                "No runtime for transaction flush, buffers stay queued"
            );
            inner.lock_batch().timer_armed = false;
        }
    }

    fn schedule_flush(inner: &Arc<Self>) -> Result<(), TryCurrentError> {
        let runtime = Handle::try_current()?;
        let inner = Arc::clone(inner);
        runtime.spawn(async move {
            tokio::time::sleep(inner.config.flush_frequency).await;
            inner.flush().await;
        });
        Ok(())
    }

    /// One flush cycle, continuing immediately while new buffers arrive
    async fn flush(self: Arc<Self>) {
        let mut snapshot = {
            let mut batch = self.lock_batch();
            batch.timer_armed = false;
            if batch.flushing || batch.buffers.is_empty() {
                return;
            }
            batch.flushing = true;
            std::mem::take(&mut batch.buffers)
        };

        loop {
            match self.write(&snapshot).await {
                Ok(bytes) => {
                    self.counters.record_flush(snapshot.len(), bytes);
                    tracing::debug!(buffers = snapshot.len(), bytes = bytes, "Flushed transactions");

                    let mut batch = self.lock_batch();
                    if batch.buffers.is_empty() {
                        batch.flushing = false;
                        return;
                    }
                    snapshot = std::mem::take(&mut batch.buffers);
                }
                Err(e) => {
                    self.counters.failed_flushes.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        buffers = snapshot.len(),
                        error = %e,
                        retry_ms = self.config.flush_frequency.as_millis() as u64,
                        "Transaction flush failed, requeueing"
                    );

                    let mut batch = self.lock_batch();
                    batch.requeue(snapshot, self.config.requeue_policy);
                    batch.flushing = false;
                    if !batch.timer_armed {
                        batch.timer_armed = true;
                        drop(batch);
                        Self::arm_timer(&self);
                    }
                    return;
                }
            }
        }
    }

    /// Lease a connection and write the concatenated snapshot
    async fn write(&self, snapshot: &[Bytes]) -> Result<usize, PoolError> {
        let size = snapshot.iter().map(Bytes::len).sum();
        let mut payload = BytesMut::with_capacity(size);
        for buffer in snapshot {
            payload.extend_from_slice(buffer);
        }

        let mut connection = self.pool.lease().await?;
        connection.send(payload.freeze()).await?;
        Ok(size)
    }
}
