//! Statistics for the notification bridge

pub mod metrics;

pub use metrics::{CacheCounters, CacheStats, EmitterCounters, EmitterStats};
