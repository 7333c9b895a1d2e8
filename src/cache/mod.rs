//! Outbound transaction batching
//!
//! Transaction submissions arrive one by one from the HTTP layer and are
//! acknowledged immediately. The cache coalesces them and writes each batch
//! to the node over a leased connection, retrying failed batches until they
//! succeed.
//!
//! ```text
//!  add_transaction_buffer(B1) ─┐
//!  add_transaction_buffer(B2) ─┼─► pending [B1 B2 B3] ──flush timer──► lease() ─► send(B1‖B2‖B3)
//!  add_transaction_buffer(B3) ─┘          ▲                                        │
//!                                         └────────── requeue on failure ◄─────────┘
//! ```

pub mod batch;
pub mod config;
pub mod pool;

pub use batch::OutboundCache;
pub use config::{CacheConfig, RequeuePolicy};
pub use pool::{request, Connection, ConnectionPool, Packet, PoolError};
