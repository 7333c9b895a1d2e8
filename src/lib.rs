//! Real-time notification bridge for blockchain REST gateways
//!
//! The node publishes binary notifications on a single publish-subscribe socket.
//! This crate multiplexes that socket into many independently subscribable
//! logical channels, and batches outbound transaction submissions back to the node.
//!
//! # Architecture
//!
//! ```text
//!   startup                    per client subscription          per submission
//!      │                                │                              │
//!      ▼                                ▼                              ▼
//! ChannelRegistry ──build()──► MultisocketEmitter              OutboundCache
//!  name → descriptor            on(key, listener)              add_transaction_buffer()
//!  topic → resolver                  │                              │ flush timer
//!                                    ▼                              ▼
//!                            upstream transport              ConnectionPool::lease()
//!                            (one socket, many topics)       Connection::send(batch)
//!                                    │
//!               message ─► resolve topic ─► match subscription ─► handler ─► Event
//! ```
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use node_bridge::codec::RawCodec;
//! use node_bridge::emitter::{EmitterConfig, LoopbackFactory, MultisocketEmitter};
//! use node_bridge::registry::{ChannelRegistry, RegistryConfig};
//!
//! # async fn example() -> node_bridge::error::Result<()> {
//! let mut registry = ChannelRegistry::with_default_channels(RegistryConfig::default())?;
//! let emitter = MultisocketEmitter::new(
//!     registry.build(),
//!     registry.build_resolvers(),
//!     Arc::new(RawCodec),
//!     Arc::new(LoopbackFactory::new()),
//!     EmitterConfig::default(),
//! );
//!
//! let handle = emitter.on("block", |event| println!("{}", event.event_type))?;
//! assert!(handle.is_active());
//! emitter.remove_all_listeners("block")?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod codec;
pub mod config;
pub mod emitter;
pub mod error;
pub mod registry;
pub mod stats;
pub mod topic;

pub use cache::{CacheConfig, OutboundCache};
pub use codec::{Event, PayloadCodec};
pub use config::BridgeConfig;
pub use emitter::{EmitterConfig, MultisocketEmitter, SubscriptionHandle};
pub use error::{Error, Result};
pub use registry::{ChannelRegistry, RegistryConfig};
pub use topic::Topic;
