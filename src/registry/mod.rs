//! Channel registry
//!
//! Maps logical channel names to wire-level topic markers and payload
//! handlers, and holds the resolver table for markers that are shared by
//! several logical channels. The registry is populated once at startup and
//! then frozen into two immutable snapshots consumed by the emitter:
//!
//! ```text
//!  register(name, marker, handler) ──┐
//!  add_resolver(raw_topic, resolver) ┤
//!                                    ▼
//!                            ChannelRegistry
//!                     build() │            │ build_resolvers()
//!                             ▼            ▼
//!                       ChannelMap    ResolverTable
//!                   name → descriptor  raw topic → resolver
//! ```

pub mod channel;
pub mod config;
pub mod error;
pub mod resolver;
pub mod store;
pub mod templates;

pub use channel::{handler_fn, ChannelDescriptor, ChannelHandler, ChannelMap, HandlerSpec, TopicFilter};
pub use config::RegistryConfig;
pub use error::RegistryError;
pub use resolver::{
    entity_type_resolver, resolver_fn, resolver_fn_targeting, ResolverTable, TopicResolver,
};
pub use store::ChannelRegistry;
