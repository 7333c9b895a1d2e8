//! Multisocket notification emitter
//!
//! Owns the single upstream transport to the node and presents it to the
//! HTTP/WebSocket layer as many independent channels. The transport is
//! created lazily on the first subscription and torn down when the last
//! subscription leaves, when the transport reports closure, or when it fails
//! to connect within the configured timeout.
//!
//! ```text
//!   NoSocket ──on(key)──► Open ──remove_all_listeners(last key)──► NoSocket
//!                          │    ──disconnected / closed / error──►
//!                          │    ──connect timeout──────────────►
//!                          │    ──close()──────────────────────►
//!                          ▼
//!      message ─► resolve topic ─► match subscriptions ─► handler ─► listeners
//! ```

pub mod config;
pub mod monitor;
pub mod multisocket;
mod socket;
pub mod subscription;
pub mod transport;

pub use config::EmitterConfig;
pub use monitor::LifecycleMonitor;
pub use multisocket::{MultisocketEmitter, CHANNEL_CLOSED_EVENT};
pub use subscription::{Listener, SubscriptionHandle};
pub use transport::{
    LifecycleEvent, LoopbackFactory, LoopbackPeer, Severity, TransportControl, TransportError,
    TransportEvent, TransportFactory, TransportHandle,
};

use crate::registry::RegistryError;

/// Error type for emitter operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EmitterError {
    /// Operation requires a channel key but got a sub-event key
    #[error("'{0}' is a sub-event key")]
    SubEventKey(String),

    /// Channel lookup or topic computation failed
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Upstream transport could not be created or subscribed
    #[error(transparent)]
    Transport(#[from] TransportError),
}
