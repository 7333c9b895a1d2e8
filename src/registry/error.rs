//! Registry error types
//!
//! Configuration errors are fatal to the single registration or subscription
//! call that raised them and are never retried.

use crate::topic::Topic;

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Channel name already registered
    #[error("'{0}' channel has already been registered")]
    DuplicateChannelName(String),

    /// Marker is not exactly one ASCII character
    #[error("'{0}' is not a valid marker")]
    InvalidMarker(String),

    /// Marker already bound to another channel
    #[error("'{marker}' marker has already been registered by '{channel}'")]
    DuplicateMarker { marker: char, channel: String },

    /// Named handler template does not exist
    #[error("'{0}' is not a known handler template")]
    UnknownHandlerTemplate(String),

    /// Raw topic already has a resolver
    #[error("resolver for topic {0} has already been registered")]
    DuplicateResolver(Topic),

    /// Subscription without parameter under a "require parameter" policy
    #[error("channel '{0}' requires a subscription parameter")]
    MissingSubscriptionParameter(String),

    /// Subscription parameter could not be encoded
    #[error("invalid parameter for channel '{channel}': {reason}")]
    InvalidSubscriptionParameter { channel: String, reason: String },

    /// Subscription to a channel that was never registered
    #[error("'{0}' is not a registered channel")]
    UnknownChannel(String),

    /// Resolver chain did not terminate within bounds
    #[error("topic {topic} could not be resolved after {steps} steps")]
    UnresolvableTopic { topic: Topic, steps: usize },

    /// Mutation attempted after the registry was built
    #[error("registry has already been built")]
    RegistryFrozen,
}
