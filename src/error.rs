//! Error types
//!
//! Each area of the bridge has its own error enum; [`Error`] wraps them so
//! callers that touch several areas can use a single `Result`.

use crate::cache::PoolError;
use crate::codec::CodecError;
use crate::config::ConfigError;
use crate::emitter::{EmitterError, TransportError};
use crate::registry::RegistryError;

/// Crate-level error
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Channel registration, subscription parameter or topic resolution failure
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Emitter contract violation
    #[error(transparent)]
    Emitter(#[from] EmitterError),

    /// Upstream transport failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Payload decoding failure
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Outbound connection failure
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// Configuration loading failure
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result alias using the crate-level [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_error_converts() {
        let err: Error = RegistryError::DuplicateChannelName("block".into()).into();

        assert!(matches!(err, Error::Registry(_)));
        assert_eq!(err.to_string(), "'block' channel has already been registered");
    }

    #[test]
    fn test_transport_error_converts() {
        let err: Error = TransportError::SocketUnavailable("refused".into()).into();

        assert!(matches!(err, Error::Transport(_)));
        assert!(err.to_string().contains("refused"));
    }
}
