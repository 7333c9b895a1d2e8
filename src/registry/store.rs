//! Channel registry implementation
//!
//! Write-once table translating channel names into wire markers and decode
//! logic. After the first `build()`/`build_resolvers()` the registry is frozen
//! and further registrations fail with `RegistryFrozen`.

use std::collections::HashMap;
use std::sync::Arc;

use crate::topic::{Marker, ParamKind, Topic};

use super::channel::{ChannelDescriptor, ChannelMap, HandlerSpec, TopicFilter};
use super::config::RegistryConfig;
use super::error::RegistryError;
use super::resolver::{entity_type_resolver, ResolverTable, TopicResolver};
use super::templates;

/// Builder for the channel and resolver tables consumed by the emitter
pub struct ChannelRegistry {
    /// Registered channels keyed by name
    descriptors: HashMap<String, Arc<ChannelDescriptor>>,

    /// Consumed markers and the channel that owns each
    markers: HashMap<Marker, String>,

    /// Resolvers keyed by raw topic
    resolvers: HashMap<Topic, Arc<dyn TopicResolver>>,

    /// Set once either table has been handed out
    frozen: bool,

    config: RegistryConfig,
}

impl ChannelRegistry {
    /// Create an empty registry
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            descriptors: HashMap::new(),
            markers: HashMap::new(),
            resolvers: HashMap::new(),
            frozen: false,
            config,
        }
    }

    /// Create a registry holding the gateway's standard channel set
    ///
    /// | channel              | marker | parameter   | template            |
    /// |----------------------|--------|-------------|---------------------|
    /// | `block`              | `b`    | none        | `blockHeader`       |
    /// | `confirmedAdded`     | `a`    | address     | `transaction`       |
    /// | `unconfirmedAdded`   | `u`    | address     | `transaction`       |
    /// | `unconfirmedRemoved` | `r`    | address     | `transactionHash`   |
    /// | `partialAdded`       | `p`    | address     | `transaction`       |
    /// | `partialRemoved`     | `q`    | address     | `transactionHash`   |
    /// | `status`             | `s`    | address     | `transactionStatus` |
    /// | `cosignature`        | `c`    | address     | `cosignature`       |
    /// | `receipts`           | `e`    | entity type | `receipt`           |
    ///
    /// Receipts are published under the bare `e` marker and resolved by the
    /// entity type embedded in the payload.
    pub fn with_default_channels(config: RegistryConfig) -> Result<Self, RegistryError> {
        let mut registry = Self::new(config);

        registry.register_with("block", "b", ParamKind::None, templates::BLOCK_HEADER)?;
        registry.register("confirmedAdded", "a", templates::TRANSACTION)?;
        registry.register("unconfirmedAdded", "u", templates::TRANSACTION)?;
        registry.register("unconfirmedRemoved", "r", templates::TRANSACTION_HASH)?;
        registry.register("partialAdded", "p", templates::TRANSACTION)?;
        registry.register("partialRemoved", "q", templates::TRANSACTION_HASH)?;
        registry.register("status", "s", templates::TRANSACTION_STATUS)?;
        registry.register("cosignature", "c", templates::COSIGNATURE)?;
        registry.register_with("receipts", "e", ParamKind::EntityType, templates::RECEIPT)?;
        registry.add_resolver(Topic::from_marker(b'e'), entity_type_resolver(b'e'))?;

        Ok(registry)
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Register an address-parameterised channel
    pub fn register(
        &mut self,
        name: &str,
        marker: &str,
        handler: impl Into<HandlerSpec>,
    ) -> Result<(), RegistryError> {
        self.register_with(name, marker, ParamKind::Address, handler)
    }

    /// Register a channel with an explicit parameter encoding
    ///
    /// `marker` must be exactly one ASCII character not yet bound to another
    /// channel; `handler` is either a direct handler or a template name.
    pub fn register_with(
        &mut self,
        name: &str,
        marker: &str,
        param_kind: ParamKind,
        handler: impl Into<HandlerSpec>,
    ) -> Result<(), RegistryError> {
        if self.frozen {
            return Err(RegistryError::RegistryFrozen);
        }

        if self.descriptors.contains_key(name) {
            return Err(RegistryError::DuplicateChannelName(name.to_string()));
        }

        let marker_byte = parse_marker(marker)?;
        if let Some(owner) = self.markers.get(&marker_byte) {
            return Err(RegistryError::DuplicateMarker {
                marker: marker_byte as char,
                channel: owner.clone(),
            });
        }

        let handler = match handler.into() {
            HandlerSpec::Direct(handler) => handler,
            HandlerSpec::Template(template) => templates::lookup(&template)
                .ok_or(RegistryError::UnknownHandlerTemplate(template))?,
        };

        let require_param = match param_kind {
            ParamKind::Address => self.config.require_address,
            ParamKind::EntityType => self.config.require_type,
            ParamKind::None | ParamKind::Raw => false,
        };
        let filter = TopicFilter::new(name, marker_byte, param_kind, require_param);

        self.markers.insert(marker_byte, name.to_string());
        self.descriptors.insert(
            name.to_string(),
            Arc::new(ChannelDescriptor::new(name, marker_byte, filter, handler)),
        );

        tracing::debug!(channel = name, marker = %marker, kind = ?param_kind, "Channel registered");
        Ok(())
    }

    /// Register a content-dependent rewrite for a raw topic
    pub fn add_resolver(
        &mut self,
        raw_topic: impl Into<Topic>,
        resolver: Arc<dyn TopicResolver>,
    ) -> Result<(), RegistryError> {
        if self.frozen {
            return Err(RegistryError::RegistryFrozen);
        }

        let raw_topic = raw_topic.into();
        if self.resolvers.contains_key(&raw_topic) {
            return Err(RegistryError::DuplicateResolver(raw_topic));
        }

        tracing::debug!(topic = %raw_topic, "Resolver registered");
        self.resolvers.insert(raw_topic, resolver);
        Ok(())
    }

    /// Snapshot of registered channels; freezes the registry
    pub fn build(&mut self) -> ChannelMap {
        self.frozen = true;
        ChannelMap::new(self.descriptors.clone())
    }

    /// Snapshot of registered resolvers; freezes the registry
    pub fn build_resolvers(&mut self) -> ResolverTable {
        self.frozen = true;
        ResolverTable::new(self.resolvers.clone(), self.config.max_resolver_depth)
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Number of registered channels
    pub fn channel_count(&self) -> usize {
        self.descriptors.len()
    }
}

fn parse_marker(marker: &str) -> Result<Marker, RegistryError> {
    let mut chars = marker.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii() => Ok(c as u8),
        _ => Err(RegistryError::InvalidMarker(marker.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::codec::{Event, RawCodec};
    use crate::registry::channel::handler_fn;
    use crate::registry::resolver::resolver_fn;

    fn empty() -> ChannelRegistry {
        ChannelRegistry::new(RegistryConfig::default())
    }

    #[test]
    fn test_register_and_build() {
        let mut registry = empty();
        registry.register("alpha", "a", templates::TRANSACTION).unwrap();
        registry.register("beta", "b", templates::TRANSACTION_HASH).unwrap();

        let channels = registry.build();

        assert_eq!(channels.len(), 2);
        assert_eq!(channels.names(), vec!["alpha", "beta"]);
        assert_eq!(channels.get("alpha").unwrap().marker(), b'a');
    }

    #[test]
    fn test_duplicate_channel_name() {
        let mut registry = empty();
        registry.register("alpha", "a", templates::TRANSACTION).unwrap();

        let result = registry.register("alpha", "z", templates::TRANSACTION);

        assert_eq!(
            result,
            Err(RegistryError::DuplicateChannelName("alpha".into()))
        );
    }

    #[test]
    fn test_duplicate_marker() {
        let mut registry = empty();
        registry.register("alpha", "a", templates::TRANSACTION).unwrap();

        let result = registry.register("other", "a", templates::TRANSACTION);

        assert_eq!(
            result,
            Err(RegistryError::DuplicateMarker {
                marker: 'a',
                channel: "alpha".into()
            })
        );
    }

    #[test]
    fn test_invalid_marker() {
        let mut registry = empty();

        for marker in ["", "ab", "é"] {
            let result = registry.register("alpha", marker, templates::TRANSACTION);
            assert_eq!(result, Err(RegistryError::InvalidMarker(marker.into())));
        }
    }

    #[test]
    fn test_unknown_template() {
        let mut registry = empty();

        let result = registry.register("alpha", "a", "doesNotExist");

        assert_eq!(
            result,
            Err(RegistryError::UnknownHandlerTemplate("doesNotExist".into()))
        );
        // A failed registration does not consume the marker
        registry.register("alpha", "a", templates::TRANSACTION).unwrap();
    }

    #[test]
    fn test_direct_handler() {
        let mut registry = empty();
        let handler = handler_fn(|_codec, _topic, _frames, emit| {
            emit(Event::new("custom", serde_json::Value::Null));
            Ok(())
        });
        registry.register("custom", "x", handler).unwrap();

        let channels = registry.build();
        let mut events = Vec::new();
        channels
            .get("custom")
            .unwrap()
            .handler()
            .handle(
                &RawCodec,
                &Topic::from_marker(b'x'),
                &[],
                &mut |event| events.push(event),
            )
            .unwrap();

        assert_eq!(events[0].event_type, "custom");
    }

    #[test]
    fn test_require_address_policy() {
        let config = RegistryConfig::default().require_address(true);
        let mut registry = ChannelRegistry::new(config);
        registry.register("alpha", "a", templates::TRANSACTION).unwrap();
        registry
            .register_with("block", "b", ParamKind::None, templates::BLOCK_HEADER)
            .unwrap();

        let channels = registry.build();

        assert_eq!(
            channels.get("alpha").unwrap().filter(None),
            Err(RegistryError::MissingSubscriptionParameter("alpha".into()))
        );
        // Parameterless channels are unaffected
        assert_eq!(
            channels.get("block").unwrap().filter(None).unwrap().as_bytes(),
            &[b'b']
        );
    }

    #[test]
    fn test_allow_bare_policy() {
        let mut registry = empty();
        registry.register("alpha", "a", templates::TRANSACTION).unwrap();

        let topic = registry.build().get("alpha").unwrap().filter(None).unwrap();

        assert_eq!(topic.as_bytes(), &[0x61]);
    }

    #[test]
    fn test_duplicate_resolver() {
        let mut registry = empty();
        let resolver = resolver_fn(|topic, _| topic.clone());
        registry
            .add_resolver(Topic::from_marker(b'c'), resolver.clone())
            .unwrap();

        let result = registry.add_resolver(Topic::from_marker(b'c'), resolver);

        assert_eq!(
            result,
            Err(RegistryError::DuplicateResolver(Topic::from_marker(b'c')))
        );
    }

    #[test]
    fn test_frozen_after_build() {
        let mut registry = empty();
        let _ = registry.build_resolvers();

        assert!(registry.is_frozen());
        assert_eq!(
            registry.register("alpha", "a", templates::TRANSACTION),
            Err(RegistryError::RegistryFrozen)
        );
        assert_eq!(
            registry.add_resolver(Topic::from_marker(b'c'), resolver_fn(|t, _| t.clone())),
            Err(RegistryError::RegistryFrozen)
        );
    }

    #[test]
    fn test_default_channels() {
        let mut registry = ChannelRegistry::with_default_channels(RegistryConfig::default()).unwrap();
        let channels = registry.build();
        let resolvers = registry.build_resolvers();

        assert_eq!(channels.len(), 9);
        assert_eq!(resolvers.len(), 1);

        let receipt = Bytes::from_static(&[0x43, 0x21, 0x00]);
        let topic = resolvers
            .resolve(Topic::from_marker(b'e'), &[receipt])
            .unwrap();
        assert_eq!(
            channels.get("receipts").unwrap().filter(Some("0x2143")).unwrap(),
            topic
        );
    }
}
