//! Channel descriptors
//!
//! A descriptor pairs a topic filter (subscription parameter → topic) with a
//! handler (message frames → events). Descriptors are created once at
//! registration time and shared read-only with the emitter.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::codec::{CodecError, Event, PayloadCodec};
use crate::topic::{encode_param, Marker, ParamKind, Topic};

use super::error::RegistryError;

/// Decodes the frames of a message published on a channel into events
///
/// `frames` are the message frames following the topic frame. The handler
/// calls `emit` once per event it produces (usually exactly once).
pub trait ChannelHandler: Send + Sync {
    fn handle(
        &self,
        codec: &dyn PayloadCodec,
        topic: &Topic,
        frames: &[Bytes],
        emit: &mut dyn FnMut(Event),
    ) -> Result<(), CodecError>;
}

struct FnHandler<F>(F);

impl<F> ChannelHandler for FnHandler<F>
where
    F: Fn(&dyn PayloadCodec, &Topic, &[Bytes], &mut dyn FnMut(Event)) -> Result<(), CodecError>
        + Send
        + Sync,
{
    fn handle(
        &self,
        codec: &dyn PayloadCodec,
        topic: &Topic,
        frames: &[Bytes],
        emit: &mut dyn FnMut(Event),
    ) -> Result<(), CodecError> {
        (self.0)(codec, topic, frames, emit)
    }
}

/// Wrap a closure as a channel handler
pub fn handler_fn<F>(f: F) -> Arc<dyn ChannelHandler>
where
    F: Fn(&dyn PayloadCodec, &Topic, &[Bytes], &mut dyn FnMut(Event)) -> Result<(), CodecError>
        + Send
        + Sync
        + 'static,
{
    Arc::new(FnHandler(f))
}

/// Handler passed to registration: a direct handler or a shared template name
#[derive(Clone)]
pub enum HandlerSpec {
    Template(String),
    Direct(Arc<dyn ChannelHandler>),
}

impl From<&str> for HandlerSpec {
    fn from(name: &str) -> Self {
        HandlerSpec::Template(name.to_string())
    }
}

impl From<String> for HandlerSpec {
    fn from(name: String) -> Self {
        HandlerSpec::Template(name)
    }
}

impl From<Arc<dyn ChannelHandler>> for HandlerSpec {
    fn from(handler: Arc<dyn ChannelHandler>) -> Self {
        HandlerSpec::Direct(handler)
    }
}

impl fmt::Debug for HandlerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerSpec::Template(name) => f.debug_tuple("Template").field(name).finish(),
            HandlerSpec::Direct(_) => f.write_str("Direct(..)"),
        }
    }
}

/// Filter factory bound to one channel's marker
#[derive(Debug, Clone)]
pub struct TopicFilter {
    channel: String,
    marker: Marker,
    kind: ParamKind,
    require_param: bool,
}

impl TopicFilter {
    pub(super) fn new(channel: &str, marker: Marker, kind: ParamKind, require_param: bool) -> Self {
        Self {
            channel: channel.to_string(),
            marker,
            kind,
            require_param,
        }
    }

    /// Compute the subscription topic: `marker ++ encode(param)`
    ///
    /// Without a parameter the bare marker is returned, unless the registry
    /// policy requires one for this channel's parameter kind.
    pub fn apply(&self, param: Option<&str>) -> Result<Topic, RegistryError> {
        match param.filter(|p| !p.is_empty()) {
            None if self.require_param => Err(RegistryError::MissingSubscriptionParameter(
                self.channel.clone(),
            )),
            None => Ok(Topic::from_marker(self.marker)),
            Some(param) => {
                let encoded = encode_param(self.kind, param).map_err(|e| {
                    RegistryError::InvalidSubscriptionParameter {
                        channel: self.channel.clone(),
                        reason: e.to_string(),
                    }
                })?;
                Ok(Topic::with_param(self.marker, &encoded))
            }
        }
    }

    pub fn param_kind(&self) -> ParamKind {
        self.kind
    }
}

/// Immutable description of a registered channel
pub struct ChannelDescriptor {
    name: String,
    marker: Marker,
    filter: TopicFilter,
    handler: Arc<dyn ChannelHandler>,
}

impl ChannelDescriptor {
    pub(super) fn new(
        name: &str,
        marker: Marker,
        filter: TopicFilter,
        handler: Arc<dyn ChannelHandler>,
    ) -> Self {
        Self {
            name: name.to_string(),
            marker,
            filter,
            handler,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn marker(&self) -> Marker {
        self.marker
    }

    /// Compute the subscription topic for an optional parameter
    pub fn filter(&self, param: Option<&str>) -> Result<Topic, RegistryError> {
        self.filter.apply(param)
    }

    pub fn topic_filter(&self) -> &TopicFilter {
        &self.filter
    }

    pub fn handler(&self) -> &Arc<dyn ChannelHandler> {
        &self.handler
    }
}

impl fmt::Debug for ChannelDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelDescriptor")
            .field("name", &self.name)
            .field("marker", &(self.marker as char))
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}

/// Snapshot of registered channels keyed by name
#[derive(Debug, Clone, Default)]
pub struct ChannelMap {
    channels: Arc<HashMap<String, Arc<ChannelDescriptor>>>,
}

impl ChannelMap {
    pub(super) fn new(channels: HashMap<String, Arc<ChannelDescriptor>>) -> Self {
        Self {
            channels: Arc::new(channels),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<ChannelDescriptor>> {
        self.channels.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.channels.contains_key(name)
    }

    /// Channel names in sorted order
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.channels.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}
