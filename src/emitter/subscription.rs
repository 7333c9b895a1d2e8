//! Subscription bookkeeping
//!
//! Every `on` call returns a [`SubscriptionHandle`]. Removing a channel's
//! listeners invalidates their handles; dispatch checks the handle before
//! each invocation, so a message already in flight when the channel is
//! removed is not delivered to the removed listener.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::codec::Event;
use crate::registry::ChannelDescriptor;
use crate::topic::Topic;

/// Callback receiving channel events
pub type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

/// Token identifying one attached listener
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    key: String,
    id: u64,
    active: Arc<AtomicBool>,
}

impl SubscriptionHandle {
    pub(super) fn new(key: String, id: u64) -> Self {
        Self {
            key,
            id,
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Key the listener was attached under
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether the listener will still receive events
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub(super) fn invalidate(&self) {
        self.active.store(false, Ordering::Release);
    }
}

/// Listener paired with its handle
#[derive(Clone)]
pub(super) struct ListenerEntry {
    pub(super) handle: SubscriptionHandle,
    listener: Listener,
}

impl ListenerEntry {
    pub(super) fn new(handle: SubscriptionHandle, listener: Listener) -> Self {
        Self { handle, listener }
    }

    /// Invoke the listener if its handle is still valid
    pub(super) fn notify(&self, event: &Event) -> bool {
        if !self.handle.is_active() {
            return false;
        }
        (self.listener)(event);
        true
    }
}

/// One bookkept channel subscription on the upstream transport
pub(super) struct Subscription {
    pub(super) topic: Topic,

    /// Upstream topics held for this channel (its own topic first)
    pub(super) upstream: Vec<Topic>,
    pub(super) descriptor: Arc<ChannelDescriptor>,
    pub(super) listeners: Vec<ListenerEntry>,
}

impl Subscription {
    pub(super) fn new(topic: Topic, upstream: Vec<Topic>, descriptor: Arc<ChannelDescriptor>) -> Self {
        Self {
            topic,
            upstream,
            descriptor,
            listeners: Vec::new(),
        }
    }

    /// Invalidate every listener handle
    pub(super) fn invalidate(&self) {
        for entry in &self.listeners {
            entry.handle.invalidate();
        }
    }
}
