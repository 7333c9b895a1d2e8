//! Multisocket emitter implementation

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::codec::{Event, PayloadCodec};
use crate::registry::{ChannelDescriptor, ChannelMap, RegistryError, ResolverTable};
use crate::stats::{EmitterCounters, EmitterStats};
use crate::topic::{split_sub_event, ChannelKey, SubEvent, Topic};

use super::config::EmitterConfig;
use super::monitor::LifecycleMonitor;
use super::socket::UpstreamSocket;
use super::subscription::{Listener, ListenerEntry, Subscription, SubscriptionHandle};
use super::transport::{
    LifecycleEvent, TransportError, TransportEvent, TransportFactory, TransportHandle,
};
use super::EmitterError;

/// Event type delivered to `<key>.closed` listeners
pub const CHANNEL_CLOSED_EVENT: &str = "channelClosed";

#[derive(Default)]
struct EmitterState {
    socket: UpstreamSocket,

    /// Channel subscriptions keyed by normalized channel key
    subscriptions: HashMap<String, Subscription>,

    /// Subscription keys by topic, for exact-match dispatch
    topic_index: HashMap<Topic, Vec<String>>,

    /// Sub-event listeners keyed by full sub-event key
    sub_events: HashMap<String, Vec<ListenerEntry>>,

    /// Upstream topic subscriptions with the number of channels needing each
    upstream: HashMap<Topic, usize>,
}

struct DispatchTarget {
    key: String,
    descriptor: Arc<ChannelDescriptor>,
    listeners: Vec<ListenerEntry>,
}

impl EmitterState {
    /// Subscriptions listening for `topic`: exact matches first, then the
    /// bare-marker subscription of the same channel
    fn targets(&self, topic: &Topic) -> Vec<DispatchTarget> {
        let mut keys: Vec<&String> = Vec::new();
        if let Some(exact) = self.topic_index.get(topic) {
            keys.extend(exact);
        }
        if !topic.is_bare() {
            if let Some(bare) = topic.bare().and_then(|bare| self.topic_index.get(&bare)) {
                keys.extend(bare);
            }
        }

        keys.into_iter()
            .filter_map(|key| {
                self.subscriptions.get(key).map(|sub| DispatchTarget {
                    key: key.clone(),
                    descriptor: Arc::clone(&sub.descriptor),
                    listeners: sub.listeners.clone(),
                })
            })
            .collect()
    }

    /// Subscribe upstream topics not yet held; all or nothing
    fn acquire_upstream(&mut self, topics: &[Topic]) -> Result<(), TransportError> {
        for (index, topic) in topics.iter().enumerate() {
            let count = self.upstream.get(topic).copied().unwrap_or(0);
            if count == 0 {
                if let Err(e) = self.socket.subscribe(topic) {
                    self.release_upstream(&topics[..index]);
                    return Err(e);
                }
            }
            self.upstream.insert(topic.clone(), count + 1);
        }
        Ok(())
    }

    /// Drop one reference per topic, unsubscribing topics nobody needs
    fn release_upstream(&mut self, topics: &[Topic]) {
        for topic in topics {
            let remaining = match self.upstream.get_mut(topic) {
                Some(count) => {
                    *count -= 1;
                    *count
                }
                None => continue,
            };
            if remaining > 0 {
                continue;
            }

            self.upstream.remove(topic);
            if let Err(e) = self.socket.unsubscribe(topic) {
                tracing::debug!(topic = %topic, error = %e, "Upstream unsubscribe failed");
            }
        }
    }

    fn unindex(&mut self, topic: &Topic, key: &str) {
        if let Some(keys) = self.topic_index.get_mut(topic) {
            keys.retain(|k| k != key);
            if keys.is_empty() {
                self.topic_index.remove(topic);
            }
        }
    }
}

struct Inner {
    channels: ChannelMap,
    resolvers: ResolverTable,
    codec: Arc<dyn PayloadCodec>,
    factory: Arc<dyn TransportFactory>,
    config: EmitterConfig,
    state: Mutex<EmitterState>,
    monitor: Mutex<LifecycleMonitor>,
    next_listener_id: AtomicU64,
    counters: EmitterCounters,
}

/// Demultiplexes one upstream transport into per-channel listeners
///
/// Cheap to clone; clones share the transport and bookkeeping. Must be used
/// from within a tokio runtime, which hosts the transport reader and the
/// connect watchdog.
#[derive(Clone)]
pub struct MultisocketEmitter {
    inner: Arc<Inner>,
}

impl MultisocketEmitter {
    /// Create an emitter over built registry snapshots
    pub fn new(
        channels: ChannelMap,
        resolvers: ResolverTable,
        codec: Arc<dyn PayloadCodec>,
        factory: Arc<dyn TransportFactory>,
        config: EmitterConfig,
    ) -> Self {
        let monitor = LifecycleMonitor::new(config.endpoint.clone(), config.monitor_logging_throttle);

        Self {
            inner: Arc::new(Inner {
                channels,
                resolvers,
                codec,
                factory,
                config,
                state: Mutex::new(EmitterState::default()),
                monitor: Mutex::new(monitor),
                next_listener_id: AtomicU64::new(1),
                counters: EmitterCounters::default(),
            }),
        }
    }

    /// Attach a listener to a channel key (`name` or `name/param`) or to a
    /// sub-event key (`<key>.closed`)
    ///
    /// The first listener for a channel key computes its topic, subscribes it
    /// on the upstream transport and creates the transport if absent.
    /// Sub-event listeners never touch subscription bookkeeping.
    pub fn on<F>(&self, key: &str, listener: F) -> Result<SubscriptionHandle, EmitterError>
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let listener: Listener = Arc::new(listener);

        if let Some((base, sub_event)) = split_sub_event(key) {
            let full_key = sub_event.key_for(&ChannelKey::parse(base).to_string());
            let handle = self.inner.new_handle(&full_key);
            self.inner
                .lock_state()
                .sub_events
                .entry(full_key)
                .or_default()
                .push(ListenerEntry::new(handle.clone(), listener));
            return Ok(handle);
        }

        let channel_key = ChannelKey::parse(key);
        let key = channel_key.to_string();
        let mut state = self.inner.lock_state();

        if !state.subscriptions.contains_key(&key) {
            let descriptor = self
                .inner
                .channels
                .get(channel_key.channel())
                .cloned()
                .ok_or_else(|| RegistryError::UnknownChannel(channel_key.channel().to_string()))?;
            let topic = descriptor.filter(channel_key.param())?;
            let upstream = self.inner.upstream_topics(&topic);

            self.inner.ensure_socket(&mut state)?;
            if let Err(e) = state.acquire_upstream(&upstream) {
                if state.subscriptions.is_empty() && state.socket.close() {
                    state.upstream.clear();
                    EmitterCounters::incr(&self.inner.counters.transports_closed);
                }
                return Err(e.into());
            }

            tracing::debug!(
                key = %key,
                topic = %topic,
                upstream = upstream.len(),
                "Channel subscribed"
            );
            state
                .topic_index
                .entry(topic.clone())
                .or_default()
                .push(key.clone());
            state
                .subscriptions
                .insert(key.clone(), Subscription::new(topic, upstream, descriptor));
        }

        let handle = self.inner.new_handle(&key);
        if let Some(subscription) = state.subscriptions.get_mut(&key) {
            subscription
                .listeners
                .push(ListenerEntry::new(handle.clone(), listener));
        }
        Ok(handle)
    }

    /// Remove every listener of a channel key
    ///
    /// `<key>.closed` listeners are notified first, then the subscription is
    /// dropped from bookkeeping and unsubscribed upstream. Removing the last
    /// subscription closes the transport. Returns the number of channel
    /// listeners removed.
    pub fn remove_all_listeners(&self, key: &str) -> Result<usize, EmitterError> {
        if split_sub_event(key).is_some() {
            return Err(EmitterError::SubEventKey(key.to_string()));
        }

        let key = ChannelKey::parse(key).to_string();
        let closing = self
            .inner
            .lock_state()
            .sub_events
            .remove(&SubEvent::Closed.key_for(&key))
            .unwrap_or_default();
        notify_closed(&key, &closing);

        let mut state = self.inner.lock_state();
        let Some(subscription) = state.subscriptions.remove(&key) else {
            return Ok(0);
        };

        subscription.invalidate();
        state.unindex(&subscription.topic, &key);
        state.release_upstream(&subscription.upstream);
        tracing::debug!(key = %key, remaining = state.subscriptions.len(), "Channel unsubscribed");

        if state.subscriptions.is_empty() && state.socket.close() {
            EmitterCounters::incr(&self.inner.counters.transports_closed);
            tracing::info!(endpoint = %self.inner.config.endpoint, "Last subscription removed, transport closed");
        }

        Ok(subscription.listeners.len())
    }

    /// Number of listeners attached to a channel or sub-event key
    pub fn listener_count(&self, key: &str) -> usize {
        let state = self.inner.lock_state();

        match split_sub_event(key) {
            Some((base, sub_event)) => {
                let full_key = sub_event.key_for(&ChannelKey::parse(base).to_string());
                state.sub_events.get(&full_key).map_or(0, Vec::len)
            }
            None => state
                .subscriptions
                .get(&ChannelKey::parse(key).to_string())
                .map_or(0, |sub| sub.listeners.len()),
        }
    }

    /// Number of channel subscriptions held on the upstream transport
    pub fn zsocket_count(&self) -> usize {
        self.inner.lock_state().subscriptions.len()
    }

    /// Whether the upstream transport currently exists
    pub fn is_open(&self) -> bool {
        self.inner.lock_state().socket.is_open()
    }

    /// Close the transport and clear all bookkeeping; idempotent
    pub fn close(&self) {
        self.inner.teardown(None, "closed by caller");
    }

    /// Get emitter statistics
    pub fn stats(&self) -> EmitterStats {
        self.inner.counters.snapshot()
    }

    pub fn channels(&self) -> &ChannelMap {
        &self.inner.channels
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, EmitterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn new_handle(&self, key: &str) -> SubscriptionHandle {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        SubscriptionHandle::new(key.to_string(), id)
    }

    /// Topics to subscribe upstream for a channel topic: the topic itself
    /// plus every raw topic a resolver chain can rewrite into its marker
    fn upstream_topics(&self, topic: &Topic) -> Vec<Topic> {
        let mut topics = vec![topic.clone()];
        if let Some(marker) = topic.marker() {
            for source in self.resolvers.source_topics(marker) {
                if !topics.contains(&source) {
                    topics.push(source);
                }
            }
        }
        topics
    }

    /// Create the upstream transport and its tasks if absent
    fn ensure_socket(self: &Arc<Self>, state: &mut EmitterState) -> Result<(), TransportError> {
        if state.socket.is_open() {
            return Ok(());
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| TransportError::SocketUnavailable(e.to_string()))?;
        let (generation, TransportHandle { control, events }) =
            state.socket.open(self.factory.as_ref(), &self.config)?;

        let reader = runtime.spawn(run_reader(Arc::downgrade(self), generation, events));
        let watchdog = runtime.spawn(run_watchdog(
            Arc::downgrade(self),
            generation,
            self.config.connect_timeout,
        ));
        state.socket.attach(generation, control, reader, watchdog);

        EmitterCounters::incr(&self.counters.transports_created);
        tracing::info!(
            endpoint = %self.config.endpoint,
            generation = generation,
            "Upstream transport created"
        );
        Ok(())
    }

    fn observe(&self, event: LifecycleEvent) {
        self.monitor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .observe(event);
    }

    /// Close the transport and clear bookkeeping
    ///
    /// With `Some(generation)` nothing happens unless that generation is the
    /// open transport. `<key>.closed` listeners are notified after the state
    /// lock is released.
    fn teardown(&self, generation: Option<u64>, reason: &str) -> bool {
        let sub_events = {
            let mut state = self.lock_state();
            if let Some(generation) = generation {
                if !state.socket.is_current(generation) {
                    return false;
                }
            }

            let was_open = state.socket.close();
            let subscriptions = std::mem::take(&mut state.subscriptions);
            state.topic_index.clear();
            state.upstream.clear();
            let sub_events = std::mem::take(&mut state.sub_events);

            if !was_open && subscriptions.is_empty() && sub_events.is_empty() {
                return false;
            }

            for subscription in subscriptions.values() {
                subscription.invalidate();
            }
            if was_open {
                EmitterCounters::incr(&self.counters.transports_closed);
            }

            tracing::info!(
                endpoint = %self.config.endpoint,
                reason = reason,
                subscriptions = subscriptions.len(),
                "Upstream transport torn down"
            );
            sub_events
        };

        for (key, listeners) in &sub_events {
            let base = split_sub_event(key).map_or(key.as_str(), |(base, _)| base);
            notify_closed(base, listeners);
        }
        true
    }

    fn on_connected(&self, generation: u64) {
        self.lock_state().socket.mark_connected(generation);
    }

    fn on_connect_timeout(&self, generation: u64) {
        let expired = {
            let state = self.lock_state();
            state.socket.is_current(generation) && !state.socket.is_connected()
        };
        if !expired {
            return;
        }

        EmitterCounters::incr(&self.counters.connect_timeouts);
        tracing::warn!(
            endpoint = %self.config.endpoint,
            timeout_ms = self.config.connect_timeout.as_millis() as u64,
            "Transport did not connect in time"
        );
        self.teardown(Some(generation), "connect timeout");
    }

    /// Resolve, match and hand one message to its handlers
    fn dispatch(&self, generation: u64, frames: Vec<Bytes>) {
        EmitterCounters::incr(&self.counters.messages_received);

        let Some((raw, rest)) = frames.split_first() else {
            tracing::debug!("Ignoring empty message");
            return;
        };

        let topic = match self.resolvers.resolve(Topic::new(raw.clone()), rest) {
            Ok(topic) => topic,
            Err(e) => {
                EmitterCounters::incr(&self.counters.dropped_unresolvable);
                tracing::warn!(error = %e, "Dropping message");
                return;
            }
        };

        let targets = {
            let state = self.lock_state();
            if !state.socket.is_current(generation) {
                return;
            }
            state.targets(&topic)
        };

        if targets.is_empty() {
            EmitterCounters::incr(&self.counters.dropped_unmatched);
            tracing::trace!(topic = %topic, "No subscription for topic");
            return;
        }
        EmitterCounters::incr(&self.counters.messages_dispatched);

        for target in targets {
            let mut emit = |event: Event| {
                for entry in &target.listeners {
                    entry.notify(&event);
                }
            };

            if let Err(e) =
                target
                    .descriptor
                    .handler()
                    .handle(self.codec.as_ref(), &topic, rest, &mut emit)
            {
                EmitterCounters::incr(&self.counters.handler_errors);
                tracing::warn!(
                    channel = target.descriptor.name(),
                    key = %target.key,
                    error = %e,
                    "Failed to decode message"
                );
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        state.socket.close();
    }
}

fn notify_closed(key: &str, listeners: &[ListenerEntry]) {
    if listeners.is_empty() {
        return;
    }

    let event = Event::new(CHANNEL_CLOSED_EVENT, serde_json::json!({ "channel": key }));
    for entry in listeners {
        entry.notify(&event);
        entry.handle.invalidate();
    }
}

async fn run_reader(
    inner: Weak<Inner>,
    generation: u64,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
) {
    while let Some(event) = events.recv().await {
        let Some(inner) = inner.upgrade() else {
            return;
        };

        match event {
            TransportEvent::Message(frames) => inner.dispatch(generation, frames),
            TransportEvent::Lifecycle(lifecycle) => {
                inner.observe(lifecycle);
                if lifecycle == LifecycleEvent::Connected {
                    inner.on_connected(generation);
                }
                if lifecycle.is_terminal() {
                    inner.teardown(Some(generation), lifecycle.as_str());
                    return;
                }
            }
            TransportEvent::Error(message) => {
                tracing::error!(endpoint = %inner.config.endpoint, error = %message, "Transport error");
                inner.teardown(Some(generation), "transport error");
                return;
            }
        }
    }

    if let Some(inner) = inner.upgrade() {
        inner.teardown(Some(generation), "event stream ended");
    }
}

async fn run_watchdog(inner: Weak<Inner>, generation: u64, timeout: Duration) {
    tokio::time::sleep(timeout).await;

    if let Some(inner) = inner.upgrade() {
        inner.on_connect_timeout(generation);
    }
}
