//! Upstream transport seam
//!
//! The publish-subscribe socket to the node is an external collaborator. A
//! [`TransportFactory`] creates one instance per emitter lifecycle; the
//! instance is driven through [`TransportControl`] and reports lifecycle
//! events and messages on an unbounded channel in delivery order.

use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::topic::Topic;

use super::config::EmitterConfig;

/// Transport error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Transport could not be created
    #[error("socket unavailable: {0}")]
    SocketUnavailable(String),

    /// Operation on a transport that has been closed
    #[error("socket closed")]
    Closed,
}

/// Discrete lifecycle notifications from the transport monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    Connecting,
    Connected,
    Disconnected,
    ConnectError,
    BindError,
    AcceptError,
    Closing,
    Closed,
}

/// Log severity assigned to a lifecycle event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
}

impl LifecycleEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleEvent::Connecting => "connecting",
            LifecycleEvent::Connected => "connected",
            LifecycleEvent::Disconnected => "disconnected",
            LifecycleEvent::ConnectError => "connect error",
            LifecycleEvent::BindError => "bind error",
            LifecycleEvent::AcceptError => "accept error",
            LifecycleEvent::Closing => "closing",
            LifecycleEvent::Closed => "closed",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            LifecycleEvent::Connecting => Severity::Debug,
            LifecycleEvent::Connected | LifecycleEvent::Closing | LifecycleEvent::Closed => {
                Severity::Info
            }
            LifecycleEvent::Disconnected => Severity::Warn,
            LifecycleEvent::ConnectError | LifecycleEvent::BindError | LifecycleEvent::AcceptError => {
                Severity::Error
            }
        }
    }

    /// Whether the transport is unusable after this event
    ///
    /// Connect, bind and accept errors are retried by the transport itself;
    /// the connect watchdog covers the case where retries never succeed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleEvent::Disconnected | LifecycleEvent::Closed)
    }
}

/// Event delivered by a transport instance
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Lifecycle change reported by the transport monitor
    Lifecycle(LifecycleEvent),
    /// Multipart message: topic frame followed by payload frames
    Message(Vec<Bytes>),
    /// Socket-level error; the transport is unusable afterwards
    Error(String),
}

/// Control half of a transport instance
pub trait TransportControl: Send {
    /// Start receiving messages whose topic starts with `topic`
    fn subscribe(&mut self, topic: &Topic) -> Result<(), TransportError>;

    /// Stop receiving messages for a previously subscribed topic
    fn unsubscribe(&mut self, topic: &Topic) -> Result<(), TransportError>;

    /// Close the transport; must be idempotent
    fn close(&mut self);
}

/// A freshly created transport instance
pub struct TransportHandle {
    pub control: Box<dyn TransportControl>,
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Creates upstream transport instances
///
/// The transport owns its connection and lifecycle monitor; `create` receives
/// the emitter's options so it can apply `endpoint` and `monitor_interval`.
pub trait TransportFactory: Send + Sync {
    fn create(&self, config: &EmitterConfig) -> Result<TransportHandle, TransportError>;
}

#[derive(Debug, Default)]
struct LoopbackState {
    subscriptions: Vec<Topic>,
    closed: bool,
}

/// In-process end of a loopback transport
///
/// Plays the node's role: inject lifecycle events and messages, and inspect
/// what the emitter subscribed to.
#[derive(Clone)]
pub struct LoopbackPeer {
    tx: mpsc::UnboundedSender<TransportEvent>,
    state: Arc<Mutex<LoopbackState>>,
    config: Arc<EmitterConfig>,
}

impl LoopbackPeer {
    /// Options the transport was created with
    pub fn config(&self) -> &EmitterConfig {
        &self.config
    }

    /// Deliver an event; returns false once the emitter stopped listening
    pub fn send(&self, event: TransportEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn connected(&self) -> bool {
        self.send(TransportEvent::Lifecycle(LifecycleEvent::Connected))
    }

    /// Publish a message if any subscription prefixes its topic
    ///
    /// Mirrors the prefix filtering a real publish-subscribe socket performs.
    pub fn publish(&self, topic: Topic, frames: Vec<Bytes>) -> bool {
        let matched = {
            let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            !state.closed
                && state
                    .subscriptions
                    .iter()
                    .any(|s| topic.as_bytes().starts_with(s.as_bytes()))
        };
        if !matched {
            return false;
        }

        let mut message = Vec::with_capacity(1 + frames.len());
        message.push(topic.into_bytes());
        message.extend(frames);
        self.send(TransportEvent::Message(message))
    }

    /// Topics currently subscribed on this transport
    pub fn subscriptions(&self) -> Vec<Topic> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .subscriptions
            .clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .closed
    }
}

struct LoopbackControl {
    state: Arc<Mutex<LoopbackState>>,
}

impl TransportControl for LoopbackControl {
    fn subscribe(&mut self, topic: &Topic) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.closed {
            return Err(TransportError::Closed);
        }
        state.subscriptions.push(topic.clone());
        Ok(())
    }

    fn unsubscribe(&mut self, topic: &Topic) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.closed {
            return Err(TransportError::Closed);
        }
        if let Some(index) = state.subscriptions.iter().position(|s| s == topic) {
            state.subscriptions.remove(index);
        }
        Ok(())
    }

    fn close(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.closed = true;
        state.subscriptions.clear();
    }
}

#[derive(Default)]
struct LoopbackRegistry {
    peers: Vec<LoopbackPeer>,
    fail_next: Option<String>,
}

/// Channel-backed transport factory for demos and tests
///
/// Every created transport is recorded; its peer is available through
/// [`LoopbackFactory::peer`] and [`LoopbackFactory::latest`].
#[derive(Clone, Default)]
pub struct LoopbackFactory {
    inner: Arc<Mutex<LoopbackRegistry>>,
}

impl LoopbackFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `create` call fail with `SocketUnavailable`
    pub fn fail_next(&self, reason: impl Into<String>) {
        self.lock().fail_next = Some(reason.into());
    }

    /// Number of transports created so far
    pub fn created(&self) -> usize {
        self.lock().peers.len()
    }

    pub fn peer(&self, index: usize) -> Option<LoopbackPeer> {
        self.lock().peers.get(index).cloned()
    }

    /// Peer of the most recently created transport
    pub fn latest(&self) -> Option<LoopbackPeer> {
        self.lock().peers.last().cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LoopbackRegistry> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TransportFactory for LoopbackFactory {
    fn create(&self, config: &EmitterConfig) -> Result<TransportHandle, TransportError> {
        let mut registry = self.lock();
        if let Some(reason) = registry.fail_next.take() {
            return Err(TransportError::SocketUnavailable(reason));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let state = Arc::new(Mutex::new(LoopbackState::default()));
        registry.peers.push(LoopbackPeer {
            tx,
            state: Arc::clone(&state),
            config: Arc::new(config.clone()),
        });

        Ok(TransportHandle {
            control: Box::new(LoopbackControl { state }),
            events: rx,
        })
    }
}
