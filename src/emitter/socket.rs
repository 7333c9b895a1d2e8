//! Owned upstream socket
//!
//! Holds the single transport instance together with the tasks that serve
//! it. Each instance gets a new generation number; events and timers from an
//! older generation are ignored once it has been replaced or closed.

use tokio::task::JoinHandle;

use crate::topic::Topic;

use super::config::EmitterConfig;
use super::transport::{TransportControl, TransportError, TransportFactory, TransportHandle};

struct ActiveSocket {
    control: Box<dyn TransportControl>,
    generation: u64,
    connected: bool,
    reader: Option<JoinHandle<()>>,
    watchdog: Option<JoinHandle<()>>,
}

/// Slot for the emitter's upstream transport (absent or open)
#[derive(Default)]
pub(super) struct UpstreamSocket {
    active: Option<ActiveSocket>,
    next_generation: u64,
}

impl UpstreamSocket {
    pub(super) fn is_open(&self) -> bool {
        self.active.is_some()
    }

    /// Generation of the open transport
    pub(super) fn generation(&self) -> Option<u64> {
        self.active.as_ref().map(|s| s.generation)
    }

    pub(super) fn is_current(&self, generation: u64) -> bool {
        self.generation() == Some(generation)
    }

    pub(super) fn is_connected(&self) -> bool {
        self.active.as_ref().is_some_and(|s| s.connected)
    }

    /// Create a transport instance; the caller spawns its tasks
    pub(super) fn open(
        &mut self,
        factory: &dyn TransportFactory,
        config: &EmitterConfig,
    ) -> Result<(u64, TransportHandle), TransportError> {
        self.close();

        let handle = factory.create(config)?;
        let generation = self.next_generation;
        self.next_generation += 1;

        Ok((generation, handle))
    }

    /// Install a created transport with its reader and watchdog tasks
    pub(super) fn attach(
        &mut self,
        generation: u64,
        control: Box<dyn TransportControl>,
        reader: JoinHandle<()>,
        watchdog: JoinHandle<()>,
    ) {
        self.active = Some(ActiveSocket {
            control,
            generation,
            connected: false,
            reader: Some(reader),
            watchdog: Some(watchdog),
        });
    }

    /// Record the first successful connect and cancel the watchdog
    ///
    /// Returns true only for the first connect of the current generation.
    pub(super) fn mark_connected(&mut self, generation: u64) -> bool {
        match self.active.as_mut() {
            Some(socket) if socket.generation == generation && !socket.connected => {
                socket.connected = true;
                if let Some(watchdog) = socket.watchdog.take() {
                    watchdog.abort();
                }
                true
            }
            _ => false,
        }
    }

    pub(super) fn subscribe(&mut self, topic: &Topic) -> Result<(), TransportError> {
        match self.active.as_mut() {
            Some(socket) => socket.control.subscribe(topic),
            None => Err(TransportError::Closed),
        }
    }

    pub(super) fn unsubscribe(&mut self, topic: &Topic) -> Result<(), TransportError> {
        match self.active.as_mut() {
            Some(socket) => socket.control.unsubscribe(topic),
            None => Err(TransportError::Closed),
        }
    }

    /// Close the transport and stop its tasks; returns false if already absent
    pub(super) fn close(&mut self) -> bool {
        let Some(mut socket) = self.active.take() else {
            return false;
        };

        socket.control.close();
        if let Some(watchdog) = socket.watchdog.take() {
            watchdog.abort();
        }
        if let Some(reader) = socket.reader.take() {
            reader.abort();
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::transport::LoopbackFactory;

    #[tokio::test]
    async fn test_open_attach_close() {
        let factory = LoopbackFactory::new();
        let mut socket = UpstreamSocket::default();
        assert!(!socket.is_open());

        let (generation, handle) = socket.open(&factory, &EmitterConfig::default()).unwrap();
        let reader = tokio::spawn(async {});
        let watchdog = tokio::spawn(async {});
        socket.attach(generation, handle.control, reader, watchdog);

        assert!(socket.is_open());
        assert!(socket.is_current(generation));
        assert!(socket.subscribe(&Topic::from_marker(b'a')).is_ok());
        assert_eq!(factory.latest().unwrap().subscriptions().len(), 1);

        assert!(socket.mark_connected(generation));
        assert!(!socket.mark_connected(generation));
        assert!(socket.is_connected());

        assert!(socket.close());
        assert!(!socket.close());
        assert!(factory.latest().unwrap().is_closed());
        assert_eq!(
            socket.subscribe(&Topic::from_marker(b'a')),
            Err(TransportError::Closed)
        );
    }

    #[tokio::test]
    async fn test_generations_increase() {
        let factory = LoopbackFactory::new();
        let mut socket = UpstreamSocket::default();

        let (first, _) = socket.open(&factory, &EmitterConfig::default()).unwrap();
        let (second, _) = socket.open(&factory, &EmitterConfig::default()).unwrap();

        assert!(second > first);
        assert!(!socket.is_current(first));
    }
}
