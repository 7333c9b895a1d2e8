//! Connection pool seam
//!
//! The authenticated TCP connection pool to the node is an external
//! collaborator. A leased connection is released back to the pool when it
//! is dropped, so holding one is always scoped to a single operation.

use std::time::Duration;

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};

/// Connection pool error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    /// No connection could be acquired
    #[error("failed to lease connection: {0}")]
    Lease(String),

    /// Write or read on the connection failed
    #[error("connection i/o failed: {0}")]
    Io(String),

    /// No response within the allotted time
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Response could not be parsed as a packet
    #[error("malformed packet: {0}")]
    MalformedPacket(String),
}

/// Size of the packet header (`size: u32`, `type: u32`)
pub const PACKET_HEADER_SIZE: usize = 8;

/// Node packet: little-endian `size` and `type` header followed by the payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub packet_type: u32,
    pub payload: Bytes,
}

impl Packet {
    pub fn new(packet_type: u32, payload: impl Into<Bytes>) -> Self {
        Self {
            packet_type,
            payload: payload.into(),
        }
    }

    /// Serialize with header
    pub fn to_bytes(&self) -> Bytes {
        let size = PACKET_HEADER_SIZE + self.payload.len();
        let mut buf = BytesMut::with_capacity(size);
        buf.put_u32_le(size as u32);
        buf.put_u32_le(self.packet_type);
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    /// Parse a complete packet
    pub fn from_bytes(data: Bytes) -> Result<Self, PoolError> {
        if data.len() < PACKET_HEADER_SIZE {
            return Err(PoolError::MalformedPacket(format!(
                "{} bytes is shorter than the header",
                data.len()
            )));
        }

        let size = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
        if size != data.len() {
            return Err(PoolError::MalformedPacket(format!(
                "declared size {} but got {} bytes",
                size,
                data.len()
            )));
        }

        let packet_type = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
        Ok(Self {
            packet_type,
            payload: data.slice(PACKET_HEADER_SIZE..),
        })
    }
}

/// Connection to the node
#[async_trait]
pub trait Connection: Send {
    /// Write a buffer
    async fn send(&mut self, buffer: Bytes) -> Result<(), PoolError>;

    /// Write a buffer and wait for one response packet
    async fn push_pull(&mut self, buffer: Bytes, timeout: Duration) -> Result<Packet, PoolError>;
}

/// Pool of authenticated connections to the node
#[async_trait]
pub trait ConnectionPool: Send + Sync {
    /// Lease a pooled connection; released on drop
    async fn lease(&self) -> Result<Box<dyn Connection>, PoolError>;

    /// Open a connection that is closed on drop instead of being pooled
    async fn single_use(&self) -> Result<Box<dyn Connection>, PoolError>;
}

/// Send one request packet on a single-use connection and return the response
pub async fn request(
    pool: &dyn ConnectionPool,
    packet: &Packet,
    timeout: Duration,
) -> Result<Packet, PoolError> {
    let mut connection = pool.single_use().await?;
    let response = connection.push_pull(packet.to_bytes(), timeout).await;

    if let Err(ref e) = response {
        tracing::warn!(packet_type = packet.packet_type, error = %e, "Node request failed");
    }
    response
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tokio_test::{assert_err, assert_ok};

    use super::*;

    struct EchoConnection {
        sent: Arc<Mutex<Vec<Bytes>>>,
    }

    #[async_trait]
    impl Connection for EchoConnection {
        async fn send(&mut self, buffer: Bytes) -> Result<(), PoolError> {
            self.sent.lock().unwrap().push(buffer);
            Ok(())
        }

        async fn push_pull(&mut self, buffer: Bytes, timeout: Duration) -> Result<Packet, PoolError> {
            if timeout.is_zero() {
                return Err(PoolError::Timeout(timeout));
            }
            self.send(buffer.clone()).await?;
            Packet::from_bytes(buffer)
        }
    }

    #[derive(Default)]
    struct EchoPool {
        sent: Arc<Mutex<Vec<Bytes>>>,
    }

    #[async_trait]
    impl ConnectionPool for EchoPool {
        async fn lease(&self) -> Result<Box<dyn Connection>, PoolError> {
            Err(PoolError::Lease("pooled connections disabled".into()))
        }

        async fn single_use(&self) -> Result<Box<dyn Connection>, PoolError> {
            Ok(Box::new(EchoConnection {
                sent: Arc::clone(&self.sent),
            }))
        }
    }

    #[test]
    fn test_packet_layout() {
        let packet = Packet::new(0x105, Bytes::from_static(&[0xAA, 0xBB]));

        let bytes = packet.to_bytes();

        assert_eq!(
            &bytes[..],
            &[0x0A, 0, 0, 0, 0x05, 0x01, 0, 0, 0xAA, 0xBB]
        );
        assert_eq!(Packet::from_bytes(bytes).unwrap(), packet);
    }

    #[test]
    fn test_packet_rejects_bad_size() {
        assert_err!(Packet::from_bytes(Bytes::from_static(&[1, 2, 3])));
        assert_err!(Packet::from_bytes(Bytes::from_static(&[9, 0, 0, 0, 1, 0, 0, 0])));
    }

    #[tokio::test]
    async fn test_request_uses_single_use_connection() {
        let pool = EchoPool::default();
        let packet = Packet::new(7, Bytes::from_static(b"ping"));

        let response = assert_ok!(request(&pool, &packet, Duration::from_secs(1)).await);

        assert_eq!(response, packet);
        assert_eq!(pool.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_request_propagates_timeout() {
        let pool = EchoPool::default();
        let packet = Packet::new(7, Bytes::new());

        let result = request(&pool, &packet, Duration::ZERO).await;

        assert_eq!(result, Err(PoolError::Timeout(Duration::ZERO)));
    }
}
