//! Loopback bridge demo
//!
//! Run with: cargo run --example loopback_bridge [CONFIG_JSON]
//!
//! Wires the default channel registry to an emitter backed by an in-process
//! loopback transport, then plays the node's role: it publishes a status
//! notification and an anonymous receipt, and pushes a few transaction
//! buffers through the outbound cache into a pool that only logs writes.
//!
//! ```text
//!   LoopbackPeer ──publish──► MultisocketEmitter ──► listeners (stdout)
//!
//!   add_transaction_buffer ×3 ──► OutboundCache ──flush──► LoggingPool
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};

use node_bridge::cache::{Connection, ConnectionPool, OutboundCache, Packet, PoolError};
use node_bridge::codec::RawCodec;
use node_bridge::emitter::{LoopbackFactory, MultisocketEmitter};
use node_bridge::registry::ChannelRegistry;
use node_bridge::topic::{encode_param, ParamKind};
use node_bridge::{BridgeConfig, Topic};

const ADDRESS: &str = "9826D27E1D0A26CA4E316F901E23E55C8711DB20DF5C49B5E0";

/// Pool whose connections log every write
struct LoggingPool;

struct LoggingConnection;

#[async_trait]
impl Connection for LoggingConnection {
    async fn send(&mut self, buffer: Bytes) -> Result<(), PoolError> {
        tracing::info!(bytes = buffer.len(), "Node received transaction batch");
        Ok(())
    }

    async fn push_pull(&mut self, _buffer: Bytes, timeout: Duration) -> Result<Packet, PoolError> {
        Err(PoolError::Timeout(timeout))
    }
}

#[async_trait]
impl ConnectionPool for LoggingPool {
    async fn lease(&self) -> Result<Box<dyn Connection>, PoolError> {
        Ok(Box::new(LoggingConnection))
    }

    async fn single_use(&self) -> Result<Box<dyn Connection>, PoolError> {
        Ok(Box::new(LoggingConnection))
    }
}

fn status_frame(deadline: u64, status: u32) -> Bytes {
    let mut buf = BytesMut::with_capacity(44);
    buf.put_slice(&[0xAB; 32]);
    buf.put_u64_le(deadline);
    buf.put_u32_le(status);
    buf.freeze()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("node_bridge=debug".parse()?)
                .add_directive("loopback_bridge=debug".parse()?),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => BridgeConfig::load(path).await?,
        None => BridgeConfig::default(),
    };

    let mut registry = ChannelRegistry::with_default_channels(config.registry.clone())?;
    let factory = Arc::new(LoopbackFactory::new());
    let emitter = MultisocketEmitter::new(
        registry.build(),
        registry.build_resolvers(),
        Arc::new(RawCodec),
        factory.clone(),
        config.emitter.clone(),
    );

    let status_key = format!("status/{}", ADDRESS);
    emitter.on(&status_key, |event| println!("status   -> {}", event.to_json()))?;
    emitter.on("receipts", |event| println!("receipts -> {}", event.to_json()))?;
    emitter.on(&format!("{}.closed", status_key), |event| {
        println!("closed   -> {}", event.to_json())
    })?;

    let peer = factory.latest().ok_or("transport was not created")?;
    peer.connected();

    let status_topic = Topic::with_param(b's', &encode_param(ParamKind::Address, ADDRESS)?);
    peer.publish(status_topic, vec![status_frame(1_234_567, 0)]);

    // Receipts are published under the bare marker and resolved by entity type
    let mut receipt = BytesMut::new();
    receipt.put_u16_le(0xE134);
    receipt.put_slice(b"receipt body");
    peer.publish(Topic::from_marker(b'e'), vec![receipt.freeze()]);

    tokio::time::sleep(Duration::from_millis(50)).await;

    let cache = OutboundCache::new(Arc::new(LoggingPool), config.cache.clone());
    for payload in [&b"tx-one"[..], b"tx-two", b"tx-three"] {
        cache.add_transaction_buffer(Bytes::from_static(payload));
    }
    tokio::time::sleep(config.cache.flush_frequency + Duration::from_millis(100)).await;

    let removed = emitter.remove_all_listeners(&status_key)?;
    tracing::info!(removed, stats = ?emitter.stats(), "Unsubscribed status");
    tracing::info!(stats = ?cache.stats(), "Cache finished");

    emitter.close();
    Ok(())
}
