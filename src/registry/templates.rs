//! Shared handler templates
//!
//! Most channels carry one of a handful of payload shapes. Registration can
//! refer to these by name instead of supplying a handler.

use std::sync::Arc;

use bytes::Bytes;
use serde_json::json;

use crate::codec::{BinaryParser, CodecError, Event, PayloadCodec};
use crate::topic::Topic;

use super::channel::{handler_fn, ChannelHandler};

pub const BLOCK_HEADER: &str = "blockHeader";
pub const TRANSACTION: &str = "transaction";
pub const TRANSACTION_HASH: &str = "transactionHash";
pub const TRANSACTION_STATUS: &str = "transactionStatus";
pub const COSIGNATURE: &str = "cosignature";
pub const RECEIPT: &str = "receipt";

/// Names of all shared templates
pub const TEMPLATE_NAMES: [&str; 6] = [
    BLOCK_HEADER,
    TRANSACTION,
    TRANSACTION_HASH,
    TRANSACTION_STATUS,
    COSIGNATURE,
    RECEIPT,
];

const HASH_SIZE: usize = 32;
const PUBLIC_KEY_SIZE: usize = 32;
const SIGNATURE_SIZE: usize = 64;

/// Look up a shared template by name
pub fn lookup(name: &str) -> Option<Arc<dyn ChannelHandler>> {
    let handler = match name {
        BLOCK_HEADER => handler_fn(block_header),
        TRANSACTION => handler_fn(transaction),
        TRANSACTION_HASH => handler_fn(transaction_hash),
        TRANSACTION_STATUS => handler_fn(transaction_status),
        COSIGNATURE => handler_fn(cosignature),
        RECEIPT => handler_fn(receipt),
        _ => return None,
    };
    Some(handler)
}

fn frame(frames: &[Bytes], index: usize) -> Result<&Bytes, CodecError> {
    frames.get(index).ok_or(CodecError::MissingFrame { index })
}

fn fixed_frame(frames: &[Bytes], index: usize, expected: usize) -> Result<&Bytes, CodecError> {
    let data = frame(frames, index)?;
    if data.len() != expected {
        return Err(CodecError::FrameSize {
            index,
            expected,
            actual: data.len(),
        });
    }
    Ok(data)
}

fn hex_frame(frames: &[Bytes], index: usize, expected: usize) -> Result<String, CodecError> {
    fixed_frame(frames, index, expected).map(hex::encode_upper)
}

fn block_header(
    codec: &dyn PayloadCodec,
    _topic: &Topic,
    frames: &[Bytes],
    emit: &mut dyn FnMut(Event),
) -> Result<(), CodecError> {
    let block = codec.deserialize(&mut BinaryParser::new(frame(frames, 0)?))?;
    let hash = hex_frame(frames, 1, HASH_SIZE)?;
    let generation_hash = hex_frame(frames, 2, HASH_SIZE)?;

    emit(Event::new(
        "blockHeaderWithMetadata",
        json!({
            "block": block,
            "meta": { "hash": hash, "generationHash": generation_hash },
        }),
    ));
    Ok(())
}

fn transaction(
    codec: &dyn PayloadCodec,
    _topic: &Topic,
    frames: &[Bytes],
    emit: &mut dyn FnMut(Event),
) -> Result<(), CodecError> {
    let transaction = codec.deserialize(&mut BinaryParser::new(frame(frames, 0)?))?;
    let hash = hex_frame(frames, 1, HASH_SIZE)?;
    let merkle_component_hash = hex_frame(frames, 2, HASH_SIZE)?;
    let height = BinaryParser::new(fixed_frame(frames, 3, 8)?).uint64()?;

    emit(Event::new(
        "transactionWithMetadata",
        json!({
            "transaction": transaction,
            "meta": {
                "hash": hash,
                "merkleComponentHash": merkle_component_hash,
                "height": height.to_string(),
            },
        }),
    ));
    Ok(())
}

fn transaction_hash(
    _codec: &dyn PayloadCodec,
    _topic: &Topic,
    frames: &[Bytes],
    emit: &mut dyn FnMut(Event),
) -> Result<(), CodecError> {
    let hash = hex_frame(frames, 0, HASH_SIZE)?;

    emit(Event::new(
        "transactionHashWithMetadata",
        json!({ "meta": { "hash": hash } }),
    ));
    Ok(())
}

fn transaction_status(
    _codec: &dyn PayloadCodec,
    _topic: &Topic,
    frames: &[Bytes],
    emit: &mut dyn FnMut(Event),
) -> Result<(), CodecError> {
    let mut parser = BinaryParser::new(frame(frames, 0)?);
    let hash = hex::encode_upper(parser.buffer(HASH_SIZE)?);
    let deadline = parser.uint64()?;
    let status = parser.uint32()?;

    emit(Event::new(
        "transactionStatus",
        json!({
            "hash": hash,
            "status": status,
            "deadline": deadline.to_string(),
        }),
    ));
    Ok(())
}

fn cosignature(
    _codec: &dyn PayloadCodec,
    _topic: &Topic,
    frames: &[Bytes],
    emit: &mut dyn FnMut(Event),
) -> Result<(), CodecError> {
    let mut parser = BinaryParser::new(frame(frames, 0)?);
    let parent_hash = hex::encode_upper(parser.buffer(HASH_SIZE)?);
    let signer_public_key = hex::encode_upper(parser.buffer(PUBLIC_KEY_SIZE)?);
    let signature = hex::encode_upper(parser.buffer(SIGNATURE_SIZE)?);

    emit(Event::new(
        "cosignature",
        json!({
            "parentHash": parent_hash,
            "signerPublicKey": signer_public_key,
            "signature": signature,
        }),
    ));
    Ok(())
}

fn receipt(
    codec: &dyn PayloadCodec,
    _topic: &Topic,
    frames: &[Bytes],
    emit: &mut dyn FnMut(Event),
) -> Result<(), CodecError> {
    let receipt = codec.deserialize(&mut BinaryParser::new(frame(frames, 0)?))?;

    emit(Event::new("anonymousReceipt", json!({ "receipt": receipt })));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::RawCodec;

    fn run(name: &str, frames: &[Bytes]) -> Result<Vec<Event>, CodecError> {
        let handler = lookup(name).unwrap();
        let mut events = Vec::new();
        handler.handle(
            &RawCodec,
            &Topic::from_marker(b'x'),
            frames,
            &mut |event| events.push(event),
        )?;
        Ok(events)
    }

    fn filled(byte: u8, size: usize) -> Bytes {
        Bytes::from(vec![byte; size])
    }

    #[test]
    fn test_all_templates_resolve() {
        for name in TEMPLATE_NAMES {
            assert!(lookup(name).is_some(), "missing template {}", name);
        }
        assert!(lookup("nope").is_none());
    }

    #[test]
    fn test_block_header() {
        let events = run(
            BLOCK_HEADER,
            &[
                Bytes::from_static(&[0xAB, 0xCD]),
                filled(0x11, 32),
                filled(0x22, 32),
            ],
        )
        .unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "blockHeaderWithMetadata");
        assert_eq!(events[0].payload["block"]["data"], "ABCD");
        assert_eq!(events[0].payload["meta"]["hash"], "11".repeat(32));
        assert_eq!(events[0].payload["meta"]["generationHash"], "22".repeat(32));
    }

    #[test]
    fn test_transaction() {
        let events = run(
            TRANSACTION,
            &[
                Bytes::from_static(&[0x01]),
                filled(0xAA, 32),
                filled(0xBB, 32),
                Bytes::from_static(&[0x0A, 0, 0, 0, 0, 0, 0, 0]),
            ],
        )
        .unwrap();

        assert_eq!(events[0].event_type, "transactionWithMetadata");
        assert_eq!(events[0].payload["meta"]["height"], "10");
        assert_eq!(events[0].payload["meta"]["merkleComponentHash"], "BB".repeat(32));
    }

    #[test]
    fn test_transaction_missing_frame() {
        let err = run(TRANSACTION, &[Bytes::from_static(&[0x01]), filled(0xAA, 32)]).unwrap_err();

        assert_eq!(err, CodecError::MissingFrame { index: 2 });
    }

    #[test]
    fn test_transaction_hash_wrong_size() {
        let err = run(TRANSACTION_HASH, &[filled(0xAA, 31)]).unwrap_err();

        assert_eq!(
            err,
            CodecError::FrameSize {
                index: 0,
                expected: 32,
                actual: 31
            }
        );
    }

    #[test]
    fn test_transaction_status() {
        let mut payload = vec![0x33; 32];
        payload.extend_from_slice(&100u64.to_le_bytes());
        payload.extend_from_slice(&0x8000_0001u32.to_le_bytes());

        let events = run(TRANSACTION_STATUS, &[Bytes::from(payload)]).unwrap();

        assert_eq!(events[0].event_type, "transactionStatus");
        assert_eq!(events[0].payload["hash"], "33".repeat(32));
        assert_eq!(events[0].payload["deadline"], "100");
        assert_eq!(events[0].payload["status"], 0x8000_0001u32);
    }

    #[test]
    fn test_cosignature() {
        let mut payload = vec![0x01; 32];
        payload.extend_from_slice(&[0x02; 32]);
        payload.extend_from_slice(&[0x03; 64]);

        let events = run(COSIGNATURE, &[Bytes::from(payload)]).unwrap();

        assert_eq!(events[0].payload["parentHash"], "01".repeat(32));
        assert_eq!(events[0].payload["signerPublicKey"], "02".repeat(32));
        assert_eq!(events[0].payload["signature"], "03".repeat(64));
    }

    #[test]
    fn test_cosignature_truncated() {
        let err = run(COSIGNATURE, &[filled(0x01, 40)]).unwrap_err();

        assert!(matches!(err, CodecError::UnexpectedEnd { .. }));
    }

    #[test]
    fn test_receipt() {
        let events = run(RECEIPT, &[Bytes::from_static(&[0x43, 0x21])]).unwrap();

        assert_eq!(events[0].event_type, "anonymousReceipt");
        assert_eq!(events[0].payload["receipt"]["data"], "4321");
    }
}
