//! Payload decoding
//!
//! The domain codec that turns raw entity bytes into objects lives outside this
//! crate; [`PayloadCodec`] is the seam it plugs into. Channel handlers use it
//! together with [`BinaryParser`] to build the [`Event`]s delivered to subscribers.

pub mod event;
pub mod parser;

pub use event::Event;
pub use parser::BinaryParser;

/// Error decoding a message payload
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Parser ran past the end of its buffer
    #[error("unexpected end of payload: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEnd { needed: usize, remaining: usize },

    /// Message carried fewer frames than the handler expects
    #[error("missing payload frame {index}")]
    MissingFrame { index: usize },

    /// Frame has the wrong fixed size
    #[error("frame {index} must be {expected} bytes, got {actual}")]
    FrameSize {
        index: usize,
        expected: usize,
        actual: usize,
    },

    /// Domain codec rejected the payload
    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// Domain codec collaborator
///
/// Deserializes one domain object (block header, transaction, receipt, ...)
/// from the parser's current position.
pub trait PayloadCodec: Send + Sync {
    fn deserialize(&self, parser: &mut BinaryParser<'_>) -> Result<serde_json::Value, CodecError>;
}

/// Codec that exposes the remaining payload as upper-case hex
///
/// Useful when the gateway forwards entities without interpreting them.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawCodec;

impl PayloadCodec for RawCodec {
    fn deserialize(&self, parser: &mut BinaryParser<'_>) -> Result<serde_json::Value, CodecError> {
        let rest = parser.rest();
        Ok(serde_json::json!({
            "size": rest.len(),
            "data": hex::encode_upper(rest),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_codec_consumes_rest() {
        let data = [0x01, 0x02, 0xAB];
        let mut parser = BinaryParser::new(&data);
        parser.uint8().unwrap();

        let value = RawCodec.deserialize(&mut parser).unwrap();

        assert_eq!(value["size"], 2);
        assert_eq!(value["data"], "02AB");
        assert!(parser.is_empty());
    }
}
