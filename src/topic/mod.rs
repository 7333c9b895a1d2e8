//! Topic framing
//!
//! Every message published by the node starts with a binary topic frame:
//! byte 0 is the channel marker, the remaining bytes (if any) carry an encoded
//! channel parameter such as an address or an entity type. A bare marker with
//! no trailing bytes denotes every instance of the channel.

pub mod codec;
pub mod key;

use std::fmt;

use bytes::Bytes;

pub use codec::{decode_param, encode_param, ParamError, ParamKind, ADDRESS_SIZE};
pub use key::{split_sub_event, ChannelKey, SubEvent, PARAM_SEPARATOR, SUB_EVENT_SEPARATOR};

/// Single byte identifying a channel's topic namespace
pub type Marker = u8;

/// Binary topic (marker followed by an optional encoded parameter)
///
/// Cheap to clone; the bytes are reference counted.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Topic(Bytes);

impl Topic {
    /// Create a topic from raw bytes
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Create a bare topic consisting of the marker alone
    pub fn from_marker(marker: Marker) -> Self {
        Self(Bytes::copy_from_slice(&[marker]))
    }

    /// Create a topic from a marker and an already encoded parameter
    pub fn with_param(marker: Marker, param: &[u8]) -> Self {
        let mut bytes = Vec::with_capacity(1 + param.len());
        bytes.push(marker);
        bytes.extend_from_slice(param);
        Self(Bytes::from(bytes))
    }

    /// Channel marker, `None` for an empty topic
    pub fn marker(&self) -> Option<Marker> {
        self.0.first().copied()
    }

    /// Encoded parameter bytes following the marker
    pub fn param(&self) -> &[u8] {
        self.0.get(1..).unwrap_or_default()
    }

    /// Whether this topic is a bare marker ("all instances")
    pub fn is_bare(&self) -> bool {
        self.0.len() == 1
    }

    /// The bare topic sharing this topic's marker
    pub fn bare(&self) -> Option<Topic> {
        self.marker().map(Topic::from_marker)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Bytes> for Topic {
    fn from(bytes: Bytes) -> Self {
        Self(bytes)
    }
}

impl From<Vec<u8>> for Topic {
    fn from(bytes: Vec<u8>) -> Self {
        Self(Bytes::from(bytes))
    }
}

impl From<&'static [u8]> for Topic {
    fn from(bytes: &'static [u8]) -> Self {
        Self(Bytes::from_static(bytes))
    }
}

impl AsRef<[u8]> for Topic {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode_upper(&self.0))
    }
}

impl fmt::Debug for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Topic({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_topic() {
        let topic = Topic::from_marker(b'a');

        assert_eq!(topic.as_bytes(), &[0x61]);
        assert_eq!(topic.marker(), Some(b'a'));
        assert!(topic.param().is_empty());
        assert!(topic.is_bare());
    }

    #[test]
    fn test_topic_with_param() {
        let topic = Topic::with_param(b'e', &[0x43, 0x21]);

        assert_eq!(topic.as_bytes(), &[b'e', 0x43, 0x21]);
        assert_eq!(topic.param(), &[0x43, 0x21]);
        assert!(!topic.is_bare());
        assert_eq!(topic.bare(), Some(Topic::from_marker(b'e')));
    }

    #[test]
    fn test_empty_topic() {
        let topic = Topic::new(Bytes::new());

        assert!(topic.is_empty());
        assert_eq!(topic.marker(), None);
        assert_eq!(topic.bare(), None);
        assert!(topic.param().is_empty());
    }

    #[test]
    fn test_topic_display_is_upper_hex() {
        let topic = Topic::with_param(b'a', &[0xab, 0x01]);

        assert_eq!(topic.to_string(), "61AB01");
        assert_eq!(format!("{:?}", topic), "Topic(61AB01)");
    }
}
