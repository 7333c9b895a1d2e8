//! Topic parameter encoding
//!
//! Converts the client-visible textual parameter of a subscription into the
//! bytes that follow the marker on the wire, and back.

/// Size of a decoded account address in bytes
pub const ADDRESS_SIZE: usize = 25;

/// How a channel's subscription parameter is encoded into its topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// Channel takes no parameter; its topic is always the bare marker
    None,
    /// Hex encoded account address
    Address,
    /// Entity type code, decimal or `0x` prefixed hex, little endian `u16` on the wire
    EntityType,
    /// Arbitrary hex encoded bytes
    Raw,
}

/// Error encoding a subscription parameter
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParamError {
    #[error("channel does not take a parameter")]
    Unexpected,
    #[error("parameter is not valid hex")]
    InvalidHex,
    #[error("address must be {expected} bytes, got {actual}")]
    AddressLength { expected: usize, actual: usize },
    #[error("'{0}' is not a valid entity type")]
    InvalidEntityType(String),
}

/// Encode a textual parameter into topic bytes
pub fn encode_param(kind: ParamKind, param: &str) -> Result<Vec<u8>, ParamError> {
    match kind {
        ParamKind::None => Err(ParamError::Unexpected),
        ParamKind::Address => {
            let bytes = hex::decode(param).map_err(|_| ParamError::InvalidHex)?;
            if bytes.len() != ADDRESS_SIZE {
                return Err(ParamError::AddressLength {
                    expected: ADDRESS_SIZE,
                    actual: bytes.len(),
                });
            }
            Ok(bytes)
        }
        ParamKind::EntityType => {
            let parsed = match param
                .strip_prefix("0x")
                .or_else(|| param.strip_prefix("0X"))
            {
                Some(digits) => u16::from_str_radix(digits, 16),
                None => param.parse::<u16>(),
            };
            let entity_type =
                parsed.map_err(|_| ParamError::InvalidEntityType(param.to_string()))?;
            Ok(entity_type.to_le_bytes().to_vec())
        }
        ParamKind::Raw => hex::decode(param).map_err(|_| ParamError::InvalidHex),
    }
}

/// Decode topic parameter bytes back into their textual form
///
/// Returns `None` if the bytes are not a valid encoding for `kind`.
/// An empty parameter decodes to `None` for every kind.
pub fn decode_param(kind: ParamKind, bytes: &[u8]) -> Option<String> {
    if bytes.is_empty() {
        return None;
    }

    match kind {
        ParamKind::None => None,
        ParamKind::Address if bytes.len() == ADDRESS_SIZE => Some(hex::encode_upper(bytes)),
        ParamKind::Address => None,
        ParamKind::EntityType => {
            let raw: [u8; 2] = bytes.try_into().ok()?;
            Some(u16::from_le_bytes(raw).to_string())
        }
        ParamKind::Raw => Some(hex::encode_upper(bytes)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDRESS: &str = "9826D27E1D0A26CA4E316F901E23E55C8711DB20DF5C49B5A6";

    #[test]
    fn test_encode_address() {
        let bytes = encode_param(ParamKind::Address, ADDRESS).unwrap();

        assert_eq!(bytes.len(), ADDRESS_SIZE);
        assert_eq!(bytes[0], 0x98);
        assert_eq!(bytes[24], 0xA6);
    }

    #[test]
    fn test_encode_address_is_case_insensitive() {
        let upper = encode_param(ParamKind::Address, ADDRESS).unwrap();
        let lower = encode_param(ParamKind::Address, &ADDRESS.to_lowercase()).unwrap();

        assert_eq!(upper, lower);
    }

    #[test]
    fn test_encode_address_rejects_bad_input() {
        assert_eq!(
            encode_param(ParamKind::Address, "zz"),
            Err(ParamError::InvalidHex)
        );
        assert_eq!(
            encode_param(ParamKind::Address, "ABCD"),
            Err(ParamError::AddressLength {
                expected: ADDRESS_SIZE,
                actual: 2
            })
        );
    }

    #[test]
    fn test_encode_entity_type() {
        assert_eq!(
            encode_param(ParamKind::EntityType, "0x2143").unwrap(),
            vec![0x43, 0x21]
        );
        assert_eq!(
            encode_param(ParamKind::EntityType, "8515").unwrap(),
            vec![0x43, 0x21]
        );
        assert!(matches!(
            encode_param(ParamKind::EntityType, "70000"),
            Err(ParamError::InvalidEntityType(_))
        ));
    }

    #[test]
    fn test_encode_none_rejects_parameter() {
        assert_eq!(
            encode_param(ParamKind::None, "anything"),
            Err(ParamError::Unexpected)
        );
    }

    #[test]
    fn test_encode_raw() {
        assert_eq!(
            encode_param(ParamKind::Raw, "00ff").unwrap(),
            vec![0x00, 0xFF]
        );
    }

    #[test]
    fn test_decode_param() {
        let address = encode_param(ParamKind::Address, ADDRESS).unwrap();

        assert_eq!(
            decode_param(ParamKind::Address, &address).as_deref(),
            Some(ADDRESS)
        );
        assert_eq!(
            decode_param(ParamKind::EntityType, &[0x43, 0x21]).as_deref(),
            Some("8515")
        );
        assert_eq!(decode_param(ParamKind::Address, &[0x01]), None);
        assert_eq!(decode_param(ParamKind::EntityType, &[0x01]), None);
        assert_eq!(decode_param(ParamKind::Raw, &[]), None);
        assert_eq!(decode_param(ParamKind::None, &[0x01]), None);
    }
}
