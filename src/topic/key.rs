//! Client-visible channel keys
//!
//! A key is either a bare channel name (`block`) or a channel name followed by
//! a parameter (`confirmedAdded/9826D27E...`). Appending `.closed` to a key
//! names the sub-event fired when that channel subscription is torn down.

use std::fmt;

/// Separator between channel name and parameter
pub const PARAM_SEPARATOR: char = '/';

/// Separator between a channel key and a sub-event suffix
pub const SUB_EVENT_SEPARATOR: char = '.';

/// Per-channel notification that is not a channel message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubEvent {
    /// The channel subscription was removed or its transport went away
    Closed,
}

impl SubEvent {
    pub fn suffix(&self) -> &'static str {
        match self {
            SubEvent::Closed => "closed",
        }
    }

    fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "closed" => Some(SubEvent::Closed),
            _ => None,
        }
    }

    /// Build the sub-event key for a channel key
    pub fn key_for(&self, key: &str) -> String {
        format!("{}{}{}", key, SUB_EVENT_SEPARATOR, self.suffix())
    }
}

/// Split a sub-event key into its channel key and sub-event
///
/// Returns `None` for ordinary channel keys, including keys that contain the
/// separator but end in an unrecognised suffix.
pub fn split_sub_event(key: &str) -> Option<(&str, SubEvent)> {
    let (base, suffix) = key.rsplit_once(SUB_EVENT_SEPARATOR)?;
    SubEvent::from_suffix(suffix).map(|event| (base, event))
}

/// Parsed channel key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelKey {
    channel: String,
    param: Option<String>,
}

impl ChannelKey {
    /// Create a key from its parts; an empty parameter is treated as absent
    pub fn new(channel: impl Into<String>, param: Option<String>) -> Self {
        Self {
            channel: channel.into(),
            param: param.filter(|p| !p.is_empty()),
        }
    }

    /// Parse `name` or `name/param`
    pub fn parse(key: &str) -> Self {
        match key.split_once(PARAM_SEPARATOR) {
            Some((channel, param)) => Self::new(channel, Some(param.to_string())),
            None => Self::new(key, None),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn param(&self) -> Option<&str> {
        self.param.as_deref()
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.param {
            Some(param) => write!(f, "{}{}{}", self.channel, PARAM_SEPARATOR, param),
            None => write!(f, "{}", self.channel),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_key() {
        let key = ChannelKey::parse("block");

        assert_eq!(key.channel(), "block");
        assert_eq!(key.param(), None);
        assert_eq!(key.to_string(), "block");
    }

    #[test]
    fn test_parse_parameterized_key() {
        let key = ChannelKey::parse("confirmedAdded/ABCD");

        assert_eq!(key.channel(), "confirmedAdded");
        assert_eq!(key.param(), Some("ABCD"));
        assert_eq!(key.to_string(), "confirmedAdded/ABCD");
    }

    #[test]
    fn test_empty_param_normalizes_to_bare() {
        let key = ChannelKey::parse("block/");

        assert_eq!(key.param(), None);
        assert_eq!(key.to_string(), "block");
    }

    #[test]
    fn test_split_sub_event() {
        assert_eq!(
            split_sub_event("status/ABCD.closed"),
            Some(("status/ABCD", SubEvent::Closed))
        );
        assert_eq!(split_sub_event("status/ABCD"), None);
        assert_eq!(split_sub_event("status.unknown"), None);
    }

    #[test]
    fn test_sub_event_key_for() {
        assert_eq!(SubEvent::Closed.key_for("block"), "block.closed");
    }
}
