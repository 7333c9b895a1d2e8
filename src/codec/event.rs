//! Domain event envelope delivered to subscribers

use serde::Serialize;

/// Typed notification produced by a channel handler
///
/// Serializes as `{"type": ..., "payload": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    /// Channel-specific event kind (e.g. `blockHeaderWithMetadata`)
    #[serde(rename = "type")]
    pub event_type: String,

    /// Event body
    pub payload: serde_json::Value,
}

impl Event {
    pub fn new(event_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
        }
    }

    /// Render the envelope as a JSON value
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "type": self.event_type,
            "payload": self.payload,
        })
    }
}
