use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum_macros::{AsRefStr, Display, EnumString};
use uuid::Uuid;

pub const USER_MESSAGE: &str = "user_message";
pub const MESSAGE_VERSION: &str = "20110921";

/// Configuration handed to a worker when it is started.
pub type WorkerConfig = Map<String, Value>;

/// Message as it travels over the bus between transports and applications.
///
/// Only part of this shape is visible to API callers; the address types,
/// routing and transport metadata stay internal.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
pub struct TransportMessage {
    pub message_id: String,
    pub message_type: String,
    pub message_version: String,
    pub timestamp: DateTime<Utc>,
    pub to_addr: Option<String>,
    pub from_addr: Option<String>,
    pub transport_name: String,
    pub transport_type: Option<String>,
    pub in_reply_to: Option<String>,
    pub content: Option<String>,
    pub session_event: Option<SessionEvent>,
    pub continue_session: Option<bool>,
    pub to_addr_type: Option<String>,
    pub from_addr_type: Option<String>,
    pub group: Option<String>,
    pub provider: Option<String>,
    #[serde(default)]
    pub helper_metadata: Map<String, Value>,
    #[serde(default)]
    pub transport_metadata: Map<String, Value>,
    #[serde(default)]
    pub routing_metadata: Map<String, Value>,
}

impl TransportMessage {
    /// Build a fresh outbound user message addressed through `transport_name`.
    pub fn send(
        transport_name: impl Into<String>,
        to_addr: Option<String>,
        from_addr: impl Into<String>,
        content: Option<String>,
    ) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            message_type: USER_MESSAGE.to_string(),
            message_version: MESSAGE_VERSION.to_string(),
            timestamp: Utc::now(),
            to_addr,
            from_addr: Some(from_addr.into()),
            transport_name: transport_name.into(),
            content,
            ..Default::default()
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
    EnumString, AsRefStr, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SessionEvent {
    New,
    Resume,
    Close,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema,
    EnumString, AsRefStr, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum WorkerState {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct HealthResult {
    pub healthy: bool,
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn send_fills_envelope() {
        let msg = TransportMessage::send("chan-1", Some("+123".into()), "+456", Some("hi".into()));
        assert_eq!(msg.transport_name, "chan-1");
        assert_eq!(msg.message_type, USER_MESSAGE);
        assert_eq!(msg.message_version, MESSAGE_VERSION);
        assert!(Uuid::parse_str(&msg.message_id).is_ok());
        assert!(msg.helper_metadata.is_empty());
        assert_eq!(msg.session_event, None);
    }

    #[test]
    fn session_event_names() {
        assert_eq!(SessionEvent::from_str("resume").unwrap(), SessionEvent::Resume);
        assert_eq!(serde_json::to_value(SessionEvent::Close).unwrap(), "close");
        assert!(SessionEvent::from_str("bogus").is_err());
    }
}
