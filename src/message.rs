use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Message as API callers see it.
///
/// Transport-specific extras ride along in `channel_data`; everything else
/// the bus carries stays on the internal `TransportMessage`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
pub struct ApiMessage {
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reply_to: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub channel_data: Map<String, Value>,
}

impl ApiMessage {
    pub fn new(from: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            from: Some(from.into()),
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn to(mut self, to: impl Into<String>) -> Self {
        self.to = Some(to.into());
        self
    }

    pub fn with_channel_data(mut self, key: &str, value: Value) -> Self {
        self.channel_data.insert(key.to_string(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_fields_default() {
        let msg: ApiMessage = serde_json::from_value(json!({"from": "+1234", "content": "hi"})).unwrap();
        assert_eq!(msg.from.as_deref(), Some("+1234"));
        assert_eq!(msg.to, None);
        assert!(msg.channel_data.is_empty());
    }

    #[test]
    fn builder_sets_fields() {
        let msg = ApiMessage::new("a", "b")
            .to("c")
            .with_channel_data("session_event", json!("new"));
        assert_eq!(msg.to.as_deref(), Some("c"));
        assert_eq!(msg.channel_data["session_event"], json!("new"));
    }
}
