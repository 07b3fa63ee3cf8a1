//! Mapping between the API message shape and the bus message shape.

use std::str::FromStr;

use junction_worker::{SessionEvent, TransportMessage};
use serde_json::Value;

use super::error::{ChannelError, Result};
use crate::message::ApiMessage;

const CONTINUE_SESSION: &str = "continue_session";
const SESSION_EVENT: &str = "session_event";

/// Build the outbound bus message for `channel_id` from an API message.
///
/// `from` and `content` are required. `continue_session` and `session_event`
/// are lifted out of `channel_data`; whatever is left becomes
/// `helper_metadata` untouched.
pub fn message_from_api(channel_id: &str, api: &ApiMessage) -> Result<TransportMessage> {
    let from = api
        .from
        .clone()
        .ok_or_else(|| ChannelError::invalid_message("missing required field `from`"))?;
    let content = api
        .content
        .clone()
        .ok_or_else(|| ChannelError::invalid_message("missing required field `content`"))?;

    let mut helper_metadata = api.channel_data.clone();

    let continue_session = match helper_metadata.remove(CONTINUE_SESSION) {
        None | Some(Value::Null) => None,
        Some(Value::Bool(flag)) => Some(flag),
        Some(other) => {
            return Err(ChannelError::invalid_message(format!(
                "`{CONTINUE_SESSION}` must be a boolean, got {other}"
            )));
        }
    };

    let session_event = match helper_metadata.remove(SESSION_EVENT) {
        None | Some(Value::Null) => None,
        Some(Value::String(event)) => Some(SessionEvent::from_str(&event).map_err(|_| {
            ChannelError::invalid_message(format!(
                "`{SESSION_EVENT}` must be one of new, resume, close, got `{event}`"
            ))
        })?),
        Some(other) => {
            return Err(ChannelError::invalid_message(format!(
                "`{SESSION_EVENT}` must be a string, got {other}"
            )));
        }
    };

    let mut msg = TransportMessage::send(channel_id, api.to.clone(), from, Some(content));
    msg.in_reply_to = api.reply_to.clone();
    msg.continue_session = continue_session;
    msg.session_event = session_event;
    msg.helper_metadata = helper_metadata;
    Ok(msg)
}

/// API view of a bus message. Transport-internal fields are dropped.
pub fn api_from_message(msg: &TransportMessage) -> ApiMessage {
    let mut channel_data = msg.helper_metadata.clone();
    if let Some(flag) = msg.continue_session {
        channel_data.insert(CONTINUE_SESSION.to_string(), Value::Bool(flag));
    }
    if let Some(event) = msg.session_event {
        channel_data.insert(SESSION_EVENT.to_string(), Value::String(event.to_string()));
    }

    ApiMessage {
        to: msg.to_addr.clone(),
        from: msg.from_addr.clone(),
        message_id: Some(msg.message_id.clone()),
        channel_id: Some(msg.transport_name.clone()),
        timestamp: Some(msg.timestamp),
        reply_to: msg.in_reply_to.clone(),
        content: msg.content.clone(),
        channel_data,
    }
}
