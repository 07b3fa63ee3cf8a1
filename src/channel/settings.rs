use serde_json::{Map, Value, json};
use url::Url;

use super::{
    error::{ChannelError, Result},
    registry::TransportRegistry,
};
use junction_worker::WorkerConfig;

/// Channel properties checked and typed, ready to configure workers.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSettings {
    pub id: String,
    pub channel_type: String,
    pub implementation: String,
    pub config: Map<String, Value>,
    /// Exactly as stored; only checked to parse as a URL.
    pub mo_url: String,
}

impl ChannelSettings {
    /// Resolve `properties` for channel `id`.
    ///
    /// The type is checked first so an unknown transport is reported as such
    /// even when the rest of the properties are also wrong.
    pub fn resolve(
        id: &str,
        properties: &Map<String, Value>,
        registry: &TransportRegistry,
    ) -> Result<Self> {
        let channel_type = properties.get("type").and_then(Value::as_str);
        let implementation = channel_type
            .and_then(|t| registry.resolve(t))
            .ok_or_else(|| ChannelError::InvalidChannelType {
                channel_type: channel_type.map(str::to_string),
                valid: registry.types(),
            })?;

        let config = match properties.get("config") {
            Some(Value::Object(config)) => config.clone(),
            Some(_) => {
                return Err(ChannelError::invalid_configuration(
                    "`config` must be an object",
                ));
            }
            None => {
                return Err(ChannelError::invalid_configuration(
                    "missing required property `config`",
                ));
            }
        };

        let mo_url = match properties.get("mo_url") {
            Some(Value::String(url)) => {
                Url::parse(url).map_err(|e| {
                    ChannelError::invalid_configuration(format!(
                        "`mo_url` `{url}` is not a URL: {e}"
                    ))
                })?;
                url.clone()
            }
            Some(_) => {
                return Err(ChannelError::invalid_configuration(
                    "`mo_url` must be a string",
                ));
            }
            None => {
                return Err(ChannelError::invalid_configuration(
                    "missing required property `mo_url`",
                ));
            }
        };

        Ok(Self {
            id: id.to_string(),
            channel_type: channel_type.unwrap_or_default().to_string(),
            implementation: implementation.to_string(),
            config,
            mo_url,
        })
    }

    /// Transport config plus `transport_name`.
    pub fn transport_config(&self) -> WorkerConfig {
        let mut config = self.config.clone();
        config.insert("transport_name".to_string(), json!(self.id));
        config
    }

    pub fn application_config(&self) -> WorkerConfig {
        let mut config = WorkerConfig::new();
        config.insert("transport_name".to_string(), json!(self.id));
        config.insert("mo_message_url".to_string(), json!(self.mo_url));
        config
    }
}

/// Structural check run on create and update.
///
/// Only the shape of the well-known keys is checked; presence is required
/// later, at start.
pub fn validate_shape(properties: &Map<String, Value>) -> Result<()> {
    match properties.get("type") {
        None | Some(Value::String(_)) => {}
        Some(_) => {
            return Err(ChannelError::invalid_configuration(
                "`type` must be a string",
            ));
        }
    }
    match properties.get("config") {
        None | Some(Value::Object(_)) => {}
        Some(_) => {
            return Err(ChannelError::invalid_configuration(
                "`config` must be an object",
            ));
        }
    }
    match properties.get("mo_url") {
        None | Some(Value::String(_)) => {}
        Some(_) => {
            return Err(ChannelError::invalid_configuration(
                "`mo_url` must be a string",
            ));
        }
    }
    Ok(())
}
