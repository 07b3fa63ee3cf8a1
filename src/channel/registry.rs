use std::{collections::BTreeMap, sync::Arc};

use once_cell::sync::Lazy;

static DEFAULT_TRANSPORTS: Lazy<BTreeMap<String, String>> = Lazy::new(|| {
    BTreeMap::from([
        (
            "telnet".to_string(),
            "transports.telnet.TelnetServerTransport".to_string(),
        ),
        (
            "xmpp".to_string(),
            "transports.xmpp.XMPPTransport".to_string(),
        ),
    ])
});

/// Maps a channel `type` to the worker implementation that serves it.
#[derive(Clone, Debug)]
pub struct TransportRegistry {
    transports: Arc<BTreeMap<String, String>>,
}

impl Default for TransportRegistry {
    fn default() -> Self {
        Self {
            transports: Arc::new(DEFAULT_TRANSPORTS.clone()),
        }
    }
}

impl TransportRegistry {
    pub fn empty() -> Self {
        Self {
            transports: Arc::new(BTreeMap::new()),
        }
    }

    /// A copy of this registry with `channel_type` served by `implementation`.
    pub fn with(&self, channel_type: &str, implementation: &str) -> Self {
        let mut transports = (*self.transports).clone();
        transports.insert(channel_type.to_string(), implementation.to_string());
        Self {
            transports: Arc::new(transports),
        }
    }

    pub fn resolve(&self, channel_type: &str) -> Option<&str> {
        self.transports.get(channel_type).map(String::as_str)
    }

    /// Known channel types, sorted.
    pub fn types(&self) -> Vec<String> {
        self.transports.keys().cloned().collect()
    }
}
