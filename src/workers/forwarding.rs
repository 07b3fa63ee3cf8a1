use std::time::Duration;

use async_trait::async_trait;
use junction_worker::{
    TransportMessage, WorkerConfig, WorkerError, WorkerHandler, WorkerState,
    worker_helpers::required_str,
};
use reqwest::Client;
use tracing::{debug, info, warn};
use url::Url;

use crate::{channel::translate::api_from_message, config::WorkerOptions};

pub const FORWARDING_WORKER: &str = "junction.workers.MessageForwardingWorker";

/// Application worker that POSTs every inbound message, in API shape, to the
/// channel's `mo_message_url`.
///
/// Each POST is bounded by the request timeout, so a silent `mo_url` cannot
/// hold up the commands queued behind it.
#[derive(Debug)]
pub struct MessageForwardingWorker {
    client: Option<Client>,
    timeout: Duration,
    state: WorkerState,
    transport_name: Option<String>,
    mo_message_url: Option<Url>,
}

impl Default for MessageForwardingWorker {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageForwardingWorker {
    pub fn new() -> Self {
        Self::from_options(&WorkerOptions::default())
    }

    pub fn from_options(options: &WorkerOptions) -> Self {
        Self::with_timeout(options.request_timeout())
    }

    /// The HTTP client is built on start with `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            client: None,
            timeout,
            state: WorkerState::Stopped,
            transport_name: None,
            mo_message_url: None,
        }
    }
}

#[async_trait]
impl WorkerHandler for MessageForwardingWorker {
    fn implementation(&self) -> &str {
        FORWARDING_WORKER
    }

    async fn start(&mut self, config: WorkerConfig) -> Result<(), WorkerError> {
        if self.state == WorkerState::Running {
            return Err(WorkerError::InvalidState("start while running".into()));
        }
        let transport_name = required_str(&config, "transport_name")?.to_string();
        let raw_url = required_str(&config, "mo_message_url")?;
        let url = Url::parse(raw_url)
            .map_err(|e| WorkerError::Config(format!("mo_message_url `{raw_url}`: {e}")))?;

        if self.client.is_none() {
            let client = Client::builder()
                .timeout(self.timeout)
                .build()
                .map_err(|e| WorkerError::Other(format!("building HTTP client: {e}")))?;
            self.client = Some(client);
        }

        info!(transport = %transport_name, url = %url, "forwarding worker started");
        self.transport_name = Some(transport_name);
        self.mo_message_url = Some(url);
        self.state = WorkerState::Running;
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), WorkerError> {
        if self.state != WorkerState::Stopped {
            info!(transport = ?self.transport_name, "forwarding worker stopped");
        }
        self.state = WorkerState::Stopped;
        Ok(())
    }

    async fn state(&self) -> WorkerState {
        self.state
    }

    async fn handle_inbound(&mut self, msg: TransportMessage) -> Result<(), WorkerError> {
        let (url, client) = match (&self.state, &self.mo_message_url, &self.client) {
            (WorkerState::Running, Some(url), Some(client)) => (url.clone(), client.clone()),
            _ => return Err(WorkerError::InvalidState("inbound while stopped".into())),
        };

        let body = api_from_message(&msg);
        let response = client
            .post(url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!(url = %url, message_id = %msg.message_id, "forwarding failed: {e}");
                WorkerError::Other(format!("POST {url}: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %url, message_id = %msg.message_id, %status, "mo_url rejected message");
            return Err(WorkerError::Other(format!("POST {url} returned {status}")));
        }
        debug!(url = %url, message_id = %msg.message_id, "message forwarded");
        Ok(())
    }
}
