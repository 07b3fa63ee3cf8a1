use async_trait::async_trait;
use junction_worker::{
    TransportMessage, WorkerConfig, WorkerError, WorkerHandler, WorkerState,
    worker_helpers::{optional_str, required_str},
};
use tracing::{info, warn};

/// In-process transport that accepts outbound messages and logs them.
///
/// Stands in for a transport whose wire protocol runs elsewhere, so a
/// channel of any registered type can be started by the local runtime.
#[derive(Debug)]
pub struct RelayTransport {
    implementation: String,
    state: WorkerState,
    transport_name: Option<String>,
    relayed: u64,
}

impl RelayTransport {
    pub fn new(implementation: &str) -> Self {
        Self {
            implementation: implementation.to_string(),
            state: WorkerState::Stopped,
            transport_name: None,
            relayed: 0,
        }
    }
}

#[async_trait]
impl WorkerHandler for RelayTransport {
    fn implementation(&self) -> &str {
        &self.implementation
    }

    async fn start(&mut self, config: WorkerConfig) -> Result<(), WorkerError> {
        let transport_name = required_str(&config, "transport_name")?.to_string();
        if let Some(endpoint) = optional_str(&config, "twisted_endpoint") {
            info!(transport = %transport_name, endpoint, "relay transport listening");
        }
        self.transport_name = Some(transport_name);
        self.state = WorkerState::Running;
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), WorkerError> {
        if self.state == WorkerState::Running {
            info!(transport = ?self.transport_name, relayed = self.relayed, "relay transport stopped");
        }
        self.state = WorkerState::Stopped;
        Ok(())
    }

    async fn state(&self) -> WorkerState {
        self.state
    }

    async fn handle_outbound(
        &mut self,
        msg: TransportMessage,
    ) -> Result<TransportMessage, WorkerError> {
        if self.state != WorkerState::Running {
            return Err(WorkerError::InvalidState("outbound while stopped".into()));
        }
        if msg.to_addr.is_none() {
            warn!(message_id = %msg.message_id, "outbound message without `to_addr`");
        }
        self.relayed += 1;
        info!(
            transport = ?self.transport_name,
            message_id = %msg.message_id,
            to = ?msg.to_addr,
            "relaying outbound message"
        );
        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn relays_only_while_running() {
        let mut relay = RelayTransport::new("transports.telnet.TelnetServerTransport");
        let msg = TransportMessage::send("abc", Some("+1".into()), "+2", Some("hi".into()));
        assert!(relay.handle_outbound(msg.clone()).await.is_err());

        let config = json!({"transport_name": "abc"}).as_object().cloned().unwrap();
        relay.start(config).await.unwrap();
        assert_eq!(relay.handle_outbound(msg.clone()).await.unwrap(), msg);
        assert_eq!(relay.relayed, 1);

        relay.stop().await.unwrap();
        assert_eq!(relay.state().await, WorkerState::Stopped);
    }

    #[tokio::test]
    async fn needs_transport_name() {
        let mut relay = RelayTransport::new("x");
        assert!(matches!(
            relay.start(WorkerConfig::new()).await,
            Err(WorkerError::Config(_))
        ));
    }
}
