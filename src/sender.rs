use async_trait::async_trait;
use junction_worker::{TransportMessage, WorkerError};
use thiserror::Error;
use tracing::debug;

use crate::supervisor::ServiceParent;

#[derive(Debug, Error)]
pub enum SendError {
    #[error("no route for routing key `{routing_key}`")]
    NoRoute { routing_key: String },

    #[error("no worker named `{name}` to deliver to")]
    UnknownWorker { name: String },

    #[error(transparent)]
    Worker(#[from] WorkerError),
}

/// Hands a bus message to whoever consumes `routing_key` and returns the
/// message as it was published.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_message(
        &self,
        msg: TransportMessage,
        routing_key: &str,
    ) -> Result<TransportMessage, SendError>;
}

/// Delivers straight to the workers attached under one service parent.
///
/// `<name>.outbound` goes to the transport worker `<name>`, `<name>.inbound`
/// to the application worker `application:<name>`.
#[derive(Clone, Debug)]
pub struct LocalMessageSender {
    parent: ServiceParent,
}

impl LocalMessageSender {
    pub fn new(parent: ServiceParent) -> Self {
        Self { parent }
    }

    fn worker(&self, name: &str) -> Result<junction_worker::WorkerHandle, SendError> {
        self.parent
            .get_service_named(name)
            .ok_or_else(|| SendError::UnknownWorker {
                name: name.to_string(),
            })
    }
}

#[async_trait]
impl MessageSender for LocalMessageSender {
    async fn send_message(
        &self,
        msg: TransportMessage,
        routing_key: &str,
    ) -> Result<TransportMessage, SendError> {
        debug!(routing_key, message_id = %msg.message_id, "routing message");
        match routing_key.rsplit_once('.') {
            Some((name, "outbound")) if !name.is_empty() => {
                Ok(self.worker(name)?.send_outbound(msg).await?)
            }
            Some((name, "inbound")) if !name.is_empty() => {
                let app = self.worker(&format!("application:{name}"))?;
                app.deliver_inbound(msg.clone()).await?;
                Ok(msg)
            }
            _ => Err(SendError::NoRoute {
                routing_key: routing_key.to_string(),
            }),
        }
    }
}
