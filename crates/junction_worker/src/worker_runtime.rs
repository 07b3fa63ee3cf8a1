//! The trait every worker implements.
//!
//! A worker is owned by exactly one actor task (see [`crate::worker_actor`]),
//! so implementations get `&mut self` and never have to guard their own state
//! against concurrent calls.

use async_trait::async_trait;

use crate::message::{HealthResult, TransportMessage, WorkerConfig, WorkerState};
use crate::worker_helpers::WorkerError;

#[async_trait]
pub trait WorkerHandler: Send + Sync + 'static {
    /// Identifier the worker factory registered this implementation under.
    fn implementation(&self) -> &str;

    /// Apply `config` and start any underlying services.
    async fn start(&mut self, config: WorkerConfig) -> Result<(), WorkerError>;

    /// Stop the worker. Stopping a stopped worker is a no-op.
    async fn stop(&mut self) -> Result<(), WorkerError>;

    /// Request the current state
    async fn state(&self) -> WorkerState;

    /// Check the health of the worker
    async fn health(&self) -> HealthResult {
        let state = self.state().await;
        if state == WorkerState::Running {
            HealthResult { healthy: true, reason: None }
        } else {
            HealthResult {
                healthy: false,
                reason: Some(format!("worker is {state}")),
            }
        }
    }

    /// A message published for delivery through this worker.
    /// Returns the message as it was handed on.
    async fn handle_outbound(
        &mut self,
        _msg: TransportMessage,
    ) -> Result<TransportMessage, WorkerError> {
        Err(WorkerError::Unsupported("outbound".into()))
    }

    /// A message received from the outside world for this worker.
    async fn handle_inbound(&mut self, _msg: TransportMessage) -> Result<(), WorkerError> {
        Err(WorkerError::Unsupported("inbound".into()))
    }
}
