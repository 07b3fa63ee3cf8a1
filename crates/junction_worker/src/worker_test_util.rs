use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    message::{TransportMessage, WorkerConfig, WorkerState},
    worker_actor::{spawn_worker_actor, WorkerHandle},
    worker_helpers::WorkerError,
    worker_runtime::WorkerHandler,
};

#[derive(Debug, Default)]
struct Journal {
    state: WorkerState,
    started_with: Vec<WorkerConfig>,
    stops: usize,
    outbound: Vec<TransportMessage>,
    inbound: Vec<TransportMessage>,
}

/// In-process stand-in for a real transport or application worker.
///
/// Everything it is asked to do is recorded in a journal shared with the
/// [`SimulatedProbe`] returned by [`SimulatedWorker::with_probe`].
pub struct SimulatedWorker {
    implementation: String,
    fail_stop: bool,
    journal: Arc<Mutex<Journal>>,
}

/// Read-only view into a [`SimulatedWorker`] after it moved into its actor.
#[derive(Clone)]
pub struct SimulatedProbe {
    journal: Arc<Mutex<Journal>>,
}

impl SimulatedWorker {
    pub fn new(implementation: &str) -> Self {
        Self {
            implementation: implementation.to_string(),
            fail_stop: false,
            journal: Arc::new(Mutex::new(Journal::default())),
        }
    }

    pub fn with_probe(implementation: &str) -> (Self, SimulatedProbe) {
        let worker = Self::new(implementation);
        let probe = SimulatedProbe {
            journal: Arc::clone(&worker.journal),
        };
        (worker, probe)
    }

    /// Make every `stop` fail, to exercise partial shutdowns.
    pub fn failing_stop(mut self) -> Self {
        self.fail_stop = true;
        self
    }

    /// Spawn the worker and hand back both its handle and a probe.
    pub fn spawn(implementation: &str, config: WorkerConfig) -> (WorkerHandle, SimulatedProbe) {
        let (worker, probe) = Self::with_probe(implementation);
        (spawn_worker_actor(worker, config), probe)
    }
}

impl SimulatedProbe {
    pub async fn state(&self) -> WorkerState {
        self.journal.lock().await.state
    }

    pub async fn started_with(&self) -> Vec<WorkerConfig> {
        self.journal.lock().await.started_with.clone()
    }

    pub async fn stop_count(&self) -> usize {
        self.journal.lock().await.stops
    }

    pub async fn outbound(&self) -> Vec<TransportMessage> {
        self.journal.lock().await.outbound.clone()
    }

    pub async fn inbound(&self) -> Vec<TransportMessage> {
        self.journal.lock().await.inbound.clone()
    }
}

#[async_trait]
impl WorkerHandler for SimulatedWorker {
    fn implementation(&self) -> &str {
        &self.implementation
    }

    async fn start(&mut self, config: WorkerConfig) -> Result<(), WorkerError> {
        let mut journal = self.journal.lock().await;
        if journal.state == WorkerState::Running {
            return Err(WorkerError::InvalidState("start".into()));
        }
        journal.started_with.push(config);
        journal.state = WorkerState::Running;
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), WorkerError> {
        if self.fail_stop {
            return Err(WorkerError::Other("simulated stop failure".into()));
        }
        let mut journal = self.journal.lock().await;
        if journal.state != WorkerState::Stopped {
            journal.stops += 1;
        }
        journal.state = WorkerState::Stopped;
        Ok(())
    }

    async fn state(&self) -> WorkerState {
        self.journal.lock().await.state
    }

    async fn handle_outbound(
        &mut self,
        msg: TransportMessage,
    ) -> Result<TransportMessage, WorkerError> {
        let mut journal = self.journal.lock().await;
        if journal.state != WorkerState::Running {
            return Err(WorkerError::InvalidState("outbound".into()));
        }
        journal.outbound.push(msg.clone());
        Ok(msg)
    }

    async fn handle_inbound(&mut self, msg: TransportMessage) -> Result<(), WorkerError> {
        let mut journal = self.journal.lock().await;
        if journal.state != WorkerState::Running {
            return Err(WorkerError::InvalidState("inbound".into()));
        }
        journal.inbound.push(msg);
        Ok(())
    }
}
