use std::sync::{Arc, OnceLock};

use serde_json::Value;
use strum_macros::{AsRefStr, Display, EnumString};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::message::*;
use crate::worker_helpers::WorkerError;
use crate::worker_runtime::WorkerHandler;

// -----------------------------------------------------------------------------
// Commands for the actor
// -----------------------------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, EnumString, AsRefStr, Display)]
#[strum(serialize_all = "camelCase")]
pub enum Method {
    Start,
    Stop,
    State,
    Health,
    Outbound,
    Inbound,
}

#[derive(Debug)]
pub enum Command {
    Start(WorkerConfig, oneshot::Sender<Result<(), WorkerError>>),
    Stop(oneshot::Sender<Result<(), WorkerError>>),
    State(oneshot::Sender<WorkerState>),
    Health(oneshot::Sender<HealthResult>),
    Outbound(TransportMessage, oneshot::Sender<Result<TransportMessage, WorkerError>>),
    Inbound(TransportMessage, oneshot::Sender<Result<(), WorkerError>>),
}

impl Command {
    pub fn method(&self) -> Method {
        match self {
            Command::Start(..) => Method::Start,
            Command::Stop(..) => Method::Stop,
            Command::State(..) => Method::State,
            Command::Health(..) => Method::Health,
            Command::Outbound(..) => Method::Outbound,
            Command::Inbound(..) => Method::Inbound,
        }
    }
}

/// Returned when a worker is spawned in-process.
///
/// Clones talk to the same actor. `instance_id` is fresh for every spawned
/// worker, so a recreated worker never compares equal to its predecessor.
#[derive(Clone, Debug)]
pub struct WorkerHandle {
    tx: mpsc::Sender<Command>,
    instance_id: String,
    implementation: String,
    config: Arc<WorkerConfig>,
    name: Arc<OnceLock<String>>,
}

impl PartialEq for WorkerHandle {
    fn eq(&self, other: &Self) -> bool {
        self.instance_id == other.instance_id
    }
}

impl Eq for WorkerHandle {}

impl WorkerHandle {
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn implementation(&self) -> &str {
        &self.implementation
    }

    /// Config the worker is started with.
    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn config_value(&self, key: &str) -> Option<&Value> {
        self.config.get(key)
    }

    /// Name given to the worker when it was attached to a parent.
    pub fn name(&self) -> Option<&str> {
        self.name.get().map(String::as_str)
    }

    /// Name the worker. A worker keeps its first name for life; renaming it is
    /// an error, naming it again with the same name is not.
    pub fn set_name(&self, name: &str) -> Result<(), WorkerError> {
        match self.name.get() {
            Some(existing) if existing == name => Ok(()),
            Some(existing) => Err(WorkerError::InvalidState(format!(
                "rename `{existing}` to `{name}`"
            ))),
            None => {
                // a racing `set_name` with the same value is fine
                let _ = self.name.set(name.to_string());
                match self.name.get() {
                    Some(current) if current == name => Ok(()),
                    _ => Err(WorkerError::InvalidState(format!("rename to `{name}`"))),
                }
            }
        }
    }

    fn label(&self) -> String {
        self.name()
            .map(str::to_string)
            .unwrap_or_else(|| self.instance_id.clone())
    }

    /// Send one command and wait for the actor's answer.
    async fn call<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, WorkerError> {
        let (tx_rsp, rx_rsp) = oneshot::channel();
        self.tx
            .send(build(tx_rsp))
            .await
            .map_err(|_| WorkerError::ActorGone(self.label()))?;
        rx_rsp
            .await
            .map_err(|_| WorkerError::ActorGone(self.label()))
    }

    // ---------------------------------------------------------------------
    // Convenience wrappers
    // ---------------------------------------------------------------------

    pub async fn start(&self) -> Result<(), WorkerError> {
        let config = (*self.config).clone();
        self.call(|tx| Command::Start(config, tx)).await?
    }

    pub async fn stop(&self) -> Result<(), WorkerError> {
        self.call(Command::Stop).await?
    }

    pub async fn state(&self) -> Result<WorkerState, WorkerError> {
        self.call(Command::State).await
    }

    pub async fn health(&self) -> Result<HealthResult, WorkerError> {
        self.call(Command::Health).await
    }

    pub async fn send_outbound(
        &self,
        msg: TransportMessage,
    ) -> Result<TransportMessage, WorkerError> {
        self.call(|tx| Command::Outbound(msg, tx)).await?
    }

    pub async fn deliver_inbound(&self, msg: TransportMessage) -> Result<(), WorkerError> {
        self.call(|tx| Command::Inbound(msg, tx)).await?
    }
}

// -----------------------------------------------------------------------------
// Launch worker actor and return its handle
// -----------------------------------------------------------------------------

/// Move `worker` into its own task and return a handle to it. The task ends
/// once every clone of the handle has been dropped.
pub fn spawn_worker_actor<W: WorkerHandler>(mut worker: W, config: WorkerConfig) -> WorkerHandle {
    let (tx, mut rx) = mpsc::channel::<Command>(32);
    let instance_id = Uuid::new_v4().to_string();
    let implementation = worker.implementation().to_string();

    let actor_id = instance_id.clone();
    tokio::spawn(async move {
        while let Some(cmd) = rx.recv().await {
            trace!(worker = %actor_id, method = %cmd.method(), "worker command");
            match cmd {
                Command::Start(config, tx) => {
                    let _ = tx.send(worker.start(config).await);
                }
                Command::Stop(tx) => {
                    let _ = tx.send(worker.stop().await);
                }
                Command::State(tx) => {
                    let _ = tx.send(worker.state().await);
                }
                Command::Health(tx) => {
                    let _ = tx.send(worker.health().await);
                }
                Command::Outbound(msg, tx) => {
                    let _ = tx.send(worker.handle_outbound(msg).await);
                }
                Command::Inbound(msg, tx) => {
                    let _ = tx.send(worker.handle_inbound(msg).await);
                }
            }
        }
        // every handle is gone: make sure nothing is left running
        if worker.state().await != WorkerState::Stopped {
            if let Err(err) = worker.stop().await {
                warn!(worker = %actor_id, "stop on drop failed: {err}");
            }
        }
        debug!(worker = %actor_id, "worker actor exited");
    });

    WorkerHandle {
        tx,
        instance_id,
        implementation,
        config: Arc::new(config),
        name: Arc::new(OnceLock::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    #[derive(Default)]
    struct Counter {
        state: WorkerState,
        seen: Vec<String>,
    }

    #[async_trait]
    impl WorkerHandler for Counter {
        fn implementation(&self) -> &str {
            "test.Counter"
        }

        async fn start(&mut self, config: WorkerConfig) -> Result<(), WorkerError> {
            if config.get("fail").is_some() {
                return Err(WorkerError::Config("asked to fail".into()));
            }
            self.state = WorkerState::Running;
            Ok(())
        }

        async fn stop(&mut self) -> Result<(), WorkerError> {
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
            self.seen.push(msg.message_id.clone());
            Ok(msg)
        }
    }

    fn cfg(v: serde_json::Value) -> WorkerConfig {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn start_stop_roundtrip() {
        let handle = spawn_worker_actor(Counter::default(), cfg(json!({"transport_name": "t"})));
        assert_eq!(handle.implementation(), "test.Counter");
        assert_eq!(handle.state().await.unwrap(), WorkerState::Stopped);
        handle.start().await.unwrap();
        assert_eq!(handle.state().await.unwrap(), WorkerState::Running);
        assert!(handle.health().await.unwrap().healthy);
        handle.stop().await.unwrap();
        assert_eq!(handle.state().await.unwrap(), WorkerState::Stopped);
        assert!(!handle.health().await.unwrap().healthy);
    }

    #[tokio::test]
    async fn start_error_is_returned() {
        let handle = spawn_worker_actor(Counter::default(), cfg(json!({"fail": true})));
        let err = handle.start().await.unwrap_err();
        assert_eq!(err, WorkerError::Config("asked to fail".into()));
    }

    #[tokio::test]
    async fn default_inbound_is_unsupported() {
        let handle = spawn_worker_actor(Counter::default(), WorkerConfig::new());
        let msg = TransportMessage::send("t", None, "me", Some("x".into()));
        let err = handle.deliver_inbound(msg.clone()).await.unwrap_err();
        assert!(matches!(err, WorkerError::Unsupported(_)));
        let out = handle.send_outbound(msg.clone()).await.unwrap();
        assert_eq!(out, msg);
    }

    #[tokio::test]
    async fn names_are_sticky() {
        let handle = spawn_worker_actor(Counter::default(), WorkerConfig::new());
        assert_eq!(handle.name(), None);
        handle.set_name("abc").unwrap();
        handle.set_name("abc").unwrap();
        assert!(handle.set_name("other").is_err());
        assert_eq!(handle.clone().name(), Some("abc"));
    }

    #[tokio::test]
    async fn each_spawn_gets_a_new_identity() {
        let a = spawn_worker_actor(Counter::default(), WorkerConfig::new());
        let b = spawn_worker_actor(Counter::default(), WorkerConfig::new());
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }
}
