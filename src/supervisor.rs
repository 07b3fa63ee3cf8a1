//! Worker creation and supervision.
//!
//! A [`WorkerFactory`] knows how to build each worker implementation; a
//! [`ServiceParent`] owns the running workers by name. Channels talk to both
//! through the [`WorkerSupervisor`] trait so tests can swap in their own.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use dashmap::{DashMap, mapref::entry::Entry};
use junction_worker::{WorkerConfig, WorkerError, WorkerHandle, WorkerHandler, spawn_worker_actor};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    config::WorkerOptions,
    workers::forwarding::{FORWARDING_WORKER, MessageForwardingWorker},
};

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("unknown worker implementation `{0}`")]
    UnknownImplementation(String),

    #[error("a worker named `{0}` is already attached")]
    DuplicateWorker(String),

    #[error(transparent)]
    Worker(#[from] WorkerError),
}

pub type Constructor = Arc<dyn Fn(WorkerConfig, &WorkerOptions) -> WorkerHandle + Send + Sync>;

/// Registry of worker implementations by id.
#[derive(Clone, Default)]
pub struct WorkerFactory {
    constructors: Arc<DashMap<String, Constructor>>,
}

impl fmt::Debug for WorkerFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerFactory")
            .field("implementations", &self.list())
            .finish()
    }
}

impl WorkerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// A factory that knows the built-in application worker.
    pub fn with_defaults() -> Self {
        let factory = Self::new();
        factory.register(FORWARDING_WORKER, MessageForwardingWorker::from_options);
        factory
    }

    /// Register `implementation`, built by `build` whenever a worker is
    /// requested.
    pub fn register<W, F>(&self, implementation: &str, build: F)
    where
        W: WorkerHandler,
        F: Fn(&WorkerOptions) -> W + Send + Sync + 'static,
    {
        self.register_constructor(
            implementation,
            Arc::new(move |config: WorkerConfig, options: &WorkerOptions| {
                spawn_worker_actor(build(options), config)
            }),
        );
    }

    /// Register a constructor that spawns the worker itself.
    pub fn register_constructor(&self, implementation: &str, constructor: Constructor) {
        if self
            .constructors
            .insert(implementation.to_string(), constructor)
            .is_some()
        {
            debug!(implementation, "replaced worker constructor");
        }
    }

    pub fn contains(&self, implementation: &str) -> bool {
        self.constructors.contains_key(implementation)
    }

    pub fn list(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.constructors.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn create(
        &self,
        implementation: &str,
        config: WorkerConfig,
        options: &WorkerOptions,
    ) -> Result<WorkerHandle, SupervisorError> {
        // clone out so the map guard is not held while the worker spawns
        let constructor = self
            .constructors
            .get(implementation)
            .map(|c| Arc::clone(c.value()))
            .ok_or_else(|| SupervisorError::UnknownImplementation(implementation.to_string()))?;
        Ok(constructor(config, options))
    }
}

/// Named node of the supervision tree. Clones share the same children.
#[derive(Clone, Debug)]
pub struct ServiceParent {
    name: String,
    children: Arc<DashMap<String, WorkerHandle>>,
}

impl ServiceParent {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            children: Arc::new(DashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get_service_named(&self, name: &str) -> Option<WorkerHandle> {
        self.children.get(name).map(|h| h.value().clone())
    }

    pub fn child_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.children.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Name `handle`, start it with its config and adopt it.
    pub async fn attach(&self, name: &str, handle: WorkerHandle) -> Result<(), SupervisorError> {
        match self.children.entry(name.to_string()) {
            Entry::Occupied(_) => return Err(SupervisorError::DuplicateWorker(name.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(handle.clone());
            }
        }

        let started = match handle.set_name(name) {
            Ok(()) => handle.start().await,
            Err(err) => Err(err),
        };
        if let Err(err) = started {
            self.children
                .remove_if(name, |_, child| child.instance_id() == handle.instance_id());
            return Err(err.into());
        }

        debug!(parent = %self.name, worker = name, implementation = handle.implementation(), "worker attached");
        Ok(())
    }

    /// Stop `handle` and drop it from this parent. A worker that fails to
    /// stop stays attached.
    pub async fn detach(&self, handle: &WorkerHandle) -> Result<(), SupervisorError> {
        handle.stop().await?;
        if let Some(name) = handle.name() {
            self.children
                .remove_if(name, |_, child| child.instance_id() == handle.instance_id());
        }
        debug!(parent = %self.name, worker = ?handle.name(), "worker detached");
        Ok(())
    }

    /// Stop every child. Failures are logged and do not stop the sweep.
    pub async fn shutdown(&self) {
        let children: Vec<(String, WorkerHandle)> = self
            .children
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        self.children.clear();

        for (name, handle) in children {
            if let Err(err) = handle.stop().await {
                warn!(parent = %self.name, worker = %name, "stop failed during shutdown: {err}");
            }
        }
        info!(parent = %self.name, "service parent shut down");
    }
}

/// What a channel needs from the supervision layer.
#[async_trait]
pub trait WorkerSupervisor: Send + Sync + fmt::Debug {
    fn create_worker(
        &self,
        implementation: &str,
        config: WorkerConfig,
    ) -> Result<WorkerHandle, SupervisorError>;

    async fn attach(
        &self,
        parent: &ServiceParent,
        name: &str,
        handle: WorkerHandle,
    ) -> Result<(), SupervisorError>;

    async fn detach(
        &self,
        parent: &ServiceParent,
        handle: &WorkerHandle,
    ) -> Result<(), SupervisorError>;

    fn lookup_existing(&self, parent: &ServiceParent, name: &str) -> Option<WorkerHandle>;
}

/// Default supervisor: a factory plus the options every worker is built with.
#[derive(Clone, Debug)]
pub struct Supervisor {
    factory: WorkerFactory,
    options: WorkerOptions,
}

impl Supervisor {
    pub fn new(factory: WorkerFactory, options: WorkerOptions) -> Self {
        Self { factory, options }
    }

    pub fn factory(&self) -> &WorkerFactory {
        &self.factory
    }

    pub fn options(&self) -> &WorkerOptions {
        &self.options
    }
}

#[async_trait]
impl WorkerSupervisor for Supervisor {
    fn create_worker(
        &self,
        implementation: &str,
        config: WorkerConfig,
    ) -> Result<WorkerHandle, SupervisorError> {
        self.factory.create(implementation, config, &self.options)
    }

    async fn attach(
        &self,
        parent: &ServiceParent,
        name: &str,
        handle: WorkerHandle,
    ) -> Result<(), SupervisorError> {
        parent.attach(name, handle).await
    }

    async fn detach(
        &self,
        parent: &ServiceParent,
        handle: &WorkerHandle,
    ) -> Result<(), SupervisorError> {
        parent.detach(handle).await
    }

    fn lookup_existing(&self, parent: &ServiceParent, name: &str) -> Option<WorkerHandle> {
        parent.get_service_named(name)
    }
}
