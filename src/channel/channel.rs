use std::{collections::BTreeSet, sync::Arc};

use junction_worker::WorkerHandle;
use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    error::{ChannelError, Result},
    registry::TransportRegistry,
    settings::{ChannelSettings, validate_shape},
    store::{CHANNELS_SET, ChannelStore},
    translate::{api_from_message, message_from_api},
};
use crate::{
    logger::LIFECYCLE_TARGET,
    message::ApiMessage,
    sender::MessageSender,
    supervisor::{ServiceParent, WorkerSupervisor},
    workers::FORWARDING_WORKER,
};

/// Name the application worker of channel `id` is attached under.
pub fn application_id(id: &str) -> String {
    format!("application:{id}")
}

/// Collaborators every channel needs.
#[derive(Clone, Debug)]
pub struct ChannelContext {
    pub store: ChannelStore,
    pub supervisor: Arc<dyn WorkerSupervisor>,
    pub registry: TransportRegistry,
}

impl ChannelContext {
    pub fn new(store: ChannelStore, supervisor: Arc<dyn WorkerSupervisor>) -> Self {
        Self {
            store,
            supervisor,
            registry: TransportRegistry::default(),
        }
    }

    pub fn with_registry(mut self, registry: TransportRegistry) -> Self {
        self.registry = registry;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelLifecycle {
    #[default]
    Unstarted,
    Running,
    Stopped,
    Deleted,
}

/// A binding between one transport worker and its application worker.
///
/// The transport is attached under the channel id, the application under
/// `application:<id>`. Lifecycle operations take `&mut self`, so one
/// instance never runs two of them at once.
#[derive(Debug)]
pub struct Channel {
    id: String,
    properties: Map<String, Value>,
    ctx: ChannelContext,
    parent: Option<ServiceParent>,
    transport_worker: Option<WorkerHandle>,
    application_worker: Option<WorkerHandle>,
    lifecycle: ChannelLifecycle,
}

impl Channel {
    /// Build a channel in memory. Nothing is persisted or started.
    pub fn new(
        ctx: ChannelContext,
        properties: Map<String, Value>,
        id: Option<String>,
    ) -> Result<Self> {
        validate_shape(&properties)?;
        Ok(Self {
            id: id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            properties,
            ctx,
            parent: None,
            transport_worker: None,
            application_worker: None,
            lifecycle: ChannelLifecycle::Unstarted,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn application_id(&self) -> String {
        application_id(&self.id)
    }

    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }

    pub fn lifecycle(&self) -> ChannelLifecycle {
        self.lifecycle
    }

    pub fn parent(&self) -> Option<&ServiceParent> {
        self.parent.as_ref()
    }

    pub fn transport_worker(&self) -> Option<&WorkerHandle> {
        self.transport_worker.as_ref()
    }

    pub fn application_worker(&self) -> Option<&WorkerHandle> {
        self.application_worker.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.transport_worker.is_some() || self.application_worker.is_some()
    }

    fn ensure_live(&self) -> Result<()> {
        if self.lifecycle == ChannelLifecycle::Deleted {
            return Err(ChannelError::ChannelDeleted {
                id: self.id.clone(),
            });
        }
        Ok(())
    }

    /// Start the transport and application workers under `parent`.
    ///
    /// A running channel is stopped first. When `transport_override` is given
    /// it is attached instead of a freshly created transport worker.
    #[tracing::instrument(skip_all, fields(channel = %self.id, parent = %parent.name()))]
    pub async fn start(
        &mut self,
        parent: &ServiceParent,
        transport_override: Option<WorkerHandle>,
    ) -> Result<()> {
        self.ensure_live()?;
        let settings = ChannelSettings::resolve(&self.id, &self.properties, &self.ctx.registry)?;

        if self.is_running() {
            self.stop().await?;
        }
        self.parent = Some(parent.clone());

        let transport = match transport_override {
            Some(handle) => handle,
            None => self
                .ctx
                .supervisor
                .create_worker(&settings.implementation, settings.transport_config())?,
        };
        self.ctx
            .supervisor
            .attach(parent, &self.id, transport.clone())
            .await?;
        self.transport_worker = Some(transport);

        let application = self
            .ctx
            .supervisor
            .create_worker(FORWARDING_WORKER, settings.application_config())?;
        self.ctx
            .supervisor
            .attach(parent, &self.application_id(), application.clone())
            .await?;
        self.application_worker = Some(application);

        self.lifecycle = ChannelLifecycle::Running;
        info!(target: LIFECYCLE_TARGET, channel_type = %settings.channel_type, "channel started");
        Ok(())
    }

    /// Stop the application worker, then the transport worker.
    #[tracing::instrument(skip_all, fields(channel = %self.id))]
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(application) = self.application_worker.clone() {
            self.detach(&application).await?;
            self.application_worker = None;
        }
        if let Some(transport) = self.transport_worker.clone() {
            self.detach(&transport).await?;
            self.transport_worker = None;
        }
        if self.lifecycle != ChannelLifecycle::Deleted {
            self.lifecycle = ChannelLifecycle::Stopped;
        }
        info!(target: LIFECYCLE_TARGET, "channel stopped");
        Ok(())
    }

    async fn detach(&self, handle: &WorkerHandle) -> Result<()> {
        match &self.parent {
            Some(parent) => self.ctx.supervisor.detach(parent, handle).await?,
            None => handle.stop().await?,
        }
        Ok(())
    }

    /// Persist the properties and register the id.
    pub async fn save(&self) -> Result<()> {
        self.ensure_live()?;
        let raw = serde_json::to_string(&self.properties)?;
        self.ctx.store.set(&self.id, &raw).await?;
        self.ctx.store.add_to_set(CHANNELS_SET, &self.id).await?;
        debug!(channel = %self.id, "channel saved");
        Ok(())
    }

    /// Merge `partial` into the properties and save.
    ///
    /// A running channel is restarted under the same parent only when
    /// `partial` carries a non-null `config`.
    #[tracing::instrument(skip_all, fields(channel = %self.id))]
    pub async fn update(&mut self, partial: Map<String, Value>) -> Result<Value> {
        self.ensure_live()?;
        let restart = partial.get("config").is_some_and(|config| !config.is_null());

        let mut merged = self.properties.clone();
        merged.extend(partial);
        validate_shape(&merged)?;
        self.properties = merged;
        self.save().await?;

        if restart && self.is_running() {
            if let Some(parent) = self.parent.clone() {
                self.stop().await?;
                self.start(&parent, None).await?;
                info!(target: LIFECYCLE_TARGET, "channel restarted with new config");
            }
        }
        Ok(self.status())
    }

    /// Remove the persisted record and the id. Workers keep running.
    pub async fn delete(&mut self) -> Result<()> {
        self.ctx.store.delete(&self.id).await?;
        self.ctx.store.remove_from_set(CHANNELS_SET, &self.id).await?;
        self.lifecycle = ChannelLifecycle::Deleted;
        info!(target: LIFECYCLE_TARGET, channel = %self.id, "channel deleted");
        Ok(())
    }

    /// Properties plus `id` and an empty `status` object.
    pub fn status(&self) -> Value {
        let mut status = self.properties.clone();
        status.insert("id".to_string(), json!(self.id));
        status.insert("status".to_string(), json!({}));
        Value::Object(status)
    }

    /// Pick up workers already attached to `parent` under this channel's
    /// names. Never creates workers.
    pub fn restore_from(&mut self, parent: &ServiceParent) {
        self.parent = Some(parent.clone());
        self.transport_worker = self.ctx.supervisor.lookup_existing(parent, &self.id);
        self.application_worker = self
            .ctx
            .supervisor
            .lookup_existing(parent, &self.application_id());
        if self.is_running() {
            self.lifecycle = ChannelLifecycle::Running;
        }
    }

    /// Load channel `id` from the store and restore its workers.
    pub async fn from_id(ctx: ChannelContext, id: &str, parent: &ServiceParent) -> Result<Self> {
        let raw = ctx
            .store
            .get(id)
            .await?
            .ok_or_else(|| ChannelError::ChannelNotFound { id: id.to_string() })?;
        let properties: Map<String, Value> = serde_json::from_str(&raw)?;
        let mut channel = Self::new(ctx, properties, Some(id.to_string()))?;
        channel.restore_from(parent);
        Ok(channel)
    }

    pub async fn get_all(store: &ChannelStore) -> Result<BTreeSet<String>> {
        Ok(store.members_of(CHANNELS_SET).await?)
    }

    /// Send `msg` out through channel `id` and return what was published.
    #[tracing::instrument(skip(sender, msg))]
    pub async fn send_message(
        id: &str,
        sender: &dyn MessageSender,
        msg: &ApiMessage,
    ) -> Result<ApiMessage> {
        let internal = message_from_api(id, msg)?;
        let sent = sender
            .send_message(internal, &format!("{id}.outbound"))
            .await?;
        Ok(api_from_message(&sent))
    }
}
