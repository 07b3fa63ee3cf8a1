use std::{path::PathBuf, sync::Arc};

use clap::{Parser, Subcommand};

pub mod channel;
pub mod config;
pub mod run;
pub mod schema;

use channel::ChannelArgs;
use config::ConfigArgs;
use run::RunArgs;
use schema::SchemaArgs;

use junction::{
    channel::{ChannelContext, ChannelStore, TransportRegistry},
    config::{ConfigManager, WorkerOptions},
    store::{FileStore, StoreManager},
    supervisor::{Supervisor, WorkerFactory},
    workers::RelayTransport,
};

#[derive(Parser, Debug)]
#[command(
    name = "junction",
    about = "Channel lifecycle management for store-and-forward messaging",
    version = "0.2.0"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start every saved channel and run until Ctrl-C
    Run(RunArgs),

    /// Manage channels
    Channel(ChannelArgs),

    /// Emit JSON-Schema
    Schema(SchemaArgs),

    /// Handle configuration
    Config(ConfigArgs),
}

#[derive(Clone)]
pub struct CliContext {
    pub root: PathBuf,
    pub config_manager: ConfigManager,
}

impl CliContext {
    pub fn new(root: PathBuf, config_manager: ConfigManager) -> Self {
        Self {
            root,
            config_manager,
        }
    }

    pub fn store_path(&self) -> PathBuf {
        self.root.join("channels.json")
    }

    /// Store, supervisor and registry backed by the data directory.
    ///
    /// Every registered transport type is served by a [`RelayTransport`].
    pub async fn channel_context(&self) -> anyhow::Result<ChannelContext> {
        let backend = FileStore::open(self.store_path()).await?;
        let options = WorkerOptions::from_config(&self.config_manager).await?;

        let registry = TransportRegistry::default();
        let factory = WorkerFactory::with_defaults();
        for channel_type in registry.types() {
            if let Some(implementation) = registry.resolve(&channel_type) {
                let name = implementation.to_string();
                factory.register(implementation, move |_| RelayTransport::new(&name));
            }
        }

        Ok(ChannelContext::new(
            ChannelStore::new(StoreManager::new(Arc::new(backend))),
            Arc::new(Supervisor::new(factory, options)),
        )
        .with_registry(registry))
    }
}

pub async fn execute(context: &CliContext, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Run(args) => run::execute(args, context).await,
        Commands::Channel(args) => channel::execute(args, context).await,
        Commands::Schema(args) => schema::execute(args, context).await,
        Commands::Config(args) => config::execute(args, context).await,
    }
}

pub fn default_command() -> Commands {
    Commands::Run(RunArgs::default_runtime())
}
