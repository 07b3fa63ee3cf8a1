use std::{env, path::PathBuf};

use clap::Parser;
use junction::config::{ConfigManager, EnvConfigManager};

mod cli;

use cli::{Cli, CliContext};

/// Resolve the junction root directory from the environment or use default.
pub fn resolve_root_dir() -> PathBuf {
    if let Ok(path) = env::var("JUNCTION_ROOT") {
        PathBuf::from(path)
    } else {
        PathBuf::from("./junction")
    }
}

#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let root = resolve_root_dir();
    let config_manager = ConfigManager(EnvConfigManager::new(root.join("config").join(".env")));
    let context = CliContext::new(root, config_manager);
    let command = cli.command.unwrap_or_else(cli::default_command);
    cli::execute(&context, command).await
}
