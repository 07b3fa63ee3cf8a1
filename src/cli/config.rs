use clap::{Args, Subcommand};

use super::CliContext;
use junction::config::WorkerOptions;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    Set { key: String, value: String },
    Delete { key: String },
    /// Print the broker options workers will be built with
    Show,
}

pub async fn execute(args: ConfigArgs, context: &CliContext) -> anyhow::Result<()> {
    match args.command {
        ConfigCommands::Set { key, value } => {
            match context.config_manager.0.set(&key, &value).await {
                Ok(_) => println!("✅ Config set."),
                Err(err) => eprintln!("❌ Config could not be set: {err}"),
            }
            Ok(())
        }
        ConfigCommands::Delete { key } => {
            context.config_manager.0.del(&key).await;
            Ok(())
        }
        ConfigCommands::Show => {
            let mut options = WorkerOptions::from_config(&context.config_manager).await?;
            options.password = "********".to_string();
            println!("{}", serde_json::to_string_pretty(&options)?);
            Ok(())
        }
    }
}
