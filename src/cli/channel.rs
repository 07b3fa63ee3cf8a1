use anyhow::{Context, bail};
use clap::{Args, Subcommand};
use serde_json::{Map, Value, json};

use super::CliContext;
use junction::{
    channel::{Channel, ChannelSettings},
    logger::init_tracing,
    supervisor::ServiceParent,
};

#[derive(Args, Debug)]
pub struct ChannelArgs {
    /// Log level for this command
    #[arg(long, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: ChannelCommands,
}

#[derive(Subcommand, Debug)]
pub enum ChannelCommands {
    /// Create and save a channel
    Create {
        #[arg(long = "type")]
        channel_type: String,
        #[arg(long)]
        mo_url: String,
        /// Transport config as a JSON object
        #[arg(long)]
        config: Option<String>,
        #[arg(long)]
        id: Option<String>,
    },
    /// List channel ids
    List,
    Show {
        id: String,
    },
    /// Merge a JSON object into the channel's properties
    Update {
        id: String,
        #[arg(long)]
        patch: String,
    },
    Delete {
        id: String,
    },
}

fn parse_object(text: &str, what: &str) -> anyhow::Result<Map<String, Value>> {
    match serde_json::from_str(text).with_context(|| format!("{what} is not valid JSON"))? {
        Value::Object(map) => Ok(map),
        other => bail!("{what} must be a JSON object, got {other}"),
    }
}

fn print(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn execute(args: ChannelArgs, context: &CliContext) -> anyhow::Result<()> {
    let _telemetry = init_tracing(
        &context.root,
        "logs/junction-cli.log",
        "logs/junction-cli-events.json",
        &args.log_level,
        None,
    )?;
    let ctx = context.channel_context().await?;
    // workers only ever run under `junction run`
    let parent = ServiceParent::new("cli");

    match args.command {
        ChannelCommands::Create {
            channel_type,
            mo_url,
            config,
            id,
        } => {
            let config = match config {
                Some(text) => parse_object(&text, "--config")?,
                None => Map::new(),
            };
            let mut properties = Map::new();
            properties.insert("type".into(), json!(channel_type));
            properties.insert("config".into(), Value::Object(config));
            properties.insert("mo_url".into(), json!(mo_url));

            let channel = Channel::new(ctx.clone(), properties, id)?;
            ChannelSettings::resolve(channel.id(), channel.properties(), &ctx.registry)?;
            channel.save().await?;
            print(&channel.status())
        }
        ChannelCommands::List => {
            let ids: Vec<String> = Channel::get_all(&ctx.store).await?.into_iter().collect();
            print(&json!(ids))
        }
        ChannelCommands::Show { id } => {
            let channel = Channel::from_id(ctx, &id, &parent).await?;
            print(&channel.status())
        }
        ChannelCommands::Update { id, patch } => {
            let partial = parse_object(&patch, "--patch")?;
            let mut channel = Channel::from_id(ctx, &id, &parent).await?;
            print(&channel.update(partial).await?)
        }
        ChannelCommands::Delete { id } => {
            let mut channel = Channel::from_id(ctx, &id, &parent).await?;
            channel.delete().await?;
            println!("Channel `{id}` deleted.");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_object_rejects_non_objects() {
        assert!(parse_object(r#"{"a": 1}"#, "--patch").is_ok());
        assert!(parse_object("[1]", "--patch").is_err());
        assert!(parse_object("nope", "--patch").is_err());
    }
}
