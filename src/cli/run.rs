use clap::Args;
use tokio::signal;
use tracing::{error, info, warn};

use super::CliContext;
use junction::{channel::Channel, logger::init_tracing, supervisor::ServiceParent};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Optional log level override (e.g. error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// OpenTelemetry endpoint (e.g. http://localhost:4318/v1/logs)
    #[arg(long)]
    pub otel_endpoint: Option<String>,
}

impl RunArgs {
    pub fn default_runtime() -> Self {
        Self {
            log_level: "info".to_string(),
            otel_endpoint: None,
        }
    }
}

pub async fn execute(args: RunArgs, context: &CliContext) -> anyhow::Result<()> {
    let _telemetry = init_tracing(
        &context.root,
        "logs/junction.log",
        "logs/junction-events.json",
        &args.log_level,
        args.otel_endpoint.as_deref(),
    )?;
    info!(root = %context.root.display(), "junction starting up");

    let ctx = context.channel_context().await?;
    let parent = ServiceParent::new("junction");

    let mut channels = Vec::new();
    for id in Channel::get_all(&ctx.store).await? {
        let mut channel = match Channel::from_id(ctx.clone(), &id, &parent).await {
            Ok(channel) => channel,
            Err(err) => {
                error!(channel = %id, code = err.code(), "could not load channel: {err}");
                continue;
            }
        };
        match channel.start(&parent, None).await {
            Ok(()) => channels.push(channel),
            Err(err) => error!(channel = %id, code = err.code(), "could not start channel: {err}"),
        }
    }

    info!(channels = channels.len(), "junction running; press Ctrl-C to exit");
    println!("junction running {} channel(s); press Ctrl-C to exit", channels.len());

    signal::ctrl_c().await?;

    info!("junction shutting down");
    for channel in &mut channels {
        if let Err(err) = channel.stop().await {
            warn!(channel = channel.id(), "stop failed: {err}");
        }
    }
    parent.shutdown().await;
    println!("Goodbye!");
    Ok(())
}
