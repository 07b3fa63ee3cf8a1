use std::{
    path::{Path, PathBuf},
    sync::OnceLock,
};

use anyhow::{Context, Result, anyhow};
use opentelemetry::global;
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::{LogExporter, Protocol, SpanExporter, WithExportConfig};
use opentelemetry_sdk::{Resource, logs::SdkLoggerProvider, trace::SdkTracerProvider};
use tracing::info;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*};

/// Target of the JSON lifecycle events written next to the text log.
pub const LIFECYCLE_TARGET: &str = "lifecycle";

const SERVICE_NAME: &str = "junction";

static RESOURCE: OnceLock<Resource> = OnceLock::new();
fn get_resource() -> Resource {
    RESOURCE
        .get_or_init(|| Resource::builder().with_service_name(SERVICE_NAME).build())
        .clone()
}

/// Keeps the OTLP providers alive; flushes them on drop.
#[derive(Default)]
pub struct Telemetry {
    logger_provider: Option<SdkLoggerProvider>,
    tracer_provider: Option<SdkTracerProvider>,
}

impl Drop for Telemetry {
    fn drop(&mut self) {
        if let Some(provider) = self.logger_provider.take() {
            let _ = provider.shutdown();
        }
        if let Some(provider) = self.tracer_provider.take() {
            let _ = provider.shutdown();
        }
    }
}

/// Install the global subscriber.
///
/// With an `otel_endpoint` logs and spans go to OTLP over HTTP plus stdout;
/// otherwise to a daily text log and a daily JSON lifecycle log under `root`,
/// echoed on stderr.
pub fn init_tracing(
    root: &Path,
    log_file: &str,
    event_file: &str,
    log_level: &str,
    otel_endpoint: Option<&str>,
) -> Result<Telemetry> {
    match otel_endpoint {
        Some(endpoint) => init_otel(log_level, endpoint),
        None => init_files(log_level, root.join(log_file), root.join(event_file)),
    }
}

fn init_logs(endpoint: &str) -> Result<SdkLoggerProvider> {
    let exporter = LogExporter::builder()
        .with_http()
        .with_protocol(Protocol::HttpBinary)
        .with_endpoint(endpoint)
        .build()
        .context("building OTLP log exporter")?;
    Ok(SdkLoggerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(get_resource())
        .build())
}

fn init_traces(endpoint: &str) -> Result<SdkTracerProvider> {
    let exporter = SpanExporter::builder()
        .with_http()
        .with_protocol(Protocol::HttpBinary)
        .with_endpoint(endpoint)
        .build()
        .context("building OTLP span exporter")?;
    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(get_resource())
        .build())
}

fn init_otel(log_level: &str, endpoint: &str) -> Result<Telemetry> {
    let logger_provider = init_logs(endpoint)?;
    let tracer_provider = init_traces(endpoint)?;

    // keep the exporter's own HTTP traffic out of the export
    let otel_filter = EnvFilter::new(log_level)
        .add_directive("hyper=off".parse()?)
        .add_directive("h2=off".parse()?)
        .add_directive("reqwest=off".parse()?);
    let otel_layer = OpenTelemetryTracingBridge::new(&logger_provider).with_filter(otel_filter);

    let fmt_layer = fmt::layer()
        .with_thread_names(true)
        .with_filter(EnvFilter::new(log_level));

    Registry::default()
        .with(otel_layer)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| anyhow!("tracing subscriber already installed: {e}"))?;

    global::set_tracer_provider(tracer_provider.clone());
    info!(endpoint, "OTLP logging enabled");

    Ok(Telemetry {
        logger_provider: Some(logger_provider),
        tracer_provider: Some(tracer_provider),
    })
}

fn rolling(path: &Path) -> Result<RollingFileAppender> {
    let dir = path
        .parent()
        .ok_or_else(|| anyhow!("log path `{}` has no directory", path.display()))?;
    let name = path
        .file_name()
        .ok_or_else(|| anyhow!("log path `{}` has no file name", path.display()))?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating log directory {}", dir.display()))?;
    Ok(RollingFileAppender::new(Rotation::DAILY, dir, name))
}

fn init_files(log_level: &str, log_file: PathBuf, event_file: PathBuf) -> Result<Telemetry> {
    let txt_layer = fmt::layer()
        .with_writer(rolling(&log_file)?)
        .with_ansi(false)
        .with_filter(EnvFilter::new(log_level));

    let json_layer = fmt::layer()
        .json()
        .with_writer(rolling(&event_file)?)
        .with_target(true)
        .with_filter(EnvFilter::new(format!("{LIFECYCLE_TARGET}=info")));

    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(log_level));

    Registry::default()
        .with(txt_layer)
        .with(json_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| anyhow!("tracing subscriber already installed: {e}"))?;

    Ok(Telemetry::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn rolling_creates_log_directory() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("logs").join("junction.log");
        rolling(&path).unwrap();
        assert!(tmp.path().join("logs").is_dir());
    }

    #[test]
    fn rolling_needs_a_file_name() {
        assert!(rolling(Path::new("/")).is_err());
    }
}
