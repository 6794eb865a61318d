//! Vista binary.
//!
//! - `vista serve`: run the HTTP + WebSocket server until ctrl-c
//! - `vista run`: execute one pipeline locally and print the result
//! - `vista plugins`: print the plugin catalog

#![deny(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use serde_json::Value;
use vista_core::{Payload, PipelineRequest, PipelineResult};
use vista_pipeline::{ExecutionOptions, PipelineEngine};
use vista_plugins::PluginRegistry;
use vista_plugins::builtin::default_registry;
use vista_server::{ServerConfig, VistaServer};
use vista_settings::VistaSettings;

/// Vista pipeline server.
#[derive(Parser, Debug)]
#[command(name = "vista", about = "Run tool pipelines over REST and WebSocket")]
struct Cli {
    /// Settings file (defaults to ~/.vista/settings.json).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Log filter, overriding the settings file.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Register the debug plugin regardless of settings.
    #[arg(long, global = true)]
    debug_plugins: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve `/pipeline`, `/ws`, `/health` and `/plugins`.
    Serve {
        /// Host to bind to.
        #[arg(long)]
        host: Option<String>,
        /// Port to bind to.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run one pipeline and print the result as JSON.
    Run {
        /// Plugin that owns the tools.
        #[arg(long)]
        plugin: String,
        /// Comma-separated tool names, in order.
        #[arg(long, value_delimiter = ',', required = true)]
        tools: Vec<String>,
        /// Initial payload as a JSON object.
        #[arg(long, default_value = "{}", conflicts_with = "payload_file")]
        payload: String,
        /// Read the initial payload from a file instead.
        #[arg(long)]
        payload_file: Option<PathBuf>,
        /// Print only the final payload, without steps.
        #[arg(long)]
        result_only: bool,
    },
    /// Print every plugin and its tools.
    Plugins,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(&cli)?;
    vista_core::logging::init_subscriber(&settings.logging.level, settings.logging.json);

    let registry: Arc<dyn PluginRegistry> =
        Arc::new(default_registry(settings.plugins.enable_debug));

    match cli.command {
        Command::Serve { host, port } => serve(&settings, registry, host, port).await,
        Command::Run {
            plugin,
            tools,
            payload,
            payload_file,
            result_only,
        } => {
            let payload = match payload_file {
                Some(path) => read_payload_file(&path)?,
                None => parse_payload(&payload)?,
            };
            let request = PipelineRequest::new(plugin, tools, payload);
            let result = run_once(PipelineEngine::new(registry), request, &settings).await?;
            let out = if result_only {
                serde_json::to_string_pretty(&result.result)?
            } else {
                serde_json::to_string_pretty(&result)?
            };
            println!("{out}");
            Ok(())
        }
        Command::Plugins => {
            let catalog = serde_json::to_string_pretty(&registry.catalog())?;
            println!("{catalog}");
            Ok(())
        }
    }
}

/// Settings from file and environment, with command-line overrides applied.
fn load_settings(cli: &Cli) -> Result<VistaSettings> {
    let mut settings = match &cli.settings {
        Some(path) => vista_settings::load_settings_from_path(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => vista_settings::load_settings().context("Failed to load settings")?,
    };
    if let Some(level) = &cli.log_level {
        settings.logging.level.clone_from(level);
    }
    if cli.debug_plugins {
        settings.plugins.enable_debug = true;
    }
    Ok(settings)
}

async fn serve(
    settings: &VistaSettings,
    registry: Arc<dyn PluginRegistry>,
    host: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    let mut config = ServerConfig::from_settings(settings);
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }

    let server = VistaServer::new(config, registry);
    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    tracing::info!(%addr, "press ctrl-c to stop");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;
    tracing::info!("shutting down");

    server.shutdown().graceful_shutdown(vec![handle], None).await;
    Ok(())
}

/// Execute one pipeline on the blocking pool under the REST deadline.
async fn run_once(
    engine: PipelineEngine,
    request: PipelineRequest,
    settings: &VistaSettings,
) -> Result<PipelineResult> {
    let options = ExecutionOptions::new().with_timeout(settings.pipeline.rest_timeout());
    tokio::task::spawn_blocking(move || engine.run(request, &options))
        .await
        .context("Pipeline worker failed")?
        .map_err(|e| anyhow!("{} ({})", e, e.code()))
}

fn parse_payload(text: &str) -> Result<Payload> {
    match serde_json::from_str::<Value>(text).context("Payload is not valid JSON")? {
        Value::Object(map) => Ok(map),
        other => bail!(
            "Payload must be a JSON object, got {}",
            vista_core::value_kind(&other)
        ),
    }
}

fn read_payload_file(path: &Path) -> Result<Payload> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read payload file {}", path.display()))?;
    parse_payload(&text)
}
