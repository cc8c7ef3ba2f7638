use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::Level;

use relay_llm::{GeminiConfig, GeminiProvider};
use relay_server::{RelayHandler, ServerConfig};
use relay_settings::RelaySettings;
use relay_telemetry::TelemetryConfig;

/// WebSocket relay between browser clients and Gemini.
#[derive(Debug, Parser)]
#[command(name = "relay", version)]
struct Cli {
    /// Settings file (defaults to ~/.relay/settings.json).
    #[arg(long)]
    settings: Option<PathBuf>,
    /// Interface to bind.
    #[arg(long)]
    host: Option<String>,
    /// Port to listen on.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = match &cli.settings {
        Some(path) => relay_settings::load_settings_from_path(path),
        None => relay_settings::load_settings(),
    }
    .context("failed to load settings")?;
    if let Some(host) = cli.host {
        settings.server.host = host;
    }
    if let Some(port) = cli.port {
        settings.server.port = port;
    }

    let level = settings.logging.level.parse::<Level>().ok();
    relay_telemetry::init_telemetry(&TelemetryConfig {
        log_level: level.unwrap_or(Level::INFO),
        json: settings.logging.json,
    });
    if level.is_none() {
        tracing::warn!(level = %settings.logging.level, "unknown log level, using info");
    }

    let relay = Arc::new(build_relay(&settings)?);
    let config = ServerConfig {
        host: settings.server.host.clone(),
        port: settings.server.port,
    };
    let handle = relay_server::start(config, relay)
        .await
        .context("failed to start server")?;

    tracing::info!(addr = %handle.addr, "relay ready");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl+c")?;

    tracing::info!("shutting down");
    handle.shutdown();
    Ok(())
}

fn build_relay(settings: &RelaySettings) -> anyhow::Result<RelayHandler> {
    let provider_settings = &settings.provider;
    if !provider_settings.has_api_key() {
        tracing::warn!("GEMINI_API_KEY is not set; every turn will fail until it is");
    }

    let mut config = GeminiConfig::new(
        provider_settings.model.clone(),
        provider_settings.api_key.clone(),
    );
    config.base_url = provider_settings.base_url.clone();
    let provider = GeminiProvider::new(config).context("failed to build Gemini client")?;

    Ok(RelayHandler::new(
        Arc::new(provider),
        settings.server.default_system_prompt.clone(),
        provider_settings.generate_options(),
    ))
}
