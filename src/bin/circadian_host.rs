//! Headless host binary for stdin/stdout JSON communication.
//!
//! Reads host commands as newline-delimited JSON from stdin, drives the
//! attention engine, and writes responses, engine events and output-channel
//! activity to stdout.
//!
//! All tracing/diagnostic output goes to stderr so that stdout remains a
//! clean JSON protocol channel.

use circadian::CircadianConfig;
use circadian::host::run_stdio_bridge;
use std::path::PathBuf;

/// Environment variable overriding the config file location.
const CONFIG_ENV: &str = "CIRCADIAN_CONFIG";

fn load_config() -> anyhow::Result<CircadianConfig> {
    let path = std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(CircadianConfig::default_config_path);
    if !path.exists() {
        tracing::info!(path = %path.display(), "no config file; using defaults");
        return Ok(CircadianConfig::default());
    }
    let config = CircadianConfig::from_file(&path)
        .map_err(|e| anyhow::anyhow!("cannot load {}: {e}", path.display()))?;
    tracing::info!(path = %path.display(), "loaded config");
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise tracing to stderr only (stdout is reserved for the JSON
    // protocol).
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("circadian-host starting");

    let config = load_config()?;
    run_stdio_bridge(config).await.map_err(|e| {
        tracing::error!(error = %e, "circadian-host exited with error");
        anyhow::anyhow!("circadian-host failed: {e}")
    })?;

    tracing::info!("circadian-host shut down cleanly");
    Ok(())
}
