//! deployhook - Entry Point
//!
//! Listens for CI webhooks and runs the configured deployment commands.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use deployhook::app::options::AppOptions;
use deployhook::app::run::run;
use deployhook::config::settings::Settings;
use deployhook::config::store::{ConfigStore, EnvFileStore, EnvStore, LayeredStore};
use deployhook::logs::{init_logging, LogOptions};
use deployhook::utils::version_info;

use tracing::{error, info, warn};

const DEFAULT_ENV_FILE: &str = "config.env";

#[tokio::main]
async fn main() {
    if let Err(e) = start().await {
        error!("deployhook exited with error: {:#}", e);
        eprintln!("deployhook: {:#}", e);
        std::process::exit(1);
    }
}

async fn start() -> anyhow::Result<()> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    let version = version_info();
    if cli_args.contains_key("version") {
        println!("{}", serde_json::to_string_pretty(&version)?);
        return Ok(());
    }

    // Process environment first, env file second (existing variables win)
    let env_file = cli_args
        .get("env-file")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_ENV_FILE));
    let env_file_store = EnvFileStore::new(&env_file);
    let store: Arc<dyn ConfigStore> = Arc::new(
        LayeredStore::new()
            .with_layer(Arc::new(EnvStore))
            .with_layer(Arc::new(env_file_store)),
    );

    let mut settings = Settings::from_store(store.as_ref()).context("invalid settings")?;
    if let Some(port) = cli_args.get("port") {
        settings.port = port
            .parse()
            .with_context(|| format!("invalid --port value '{}'", port))?;
    }

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        json_format: settings.log_json,
        log_dir: settings.log_dir.clone(),
        ..Default::default()
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            println!("Failed to initialize logging: {e}");
            None
        }
    };

    if env_file.exists() {
        info!(path = %env_file.display(), "Using environment file");
    } else if cli_args.contains_key("env-file") {
        warn!(path = %env_file.display(), "Environment file not found, using process environment only");
    }

    info!(version = %version.version, git_hash = %version.git_hash, "Starting deployhook");
    let options = AppOptions::from_settings(settings);
    run(options, store, await_shutdown_signal()).await?;
    Ok(())
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
                _ => {
                    error!("Unable to install signal handlers, falling back to Ctrl+C");
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
        info!("Ctrl+C received, shutting down...");
    }
}
