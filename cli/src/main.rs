//! Heartbeat Hub CLI server
//!
//! ```sh
//! # Run with default config (~/.config/heartbeat-hub/config.toml)
//! heartbeat-hub-cli
//!
//! # Custom config, different port, no broker
//! heartbeat-hub-cli --config /etc/heartbeat-hub.toml --port 9090 --no-mqtt
//!
//! # Validate config without starting
//! heartbeat-hub-cli --check
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

use heartbeat_hub::config::{AppConfig, StorageBackend, CONFIG_ENV_VAR};
use heartbeat_hub::server::{init_tracing, ServerHandle, ServerOptions};

/// Stores device heartbeats and streams them live to dashboards.
#[derive(Parser, Debug)]
#[command(name = "heartbeat-hub-cli", version, about)]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(short, long, env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    /// Override the HTTP listen port.
    #[arg(short, long)]
    port: Option<u16>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(short, long)]
    log_level: Option<String>,

    /// Do not connect to the MQTT broker.
    #[arg(long)]
    no_mqtt: bool,

    /// Keep heartbeats in memory instead of the configured database.
    #[arg(long)]
    in_memory: bool,

    /// Validate the configuration file and exit without starting the server.
    #[arg(long)]
    check: bool,

    /// Skip installing the Prometheus recorder and the /metrics route.
    #[arg(long)]
    no_metrics: bool,
}

impl Cli {
    fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(ref level) = self.log_level {
            config.logging.level = level.clone();
        }
        if self.no_mqtt {
            config.mqtt.enabled = false;
        }
        if self.in_memory {
            config.database.backend = StorageBackend::Memory;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(heartbeat_hub::default_config_path);

    let loaded = AppConfig::load(&config_path);

    if cli.check {
        let mut config = loaded?;
        cli.apply_overrides(&mut config);
        config.validate()?;
        println!("Configuration is valid");
        println!("  Config file : {}", config_path.display());
        println!("  HTTP address: {}", config.api_address());
        println!("  Storage     : {:?} ({})", config.database.backend, config.database.url);
        if config.mqtt.enabled {
            println!(
                "  MQTT        : {}:{} topic '{}'",
                config.mqtt.host, config.mqtt.port, config.mqtt.topic
            );
        } else {
            println!("  MQTT        : disabled");
        }
        println!("  Log level   : {}", config.logging.level);
        return Ok(());
    }

    let (mut config, load_error) = match loaded {
        Ok(cfg) => (cfg, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };
    cli.apply_overrides(&mut config);
    init_tracing(&config);

    match load_error {
        None => info!(path = %config_path.display(), "Configuration loaded"),
        Some(e) => {
            error!(path = %config_path.display(), error = %e, "Failed to load config");
            error!("Using default configuration");
        }
    }

    let handle = ServerHandle::start(ServerOptions {
        config,
        install_metrics: !cli.no_metrics,
    })
    .await?;
    handle.install_signal_handler();

    info!("Press Ctrl+C to shut down gracefully");
    handle.wait().await;

    Ok(())
}
