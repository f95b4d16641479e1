//! Heartbeat Hub server
//!
//! Reads configuration from `$HEARTBEAT_HUB_CONFIG` or
//! `~/.config/heartbeat-hub/config.toml`. See the `heartbeat-hub-cli`
//! binary for command-line overrides.

use tracing::{error, info};

use heartbeat_hub::server::{init_tracing, ServerHandle, ServerOptions};
use heartbeat_hub::{default_config_path, AppConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = default_config_path();

    let (config, load_error) = match AppConfig::load(&config_path) {
        Ok(cfg) => (cfg, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };
    init_tracing(&config);

    match load_error {
        None => info!(path = %config_path.display(), "Configuration loaded"),
        Some(e) => error!(path = %config_path.display(), error = %e, "Failed to load config, using defaults"),
    }

    let handle = ServerHandle::start(ServerOptions {
        config,
        install_metrics: true,
    })
    .await?;
    handle.install_signal_handler();

    info!("Press Ctrl+C to shut down");
    handle.wait().await;
    Ok(())
}
