//! Server runtime
//!
//! [`ServerHandle`] owns the full lifecycle: metrics recorder, storage,
//! broadcast hub, ingestion pipeline, MQTT listener, REST/SSE server and
//! graceful shutdown.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use sea_orm::DatabaseConnection;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::application::broadcast::{create_broadcast_hub, SharedBroadcastHub};
use crate::application::ingestion::IngestionPipeline;
use crate::config::{AppConfig, StorageBackend};
use crate::domain::HeartbeatRepository;
use crate::infrastructure::database::{init_database, DatabaseConfig, SeaOrmHeartbeatRepository};
use crate::infrastructure::mqtt::spawn_mqtt_listener;
use crate::infrastructure::storage::InMemoryHeartbeatRepository;
use crate::interfaces::http::{create_api_router, AppState};
use crate::shared::shutdown::{ShutdownCoordinator, ShutdownSignal};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid configuration: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to install metrics recorder: {0}")]
    Metrics(String),
}

/// Options for starting the server.
pub struct ServerOptions {
    pub config: AppConfig,
    /// Install the global Prometheus recorder and mount `/metrics`.
    pub install_metrics: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            config: AppConfig::default(),
            install_metrics: true,
        }
    }
}

/// Handle to a running server
pub struct ServerHandle {
    pub hub: SharedBroadcastHub,
    pub repository: Arc<dyn HeartbeatRepository>,
    pub pipeline: IngestionPipeline,
    pub config: AppConfig,
    /// Address the REST/SSE server is bound to
    pub local_addr: SocketAddr,

    db: Option<DatabaseConnection>,
    shutdown: ShutdownCoordinator,
    api_task: JoinHandle<()>,
    mqtt_task: Option<JoinHandle<()>>,
}

impl ServerHandle {
    pub async fn start(opts: ServerOptions) -> Result<Self, ServerError> {
        let config = opts.config;
        config.validate()?;
        info!(version = env!("CARGO_PKG_VERSION"), "Starting heartbeat hub");

        let prometheus = if opts.install_metrics {
            Some(prometheus_handle()?)
        } else {
            None
        };

        // ── Storage ────────────────────────────────────────────
        let (repository, db): (Arc<dyn HeartbeatRepository>, Option<DatabaseConnection>) =
            match config.database.backend {
                StorageBackend::Sqlite => {
                    let db = init_database(&DatabaseConfig::new(&config.database.url)).await?;
                    (Arc::new(SeaOrmHeartbeatRepository::new(db.clone())), Some(db))
                }
                StorageBackend::Memory => {
                    warn!("Using in-memory storage, heartbeats are lost on restart");
                    (Arc::new(InMemoryHeartbeatRepository::new()), None)
                }
            };

        // ── Hub & pipeline ─────────────────────────────────────
        let hub = create_broadcast_hub(config.streaming.channel_capacity);
        let pipeline = IngestionPipeline::new(repository.clone(), hub.clone());
        info!(
            channel_capacity = hub.channel_capacity(),
            connection_timeout_secs = config.streaming.connection_timeout_secs,
            "Broadcast hub ready"
        );

        let shutdown = ShutdownCoordinator::new(config.server.shutdown_timeout);
        let signal = shutdown.signal();

        // ── MQTT ingestion ─────────────────────────────────────
        let mqtt_task = if config.mqtt.enabled {
            Some(spawn_mqtt_listener(
                config.mqtt.clone(),
                pipeline.clone(),
                signal.clone(),
            ))
        } else {
            info!("MQTT ingestion disabled");
            None
        };

        // ── REST API + SSE ─────────────────────────────────────
        let state = AppState::new(repository.clone(), hub.clone(), config.streaming.clone());
        let router = create_api_router(state, prometheus);

        let addr = config.api_address();
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr().map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;
        info!(%local_addr, "REST API listening");
        info!("Swagger UI available at http://{}/docs/", local_addr);

        let api_signal = signal.clone();
        let api_hub = hub.clone();
        let api_task = tokio::spawn(async move {
            let server = axum::serve(listener, router).with_graceful_shutdown(async move {
                api_signal.wait().await;
                // Open SSE responses never finish on their own
                api_hub.close_all();
                info!("REST API server received shutdown signal");
            });
            if let Err(e) = server.await {
                error!(error = %e, "REST API server error");
            }
        });

        Ok(Self {
            hub,
            repository,
            pipeline,
            config,
            local_addr,
            db,
            shutdown,
            api_task,
            mqtt_task,
        })
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.signal()
    }

    /// Install SIGTERM / SIGINT listeners that trigger shutdown.
    pub fn install_signal_handler(&self) {
        self.shutdown.start_signal_listener();
    }

    pub fn trigger_shutdown(&self) {
        self.shutdown.signal().trigger();
    }

    pub fn is_running(&self) -> bool {
        !self.api_task.is_finished()
    }

    /// Wait for shutdown to be triggered, then for every task to stop
    /// (bounded by `server.shutdown_timeout`).
    pub async fn wait(self) {
        let Self {
            hub,
            db,
            shutdown,
            api_task,
            mqtt_task,
            ..
        } = self;

        let completed = shutdown
            .shutdown_with_cleanup(|| async move {
                if let Some(task) = mqtt_task {
                    if let Err(e) = task.await {
                        error!(error = %e, "MQTT listener task panicked");
                    }
                }
                hub.close_all();
                if let Err(e) = api_task.await {
                    error!(error = %e, "REST API task panicked");
                }
                if let Some(db) = db {
                    match db.close().await {
                        Ok(()) => info!("Database connection closed"),
                        Err(e) => warn!(error = %e, "Error closing database connection"),
                    }
                }
            })
            .await;

        if completed {
            info!("Heartbeat hub stopped");
        } else {
            warn!("Heartbeat hub stopped before all tasks finished");
        }
    }

    /// Trigger shutdown and wait for completion.
    pub async fn shutdown(self) {
        self.trigger_shutdown();
        self.wait().await;
    }
}

/// The global recorder can only be installed once per process; later
/// starts in the same process reuse it.
fn prometheus_handle() -> Result<PrometheusHandle, ServerError> {
    static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

    if let Some(handle) = PROM_HANDLE.get() {
        return Ok(handle.clone());
    }
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ServerError::Metrics(e.to_string()))?;
    info!("Prometheus metrics recorder installed");
    Ok(PROM_HANDLE.get_or_init(|| handle).clone())
}

/// Initialize tracing from the logging config. `RUST_LOG` takes precedence
/// over `logging.level`. Call once at process startup.
pub fn init_tracing(config: &AppConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if config.logging.format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    if let Err(e) = result {
        eprintln!("tracing already initialized: {e}");
    }
}
