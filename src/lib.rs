//! # Heartbeat Hub
//!
//! Device heartbeats arrive over MQTT, are stored, and are fanned out live
//! to every connected dashboard over Server-Sent Events.
//!
//! ## Architecture
//!
//! - **domain**: heartbeat types and the repository contract
//! - **application**: broadcast hub, streaming sessions, ingestion pipeline
//! - **infrastructure**: SeaORM and in-memory storage, MQTT listener
//! - **interfaces**: REST API, SSE stream and Swagger documentation
//! - **server**: runtime wiring and graceful shutdown

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod server;
pub mod shared;

pub use config::{default_config_path, AppConfig};

pub use application::{
    create_broadcast_hub, BroadcastHub, IngestionPipeline, SharedBroadcastHub, StreamingSession,
};
pub use infrastructure::{init_database, DatabaseConfig};
pub use interfaces::http::create_api_router;
