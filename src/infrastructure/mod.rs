//! Infrastructure layer - external concerns

pub mod database;
pub mod mqtt;
pub mod storage;

pub use database::{init_database, DatabaseConfig, SeaOrmHeartbeatRepository};
pub use mqtt::spawn_mqtt_listener;
pub use storage::InMemoryHeartbeatRepository;
