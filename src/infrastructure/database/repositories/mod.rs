//! Database repository implementations

pub mod heartbeat_repository;

pub use heartbeat_repository::SeaOrmHeartbeatRepository;
