pub mod health;
pub mod heartbeats;
pub mod metrics;
pub mod stream;
