//! Database entities module

pub mod heartbeat;

pub use heartbeat::Entity as Heartbeat;
