//! Live heartbeat stream

pub mod handlers;

pub use handlers::*;
