//! Non-persistent storage backends

mod memory;

pub use memory::InMemoryHeartbeatRepository;
