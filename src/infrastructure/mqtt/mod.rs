//! Message-bus adapter

mod listener;

pub use listener::{handle_event, mqtt_options, qos_level, reconnect_delay, spawn_mqtt_listener, NextStep};
