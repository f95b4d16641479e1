//! MQTT subscription feeding the ingestion pipeline
//!
//! A single task polls the client event loop and hands each publish to the
//! pipeline before polling again, so heartbeats are processed one at a time
//! in arrival order.

use std::time::Duration;

use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::application::ingestion::IngestionPipeline;
use crate::config::MqttConfig;
use crate::shared::shutdown::ShutdownSignal;

pub fn mqtt_options(config: &MqttConfig) -> MqttOptions {
    let mut opts = MqttOptions::new(&config.client_id, &config.host, config.port);
    opts.set_keep_alive(Duration::from_secs(config.keep_alive_secs.max(5)));
    opts
}

/// Pause after a connection error, at least one second
pub fn reconnect_delay(config: &MqttConfig) -> Duration {
    Duration::from_secs(config.reconnect_delay_secs.max(1))
}

pub fn qos_level(qos: u8) -> QoS {
    match qos {
        0 => QoS::AtMostOnce,
        2 => QoS::ExactlyOnce,
        _ => QoS::AtLeastOnce,
    }
}

/// What the poll loop does after an event has been handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    Continue,
    /// (Re)connected; the topic subscription must be renewed
    Subscribe,
}

/// Handle one event from the client event loop. Publishes are fed to the
/// pipeline before this returns.
pub async fn handle_event(pipeline: &IngestionPipeline, event: Event) -> NextStep {
    match event {
        // Subscriptions do not survive a reconnect with a clean session
        Event::Incoming(Incoming::ConnAck(_)) => NextStep::Subscribe,
        Event::Incoming(Incoming::Publish(publish)) => {
            debug!(topic = %publish.topic, bytes = publish.payload.len(), "MQTT message received");
            pipeline.handle_payload(&publish.payload).await;
            NextStep::Continue
        }
        _ => NextStep::Continue,
    }
}

/// Spawn the listener. It runs until `shutdown` fires.
pub fn spawn_mqtt_listener(
    config: MqttConfig,
    pipeline: IngestionPipeline,
    shutdown: ShutdownSignal,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let (client, mut eventloop) =
            AsyncClient::new(mqtt_options(&config), config.channel_capacity.max(1));
        let qos = qos_level(config.qos);
        let reconnect_delay = reconnect_delay(&config);

        info!(
            host = %config.host,
            port = config.port,
            topic = %config.topic,
            "MQTT listener starting"
        );

        loop {
            let polled = tokio::select! {
                _ = shutdown.wait() => break,
                polled = eventloop.poll() => polled,
            };

            match polled {
                Ok(event) => {
                    if handle_event(&pipeline, event).await == NextStep::Subscribe {
                        info!(topic = %config.topic, "Connected to MQTT broker, subscribing");
                        if let Err(e) = client.subscribe(config.topic.as_str(), qos).await {
                            error!(error = %e, topic = %config.topic, "MQTT subscribe failed");
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, retry_in_secs = reconnect_delay.as_secs(), "MQTT connection error");
                    tokio::select! {
                        _ = shutdown.wait() => break,
                        _ = tokio::time::sleep(reconnect_delay) => {}
                    }
                }
            }
        }

        if let Err(e) = client.try_disconnect() {
            debug!(error = %e, "MQTT disconnect request not sent");
        }
        info!("MQTT listener stopped");
    })
}
