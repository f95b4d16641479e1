//! Heartbeat ingestion pipeline
//!
//! decode → persist → broadcast, for one message at a time. A message that
//! fails to decode or persist is logged and discarded; nothing is ever
//! broadcast that was not stored first.

use std::sync::Arc;

use tracing::{debug, warn};

use super::decoder::{decode_heartbeat, DecodeError};
use crate::application::broadcast::{PublishReport, SharedBroadcastHub};
use crate::domain::{DomainError, HeartbeatRepository};

/// What happened to one inbound message
#[derive(Debug)]
pub enum IngestOutcome {
    /// Stored and handed to the hub
    Broadcast {
        heartbeat_id: i32,
        report: PublishReport,
    },
    /// Payload was not a valid heartbeat; nothing stored or sent
    DecodeFailed(DecodeError),
    /// Storage rejected the record; nothing sent
    PersistFailed(DomainError),
}

impl IngestOutcome {
    pub fn is_broadcast(&self) -> bool {
        matches!(self, Self::Broadcast { .. })
    }
}

#[derive(Clone)]
pub struct IngestionPipeline {
    repository: Arc<dyn HeartbeatRepository>,
    hub: SharedBroadcastHub,
}

impl IngestionPipeline {
    pub fn new(repository: Arc<dyn HeartbeatRepository>, hub: SharedBroadcastHub) -> Self {
        Self { repository, hub }
    }

    pub fn hub(&self) -> &SharedBroadcastHub {
        &self.hub
    }

    /// Handle one raw payload. Never fails; the outcome says how far the
    /// message got.
    pub async fn handle_payload(&self, payload: &[u8]) -> IngestOutcome {
        let event = match decode_heartbeat(payload) {
            Ok(event) => event,
            Err(e) => {
                metrics::counter!("heartbeat_decode_failures_total").increment(1);
                warn!(error = %e, bytes = payload.len(), "Discarding undecodable heartbeat");
                return IngestOutcome::DecodeFailed(e);
            }
        };

        let record = match self.repository.save(event.to_new_heartbeat()).await {
            Ok(record) => record,
            Err(e) => {
                metrics::counter!("heartbeat_persist_failures_total").increment(1);
                warn!(error = %e, "Failed to persist heartbeat, not broadcasting");
                return IngestOutcome::PersistFailed(e);
            }
        };

        metrics::counter!("heartbeat_ingested_total").increment(1);
        let report = self.hub.publish(&event);
        debug!(
            heartbeat_id = record.heartbeat_id,
            delivered = report.delivered,
            dropped = report.dropped,
            "Heartbeat ingested"
        );

        IngestOutcome::Broadcast {
            heartbeat_id: record.heartbeat_id,
            report,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::broadcast::{create_broadcast_hub, SessionEnd};
    use crate::domain::{DomainResult, HeartbeatRecord, NewHeartbeat};
    use crate::infrastructure::storage::InMemoryHeartbeatRepository;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::time::Duration;

    fn payload(cpu: f32) -> Vec<u8> {
        format!(
            r#"{{"cpuUsage":{cpu},"gpuUsage":5,"memoryUsage":40,"temperature":55,"inferenceFps":30,"inferenceSuccessRate":0.98}}"#
        )
        .into_bytes()
    }

    /// Repository that rejects every write
    struct BrokenRepository;

    #[async_trait]
    impl HeartbeatRepository for BrokenRepository {
        async fn save(&self, _heartbeat: NewHeartbeat) -> DomainResult<HeartbeatRecord> {
            Err(DomainError::Storage("disk full".into()))
        }
        async fn find_all(&self) -> DomainResult<Vec<HeartbeatRecord>> {
            Ok(vec![])
        }
        async fn find_by_id(&self, _id: i32) -> DomainResult<Option<HeartbeatRecord>> {
            Ok(None)
        }
        async fn delete_by_id(&self, id: i32) -> DomainResult<()> {
            Err(DomainError::heartbeat_not_found(id))
        }
        async fn count(&self) -> DomainResult<u64> {
            Ok(0)
        }
        async fn find_between(
            &self,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> DomainResult<Vec<HeartbeatRecord>> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn valid_payload_is_stored_then_broadcast() {
        let repo = Arc::new(InMemoryHeartbeatRepository::new());
        let hub = create_broadcast_hub(4);
        let pipeline = IngestionPipeline::new(repo.clone(), hub.clone());
        let mut sub = hub.subscribe();

        let outcome = pipeline.handle_payload(&payload(12.5)).await;

        match outcome {
            IngestOutcome::Broadcast { heartbeat_id, report } => {
                assert_eq!(report.delivered, 1);
                let stored = repo.find_by_id(heartbeat_id).await.unwrap().unwrap();
                assert_eq!(stored.cpu_usage, 12.5);
                assert!(stored.last_inference_time.is_none());
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        let event = sub.receiver.try_recv().unwrap();
        assert_eq!(event.cpu_usage, 12.5);
    }

    #[tokio::test]
    async fn device_payload_with_percentage_rate_is_ingested() {
        let repo = Arc::new(InMemoryHeartbeatRepository::new());
        let hub = create_broadcast_hub(4);
        let pipeline = IngestionPipeline::new(repo.clone(), hub.clone());
        let mut sub = hub.subscribe();

        let device = br#"{"cpuUsage":41.3,"gpuUsage":77.0,"memoryUsage":63.9,"temperature":48.5,"inferenceFps":27.4,"inferenceSuccessRate":87.5}"#;
        assert!(pipeline.handle_payload(device).await.is_broadcast());

        assert_eq!(repo.count().await.unwrap(), 1);
        assert_eq!(sub.receiver.try_recv().unwrap().inference_success_rate, 87.5);
    }

    #[tokio::test]
    async fn nothing_is_broadcast_when_persist_fails() {
        let hub = create_broadcast_hub(4);
        let pipeline = IngestionPipeline::new(Arc::new(BrokenRepository), hub.clone());
        let mut sub = hub.subscribe();

        let outcome = pipeline.handle_payload(&payload(1.0)).await;

        assert!(matches!(outcome, IngestOutcome::PersistFailed(DomainError::Storage(_))));
        assert!(sub.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn malformed_payload_is_discarded_and_pipeline_continues() {
        let repo = Arc::new(InMemoryHeartbeatRepository::new());
        let hub = create_broadcast_hub(4);
        let pipeline = IngestionPipeline::new(repo.clone(), hub.clone());
        let mut sub = hub.subscribe();

        let outcome = pipeline.handle_payload(b"{\"cpuUsage\":").await;
        assert!(matches!(outcome, IngestOutcome::DecodeFailed(_)));
        assert_eq!(repo.count().await.unwrap(), 0);
        assert!(sub.receiver.try_recv().is_err());

        assert!(pipeline.handle_payload(&payload(2.0)).await.is_broadcast());
        assert_eq!(repo.count().await.unwrap(), 1);
        assert_eq!(sub.receiver.try_recv().unwrap().cpu_usage, 2.0);
    }

    #[tokio::test]
    async fn two_sessions_receive_the_same_stream_in_order() {
        let repo = Arc::new(InMemoryHeartbeatRepository::new());
        let hub = create_broadcast_hub(128);
        let pipeline = IngestionPipeline::new(repo.clone(), hub.clone());
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();

        for n in 0..100 {
            assert!(pipeline.handle_payload(&payload(n as f32)).await.is_broadcast());
        }

        for n in 0..100 {
            assert_eq!(a.receiver.try_recv().unwrap().cpu_usage, n as f32);
            assert_eq!(b.receiver.try_recv().unwrap().cpu_usage, n as f32);
        }
        assert_eq!(repo.count().await.unwrap(), 100);
    }

    fn passthrough(
        event: &crate::domain::HeartbeatEvent,
    ) -> Result<crate::domain::HeartbeatEvent, crate::application::broadcast::SinkError> {
        Ok(event.clone())
    }

    #[tokio::test]
    async fn disconnected_client_receives_nothing_further() {
        use crate::application::broadcast::ChannelSink;
        use tokio::sync::mpsc;

        let repo = Arc::new(InMemoryHeartbeatRepository::new());
        let hub = create_broadcast_hub(8);
        let pipeline = IngestionPipeline::new(repo, hub.clone());

        let session = hub.open_session(None);
        let (tx, mut client) = mpsc::channel(8);
        let mut sink = ChannelSink::new(tx, passthrough);
        let task = tokio::spawn(async move { session.run(&mut sink).await });

        let first = br#"{"cpuUsage":10,"gpuUsage":5,"memoryUsage":40,"temperature":55,"inferenceFps":30,"inferenceSuccessRate":0.98}"#;
        assert!(pipeline.handle_payload(first).await.is_broadcast());

        let got = tokio::time::timeout(Duration::from_secs(1), client.recv())
            .await
            .expect("event not delivered")
            .unwrap();
        assert_eq!(got.cpu_usage, 10.0);
        assert_eq!(got.gpu_usage, 5.0);
        assert_eq!(got.memory_usage, 40.0);
        assert_eq!(got.temperature, 55.0);
        assert_eq!(got.inference_fps, 30.0);
        assert!((got.inference_success_rate - 0.98).abs() < f32::EPSILON);

        drop(client);
        let end = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("session did not end")
            .unwrap();
        assert_eq!(end, SessionEnd::CompletedNormally);

        match pipeline.handle_payload(&payload(11.0)).await {
            IngestOutcome::Broadcast { report, .. } => assert_eq!(report.delivered, 0),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(hub.count(), 0);
    }

    #[tokio::test]
    async fn survivor_receives_every_event_while_peer_times_out_mid_storm() {
        use crate::application::broadcast::ChannelSink;
        use tokio::sync::mpsc;

        let repo = Arc::new(InMemoryHeartbeatRepository::new());
        let hub = create_broadcast_hub(128);
        let pipeline = IngestionPipeline::new(repo.clone(), hub.clone());

        let x = hub.open_session(Some(Duration::from_millis(50)));
        let (tx, mut x_client) = mpsc::channel(128);
        let mut x_sink = ChannelSink::new(tx, passthrough);
        let x_task = tokio::spawn(async move { x.run(&mut x_sink).await });
        let mut y = hub.subscribe();

        assert!(pipeline.handle_payload(&payload(1.0)).await.is_broadcast());
        assert_eq!(y.receiver.recv().await.unwrap().cpu_usage, 1.0);
        assert_eq!(x_client.recv().await.unwrap().cpu_usage, 1.0);

        for n in 0..100 {
            assert!(pipeline.handle_payload(&payload(n as f32)).await.is_broadcast());
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        for n in 0..100 {
            assert_eq!(y.receiver.try_recv().unwrap().cpu_usage, n as f32);
        }
        assert!(y.receiver.try_recv().is_err());

        let end = tokio::time::timeout(Duration::from_secs(1), x_task)
            .await
            .expect("timed-out session still running")
            .unwrap();
        assert_eq!(end, SessionEnd::TimedOut);
        assert_eq!(hub.count(), 1);
        assert_eq!(repo.count().await.unwrap(), 101);
    }
}
