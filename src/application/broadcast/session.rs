//! Streaming session - bridges one subscriber to one client transport
//!
//! A session ends in exactly one of three ways: the client goes away
//! cleanly, the connection timeout elapses, or a write to the transport
//! fails. Whichever comes first unregisters the subscriber from the hub;
//! later attempts are ignored. Dropping an open session counts as a normal
//! completion.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::hub::{SharedBroadcastHub, Subscriber, SubscriberId, SubscriberState};
use crate::domain::HeartbeatEvent;

/// Terminal state of a streaming session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The client disconnected cleanly
    CompletedNormally,
    /// The configured connection timeout elapsed
    TimedOut,
    /// Writing to the transport failed
    TransportError,
}

impl SessionEnd {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CompletedNormally => "completed",
            Self::TimedOut => "timed_out",
            Self::TransportError => "transport_error",
        }
    }
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("transport disconnected")]
    Disconnected,

    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Client-side transport of a streaming session.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Write one event to the client.
    async fn push(&mut self, event: &HeartbeatEvent) -> Result<(), SinkError>;

    /// Resolves once the client has gone away cleanly.
    async fn closed(&self);
}

enum Step {
    Event(Option<HeartbeatEvent>),
    Disconnected,
    TimedOut,
}

/// One live dashboard connection
pub struct StreamingSession {
    subscriber: Subscriber,
    hub: SharedBroadcastHub,
    timeout: Option<Duration>,
    opened_at: Instant,
    outcome: Option<SessionEnd>,
}

impl StreamingSession {
    /// `timeout` of `None` keeps the session open until the client leaves.
    pub fn new(hub: SharedBroadcastHub, subscriber: Subscriber, timeout: Option<Duration>) -> Self {
        debug!(subscriber = %subscriber.id, ?timeout, "Streaming session opened");
        Self {
            subscriber,
            hub,
            timeout,
            opened_at: Instant::now(),
            outcome: None,
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.subscriber.id
    }

    pub fn outcome(&self) -> Option<SessionEnd> {
        self.outcome
    }

    pub fn is_open(&self) -> bool {
        self.outcome.is_none()
    }

    pub fn subscriber_state(&self) -> SubscriberState {
        self.subscriber.state()
    }

    /// Apply a terminal transition. Returns `false` if the session had
    /// already ended, in which case nothing happens.
    pub fn finish(&mut self, end: SessionEnd) -> bool {
        if self.outcome.is_some() {
            return false;
        }
        self.outcome = Some(end);

        // Closing first, so an in-flight publish skips us; then close the
        // channel so nothing more can be queued.
        self.subscriber.lifecycle.begin_close();
        self.subscriber.receiver.close();
        self.hub.unsubscribe(self.subscriber.id);
        self.subscriber.lifecycle.finish_close();

        metrics::counter!("heartbeat_stream_sessions_ended_total", "outcome" => end.as_str())
            .increment(1);
        info!(
            subscriber = %self.subscriber.id,
            outcome = end.as_str(),
            open_secs = self.opened_at.elapsed().as_secs(),
            "Streaming session ended"
        );
        true
    }

    /// Pump events into `sink` until one of the terminal transitions fires.
    pub async fn run<S>(mut self, sink: &mut S) -> SessionEnd
    where
        S: EventSink + ?Sized,
    {
        let deadline = self.timeout.map(|t| self.opened_at + t);

        let end = loop {
            let step = tokio::select! {
                biased;
                _ = sink.closed() => Step::Disconnected,
                _ = wait_for(deadline) => Step::TimedOut,
                event = self.subscriber.receiver.recv() => Step::Event(event),
            };

            match step {
                Step::Event(Some(event)) => {
                    // A client that stops reading must not outlive the deadline
                    let pushed = tokio::select! {
                        pushed = sink.push(&event) => pushed,
                        _ = wait_for(deadline) => break SessionEnd::TimedOut,
                    };
                    if let Err(e) = pushed {
                        warn!(subscriber = %self.subscriber.id, error = %e, "Failed to push heartbeat");
                        break SessionEnd::TransportError;
                    }
                }
                // The hub dropped our channel
                Step::Event(None) => break SessionEnd::CompletedNormally,
                Step::Disconnected => break SessionEnd::CompletedNormally,
                Step::TimedOut => break SessionEnd::TimedOut,
            }
        };

        self.finish(end);
        end
    }
}

impl Drop for StreamingSession {
    fn drop(&mut self) {
        if self.outcome.is_none() {
            self.finish(SessionEnd::CompletedNormally);
        }
    }
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// `EventSink` over an mpsc channel, used by transports that consume events
/// from a stream (the SSE endpoint) and by tests.
pub struct ChannelSink<T> {
    sender: mpsc::Sender<T>,
    encode: fn(&HeartbeatEvent) -> Result<T, SinkError>,
}

impl<T: Send> ChannelSink<T> {
    pub fn new(sender: mpsc::Sender<T>, encode: fn(&HeartbeatEvent) -> Result<T, SinkError>) -> Self {
        Self { sender, encode }
    }
}

#[async_trait]
impl<T: Send> EventSink for ChannelSink<T> {
    async fn push(&mut self, event: &HeartbeatEvent) -> Result<(), SinkError> {
        let item = (self.encode)(event)?;
        self.sender
            .send(item)
            .await
            .map_err(|_| SinkError::Disconnected)
    }

    async fn closed(&self) {
        self.sender.closed().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::broadcast::hub::create_broadcast_hub;
    use chrono::Utc;

    fn event(n: u32) -> HeartbeatEvent {
        HeartbeatEvent {
            cpu_usage: n as f32,
            gpu_usage: 5.0,
            memory_usage: 40.0,
            temperature: 55.0,
            inference_fps: 30.0,
            inference_success_rate: 0.98,
            timestamp: Utc::now(),
        }
    }

    fn passthrough(event: &HeartbeatEvent) -> Result<HeartbeatEvent, SinkError> {
        Ok(event.clone())
    }

    /// Accepts a fixed number of writes, then fails.
    struct FailingSink {
        remaining: usize,
    }

    #[async_trait]
    impl EventSink for FailingSink {
        async fn push(&mut self, _event: &HeartbeatEvent) -> Result<(), SinkError> {
            if self.remaining == 0 {
                return Err(SinkError::Disconnected);
            }
            self.remaining -= 1;
            Ok(())
        }

        async fn closed(&self) {
            std::future::pending::<()>().await
        }
    }

    #[test]
    fn finish_fires_exactly_once() {
        let hub = create_broadcast_hub(4);
        let mut session = hub.open_session(None);
        assert_eq!(hub.count(), 1);

        assert!(session.finish(SessionEnd::TimedOut));
        assert!(!session.finish(SessionEnd::TransportError));
        assert!(!session.finish(SessionEnd::CompletedNormally));

        assert_eq!(session.outcome(), Some(SessionEnd::TimedOut));
        assert_eq!(session.subscriber_state(), SubscriberState::Closed);
        assert_eq!(hub.count(), 0);
    }

    #[test]
    fn dropping_an_open_session_unsubscribes() {
        let hub = create_broadcast_hub(4);
        let session = hub.open_session(None);
        assert_eq!(hub.count(), 1);

        drop(session);
        assert_eq!(hub.count(), 0);
    }

    #[tokio::test]
    async fn run_forwards_events_until_client_disconnects() {
        let hub = create_broadcast_hub(8);
        let session = hub.open_session(None);
        let (tx, mut rx) = mpsc::channel(8);
        let mut sink = ChannelSink::new(tx, passthrough);

        let task = tokio::spawn(async move { session.run(&mut sink).await });

        hub.publish(&event(1));
        hub.publish(&event(2));
        assert_eq!(rx.recv().await.unwrap().cpu_usage, 1.0);
        assert_eq!(rx.recv().await.unwrap().cpu_usage, 2.0);

        drop(rx);
        let end = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("session did not end")
            .unwrap();

        assert_eq!(end, SessionEnd::CompletedNormally);
        assert_eq!(hub.count(), 0);
    }

    #[tokio::test]
    async fn run_ends_with_timeout() {
        let hub = create_broadcast_hub(8);
        let session = hub.open_session(Some(Duration::from_millis(50)));
        let (tx, _rx) = mpsc::channel(8);
        let mut sink = ChannelSink::new(tx, passthrough);

        let end = tokio::time::timeout(Duration::from_secs(2), session.run(&mut sink))
            .await
            .expect("timeout never fired");

        assert_eq!(end, SessionEnd::TimedOut);
        assert_eq!(hub.count(), 0);
    }

    #[tokio::test]
    async fn run_times_out_while_client_is_not_reading() {
        let hub = create_broadcast_hub(8);
        let session = hub.open_session(Some(Duration::from_millis(50)));
        let (tx, _stalled) = mpsc::channel(1);
        let mut sink = ChannelSink::new(tx, passthrough);

        let task = tokio::spawn(async move { session.run(&mut sink).await });
        for n in 0..3 {
            hub.publish(&event(n));
        }

        let end = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("session stuck on a full sink")
            .unwrap();

        assert_eq!(end, SessionEnd::TimedOut);
        assert_eq!(hub.count(), 0);
    }

    #[tokio::test]
    async fn run_ends_on_transport_error() {
        let hub = create_broadcast_hub(8);
        let session = hub.open_session(None);
        let mut sink = FailingSink { remaining: 1 };

        let task = tokio::spawn(async move { session.run(&mut sink).await });

        hub.publish(&event(1));
        tokio::task::yield_now().await;
        hub.publish(&event(2));

        let end = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("session did not end")
            .unwrap();

        assert_eq!(end, SessionEnd::TransportError);
        assert_eq!(hub.count(), 0);
        assert_eq!(hub.publish(&event(3)).delivered, 0);
    }
}
