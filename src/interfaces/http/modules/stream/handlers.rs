//! Live heartbeat stream over Server-Sent Events
//!
//! Each request opens a streaming session on the broadcast hub and spawns a
//! task that pumps hub events into the SSE body. The session ends when the
//! client disconnects (the body stream is dropped), when the configured
//! connection timeout elapses, or when writing to the body fails.

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, KeepAliveStream, Sse};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use crate::application::broadcast::{ChannelSink, SharedBroadcastHub, SinkError};
use crate::config::StreamingConfig;
use crate::domain::HeartbeatEvent;

/// Events queued between the session task and the HTTP body
const SSE_BUFFER: usize = 8;

#[derive(Clone)]
pub struct StreamState {
    pub hub: SharedBroadcastHub,
    pub streaming: StreamingConfig,
}

pub type SseItem = Result<Event, Infallible>;

/// One SSE `message` event whose data is the event's JSON.
pub fn encode_sse(event: &HeartbeatEvent) -> Result<SseItem, SinkError> {
    let json = serde_json::to_string(event)?;
    Ok(Ok(Event::default().data(json)))
}

#[utoipa::path(
    get,
    path = "/heartbeats/stream",
    tag = "Heartbeats",
    responses(
        (status = 200, description = "One `message` event per heartbeat, data is the event JSON", body = String, content_type = "text/event-stream")
    )
)]
pub async fn stream_heartbeats(
    State(state): State<StreamState>,
) -> Sse<KeepAliveStream<ReceiverStream<SseItem>>> {
    let session = state
        .hub
        .open_session(state.streaming.connection_timeout());
    let id = session.id();

    let (tx, rx) = mpsc::channel(SSE_BUFFER);
    let mut sink = ChannelSink::new(tx, encode_sse);

    tokio::spawn(async move {
        let end = session.run(&mut sink).await;
        debug!(subscriber = %id, outcome = end.as_str(), "SSE session task finished");
    });

    Sse::new(ReceiverStream::new(rx))
        .keep_alive(KeepAlive::new().interval(state.streaming.keep_alive()))
}
