pub mod broadcast;
pub mod ingestion;

// Re-export key types for convenience
pub use broadcast::{
    create_broadcast_hub, BroadcastHub, ChannelSink, EventSink, PublishReport, SessionEnd,
    SharedBroadcastHub, SinkError, StreamingSession, Subscriber, SubscriberId, SubscriberState,
};
pub use ingestion::{decode_heartbeat, DecodeError, IngestOutcome, IngestionPipeline};
