//! Live heartbeat fan-out
//!
//! `BroadcastHub` owns the subscriber set; `StreamingSession` ties one
//! subscriber to one client transport.

pub mod hub;
pub mod session;

pub use hub::{
    create_broadcast_hub, BroadcastHub, PublishReport, SharedBroadcastHub, Subscriber,
    SubscriberId, SubscriberState, DEFAULT_CHANNEL_CAPACITY,
};
pub use session::{ChannelSink, EventSink, SessionEnd, SinkError, StreamingSession};
