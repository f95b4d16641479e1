//! Broadcast hub for fanning heartbeat events out to live subscribers
//!
//! Every subscriber owns a small bounded channel. `publish` takes a
//! snapshot of the subscriber set under a read lock, releases the lock and
//! then attempts a non-blocking `try_send` on each member. A full channel
//! drops the newest event for that subscriber only; a closed channel flags
//! the subscriber for removal. The producer never waits on a consumer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info};
use uuid::Uuid;

use super::session::StreamingSession;
use crate::domain::HeartbeatEvent;

/// Default per-subscriber buffer
pub const DEFAULT_CHANNEL_CAPACITY: usize = 16;

pub type SubscriberId = Uuid;

/// Lifecycle of a subscriber registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    Active,
    Closing,
    Closed,
}

const ACTIVE: u8 = 0;
const CLOSING: u8 = 1;
const CLOSED: u8 = 2;

/// State flag shared between the hub entry and whoever owns the receiver.
#[derive(Debug)]
pub struct Lifecycle(AtomicU8);

impl Lifecycle {
    fn new() -> Self {
        Self(AtomicU8::new(ACTIVE))
    }

    pub fn state(&self) -> SubscriberState {
        match self.0.load(Ordering::Acquire) {
            ACTIVE => SubscriberState::Active,
            CLOSING => SubscriberState::Closing,
            _ => SubscriberState::Closed,
        }
    }

    /// Active → Closing. Only the first caller wins; every later call
    /// returns `false`.
    pub fn begin_close(&self) -> bool {
        self.0
            .compare_exchange(ACTIVE, CLOSING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn finish_close(&self) {
        self.0.store(CLOSED, Ordering::Release);
    }
}

struct Member {
    sender: mpsc::Sender<HeartbeatEvent>,
    lifecycle: Arc<Lifecycle>,
}

/// A registration handed back by [`BroadcastHub::subscribe`].
///
/// Dropping it without unsubscribing is harmless: the closed channel is
/// detected and removed on the next publish.
pub struct Subscriber {
    pub id: SubscriberId,
    pub receiver: mpsc::Receiver<HeartbeatEvent>,
    pub lifecycle: Arc<Lifecycle>,
}

impl Subscriber {
    pub fn state(&self) -> SubscriberState {
        self.lifecycle.state()
    }
}

/// Outcome of one `publish` call
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishReport {
    /// Subscribers that accepted the event
    pub delivered: usize,
    /// Subscribers whose buffer was full; they miss this event
    pub dropped: usize,
    /// Subscribers found closed and removed from the set
    pub removed: usize,
}

/// Fan-out hub: one producer, any number of independent consumers
pub struct BroadcastHub {
    members: RwLock<HashMap<SubscriberId, Member>>,
    channel_capacity: usize,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a hub whose subscribers buffer at most `capacity` events.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            members: RwLock::new(HashMap::new()),
            channel_capacity: capacity.max(1),
        }
    }

    pub fn channel_capacity(&self) -> usize {
        self.channel_capacity
    }

    /// Register a new Active subscriber.
    pub fn subscribe(&self) -> Subscriber {
        let (sender, receiver) = mpsc::channel(self.channel_capacity);
        let lifecycle = Arc::new(Lifecycle::new());
        let id = Uuid::new_v4();

        let total = {
            let mut members = self.members.write();
            members.insert(
                id,
                Member {
                    sender,
                    lifecycle: lifecycle.clone(),
                },
            );
            members.len()
        };

        metrics::gauge!("heartbeat_stream_subscribers").set(total as f64);
        info!(subscriber = %id, total, "New heartbeat subscriber");

        Subscriber {
            id,
            receiver,
            lifecycle,
        }
    }

    /// Subscribe and wrap the registration in a session that unregisters
    /// itself on every termination path.
    pub fn open_session(self: &Arc<Self>, timeout: Option<Duration>) -> StreamingSession {
        let subscriber = self.subscribe();
        StreamingSession::new(self.clone(), subscriber, timeout)
    }

    /// Remove a subscriber. Unknown or already removed ids are a no-op.
    /// Returns `true` only for the call that actually removed it.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let (removed, remaining) = {
            let mut members = self.members.write();
            let removed = members.remove(&id);
            (removed, members.len())
        };

        match removed {
            Some(member) => {
                if member.lifecycle.begin_close() {
                    member.lifecycle.finish_close();
                }
                metrics::gauge!("heartbeat_stream_subscribers").set(remaining as f64);
                info!(subscriber = %id, remaining, "Heartbeat subscriber removed");
                true
            }
            None => {
                debug!(subscriber = %id, "Unsubscribe for unknown subscriber ignored");
                false
            }
        }
    }

    /// Deliver `event` to every subscriber that is Active right now.
    pub fn publish(&self, event: &HeartbeatEvent) -> PublishReport {
        let snapshot: Vec<(SubscriberId, mpsc::Sender<HeartbeatEvent>, Arc<Lifecycle>)> = {
            let members = self.members.read();
            members
                .iter()
                .map(|(id, m)| (*id, m.sender.clone(), m.lifecycle.clone()))
                .collect()
        };

        let mut report = PublishReport::default();
        let mut closed = Vec::new();

        for (id, sender, lifecycle) in &snapshot {
            if lifecycle.state() != SubscriberState::Active {
                continue;
            }
            match sender.try_send(event.clone()) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    report.dropped += 1;
                    debug!(subscriber = %id, "Subscriber buffer full, event dropped");
                }
                Err(TrySendError::Closed(_)) => closed.push(*id),
            }
        }

        if report.dropped > 0 {
            metrics::counter!("heartbeat_broadcast_dropped_total").increment(report.dropped as u64);
        }

        if !closed.is_empty() {
            let remaining = {
                let mut members = self.members.write();
                for id in &closed {
                    if let Some(member) = members.remove(id) {
                        if member.lifecycle.begin_close() {
                            member.lifecycle.finish_close();
                        }
                        report.removed += 1;
                    }
                }
                members.len()
            };
            metrics::gauge!("heartbeat_stream_subscribers").set(remaining as f64);
            info!(removed = report.removed, remaining, "Dropped closed heartbeat subscribers");
        }

        debug!(
            subscribers = snapshot.len(),
            delivered = report.delivered,
            dropped = report.dropped,
            "Heartbeat published"
        );

        report
    }

    /// Current number of registered subscribers.
    pub fn count(&self) -> usize {
        self.members.read().len()
    }

    /// Unregister everyone. Receivers see the end of their channel once
    /// they have drained what was already queued.
    pub fn close_all(&self) -> usize {
        let drained: Vec<Member> = {
            let mut members = self.members.write();
            members.drain().map(|(_, m)| m).collect()
        };

        for member in &drained {
            if member.lifecycle.begin_close() {
                member.lifecycle.finish_close();
            }
        }

        metrics::gauge!("heartbeat_stream_subscribers").set(0.0);
        if !drained.is_empty() {
            info!(closed = drained.len(), "Closed all heartbeat subscribers");
        }
        drained.len()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared broadcast hub type
pub type SharedBroadcastHub = Arc<BroadcastHub>;

/// Create a shared broadcast hub
pub fn create_broadcast_hub(capacity: usize) -> SharedBroadcastHub {
    Arc::new(BroadcastHub::with_capacity(capacity))
}
