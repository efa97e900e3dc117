//! Per-topic fan-out with backpressure.
//!
//! Every topic gets one tokio broadcast channel; each subscribed
//! connection holds an independent receiver buffering up to `capacity`
//! frames. A lagging subscriber drops frames rather than stalling the
//! topic. The member map doubles as the authoritative presence roster
//! for the topic.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::presence::Participant;
use crate::protocol::{ChannelMessage, ProtocolError};

/// Snapshot of a hub's counters.
#[derive(Debug, Clone, Default)]
pub struct HubStats {
    pub frames_sent: u64,
    pub members: usize,
}

/// Counters are atomics so the send path never takes a lock.
struct AtomicHubStats {
    frames_sent: AtomicU64,
}

/// Fan-out group for a single topic.
pub struct TopicHub {
    sender: broadcast::Sender<Arc<Vec<u8>>>,
    members: Arc<RwLock<HashMap<Uuid, Participant>>>,
    capacity: usize,
    stats: Arc<AtomicHubStats>,
}

impl TopicHub {
    /// `capacity` bounds how many frames a subscriber may buffer before
    /// it starts lagging.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            members: Arc::new(RwLock::new(HashMap::new())),
            capacity,
            stats: Arc::new(AtomicHubStats {
                frames_sent: AtomicU64::new(0),
            }),
        }
    }

    /// Register a member and hand back its receiver. Re-adding an
    /// existing member replaces the stored participant.
    pub async fn add_member(&self, participant: Participant) -> broadcast::Receiver<Arc<Vec<u8>>> {
        let mut members = self.members.write().await;
        members.insert(participant.user_id, participant);
        self.sender.subscribe()
    }

    /// Deregister a member. No-op when the member was never added.
    pub async fn remove_member(&self, user_id: &Uuid) -> Option<Participant> {
        let mut members = self.members.write().await;
        members.remove(user_id)
    }

    /// Current roster, in insertion-independent order.
    pub async fn roster(&self) -> Vec<Participant> {
        self.members.read().await.values().cloned().collect()
    }

    pub async fn member_count(&self) -> usize {
        self.members.read().await.len()
    }

    pub async fn has_member(&self, user_id: &Uuid) -> bool {
        self.members.read().await.contains_key(user_id)
    }

    /// Encode and fan a frame out to all subscribers. Returns how many
    /// receivers took it. Lock-free on the hot path.
    pub fn broadcast(&self, msg: &ChannelMessage) -> Result<usize, ProtocolError> {
        let encoded = msg.encode()?;
        Ok(self.broadcast_raw(Arc::new(encoded)))
    }

    /// Fan pre-encoded bytes out directly (zero-copy fast path).
    pub fn broadcast_raw(&self, encoded: Arc<Vec<u8>>) -> usize {
        let count = self.sender.send(encoded).unwrap_or(0);
        self.stats.frames_sent.fetch_add(1, Ordering::Relaxed);
        count
    }

    /// Subscribe without registering a member (server-internal taps).
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Vec<u8>>> {
        self.sender.subscribe()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub async fn stats(&self) -> HubStats {
        HubStats {
            frames_sent: self.stats.frames_sent.load(Ordering::Relaxed),
            members: self.members.read().await.len(),
        }
    }
}

// ===================================================================
// Tests
// ===================================================================
