//! Presence: who is currently viewing a conversation.
//!
//! Presence is scoped by topic, a string key derived from the room
//! identity (`rooms:<uuid>`). The gateway owns the authoritative roster
//! per topic and pushes full-state snapshots; the client side holds a
//! [`PresenceTracker`] per mounted view and applies a snapshot only when
//! its topic matches the tracked one.
//!
//! ```text
//! join topic ──► gateway roster ──► PresenceSnapshot(topic, list)
//!                                         │
//!                topic == tracked? ───────┤
//!                     yes: Loaded(list)   │   no: ignored
//! ```
//!
//! The state is an explicit two-state type. A view starts `NotLoaded`
//! and moves to `Loaded` on its first matching snapshot; later snapshots
//! replace the list. There is no transition back to `NotLoaded` while
//! the view is mounted, so a sidebar can distinguish "still loading"
//! from "nobody here".

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One present participant, with display metadata for the sidebar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: Uuid,
    pub name: String,
}

impl Participant {
    pub fn new(user_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            user_id,
            name: name.into(),
        }
    }
}

/// Topic name for a room's presence roster.
pub fn room_topic(room_id: Uuid) -> String {
    format!("rooms:{room_id}")
}

/// Roster state for one mounted view.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PresenceState {
    #[default]
    NotLoaded,
    Loaded(Vec<Participant>),
}

impl PresenceState {
    pub fn is_loaded(&self) -> bool {
        matches!(self, PresenceState::Loaded(_))
    }

    /// The roster, or `None` before the first snapshot.
    pub fn participants(&self) -> Option<&[Participant]> {
        match self {
            PresenceState::NotLoaded => None,
            PresenceState::Loaded(list) => Some(list),
        }
    }
}

/// Tracks the roster for exactly one topic.
#[derive(Debug, Clone, PartialEq)]
pub struct PresenceTracker {
    topic: String,
    state: PresenceState,
}

impl PresenceTracker {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            state: PresenceState::NotLoaded,
        }
    }

    pub fn for_room(room_id: Uuid) -> Self {
        Self::new(room_topic(room_id))
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn state(&self) -> &PresenceState {
        &self.state
    }

    /// Apply a full-state snapshot. Snapshots for any other topic are
    /// ignored, which guards against a stale snapshot from a previously
    /// viewed room landing after navigation. Returns whether the
    /// snapshot was applied.
    pub fn receive_snapshot(&mut self, topic: &str, mut participants: Vec<Participant>) -> bool {
        if topic != self.topic {
            log::trace!(
                "ignoring presence snapshot for {topic} while tracking {}",
                self.topic
            );
            return false;
        }
        // Stable sidebar ordering regardless of join order.
        participants.sort_by(|a, b| a.name.cmp(&b.name).then(a.user_id.cmp(&b.user_id)));
        self.state = PresenceState::Loaded(participants);
        true
    }
}

// ===================================================================
// Tests
// ===================================================================
