//! Out-of-band event ingestion.
//!
//! The push transport delivers entity-lifecycle events at any time,
//! including while requests are outstanding, and may deliver the same
//! event more than once. [`consume`] folds one event into the session
//! model: a total function over the closed variant set, idempotent on
//! every path, a no-op for events scoped outside the current view.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::connection::{insert_unique_by, remove_by};
use crate::protocol::ProtocolError;
use crate::scroll::THREAD_VIEWPORT;
use crate::session::{Command, SessionModel};
use crate::types::{Post, Room, RoomSummary, Space};

/// Entity-lifecycle events pushed by the server. Each carries the
/// affected entity's full current representation; arrival order is the
/// only ordering guarantee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InboundEvent {
    PostCreated { room_id: Uuid, post: Post },
    PostUpdated { room_id: Uuid, post: Post },
    PostDeleted { room_id: Uuid, post_id: Uuid },
    RoomUpdated { room: Room },
    SpaceUpdated { space: Space },
    BookmarkCreated { room: RoomSummary },
    BookmarkDeleted { room: RoomSummary },
}

impl InboundEvent {
    /// Encode to binary (bincode), for embedding in a protocol frame.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| ProtocolError::Serialization(e.to_string()))
    }

    /// Decode from binary.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let (event, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| ProtocolError::Deserialization(e.to_string()))?;
        Ok(event)
    }
}

/// Fold one pushed event into the model. Returns the commands the event
/// provoked (live appends scroll the thread to the bottom; nothing else
/// produces an effect).
pub fn consume(model: &mut SessionModel, event: &InboundEvent) -> Vec<Command> {
    match event {
        InboundEvent::PostCreated { room_id, post } => {
            if *room_id != model.room.id {
                return Vec::new();
            }
            if model.handle_post_created(post) {
                vec![Command::ScrollToBottom {
                    container: THREAD_VIEWPORT.to_string(),
                }]
            } else {
                Vec::new()
            }
        }

        InboundEvent::PostUpdated { room_id, post } => {
            if *room_id == model.room.id {
                model.posts.update_node(post.clone());
            }
            Vec::new()
        }

        InboundEvent::PostDeleted { room_id, post_id } => {
            if *room_id == model.room.id {
                model.posts.remove_node(*post_id);
            }
            Vec::new()
        }

        InboundEvent::RoomUpdated { room } => {
            if room.id == model.room.id {
                model.room = room.clone();
            }
            Vec::new()
        }

        InboundEvent::SpaceUpdated { space } => {
            if space.id == model.space.id {
                model.space = space.clone();
            }
            Vec::new()
        }

        InboundEvent::BookmarkCreated { room } => {
            insert_unique_by(|r: &RoomSummary| r.id, room.clone(), &mut model.bookmarks);
            Vec::new()
        }

        InboundEvent::BookmarkDeleted { room } => {
            remove_by(|r: &RoomSummary| r.id, room, &mut model.bookmarks);
            Vec::new()
        }
    }
}

// ===================================================================
// Tests
// ===================================================================
