//! Domain entities shared across the sync core.
//!
//! These are the typed shapes the query boundary returns and the push
//! transport carries. Identity is a v4 UUID everywhere; equality of
//! entities in ordered collections is always by ID, never by value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::connection::Ident;

/// A viewer or author identity with display metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub handle: String,
    pub name: String,
}

impl User {
    pub fn new(handle: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            handle: handle.into(),
            name: name.into(),
        }
    }
}

/// An organization that owns rooms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Space {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
}

/// A conversation channel inside a space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: Uuid,
    pub space_id: Uuid,
    pub name: String,
    pub purpose: Option<String>,
}

/// Compact room reference used in sidebar lists (bookmarks).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSummary {
    pub id: Uuid,
    pub name: String,
}

impl From<&Room> for RoomSummary {
    fn from(room: &Room) -> Self {
        Self {
            id: room.id,
            name: room.name.clone(),
        }
    }
}

/// One message in a room's conversation thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub room_id: Uuid,
    pub author: User,
    pub body: String,
    pub posted_at: DateTime<Utc>,
}

impl Post {
    pub fn new(room_id: Uuid, author: User, body: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            room_id,
            author,
            body: body.into(),
            posted_at: Utc::now(),
        }
    }
}

impl Ident for Post {
    fn ident(&self) -> Uuid {
        self.id
    }
}

impl Ident for RoomSummary {
    fn ident(&self) -> Uuid {
        self.id
    }
}

// ===================================================================
// Tests
// ===================================================================
