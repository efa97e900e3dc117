//! The query/mutation boundary the session controller talks through.
//!
//! Request construction and transport are opaque to the core; a backend
//! implements [`ChatApi`] and the runtime interprets the controller's
//! commands against it. Every operation threads the viewer's [`Session`]
//! and can fail with [`SessionError::Expired`] at any time.

use std::future::Future;

use chrono::{DateTime, FixedOffset};
use uuid::Uuid;

use crate::connection::{Connection, Edge, PageInfo};
use crate::session::{Session, SessionError};
use crate::types::{Post, Room, RoomSummary, Space, User};

/// Everything a room view needs, fetched as one unit. Initialization is
/// all-or-nothing: no partial model ever reaches the view layer.
#[derive(Debug, Clone, PartialEq)]
pub struct InitData {
    pub viewer: User,
    pub space: Space,
    pub room: Room,
    pub bookmarks: Vec<RoomSummary>,
    pub posts: Connection<Post>,
    /// Server wall-clock at fetch time, in the viewer's zone.
    pub now: DateTime<FixedOffset>,
}

/// One backward page of a room's thread.
#[derive(Debug, Clone, PartialEq)]
pub struct PostPage {
    pub edges: Vec<Edge<Post>>,
    pub page_info: PageInfo,
}

/// Backend contract for the room session.
///
/// Implementations must be cheap to share; the runtime issues calls
/// concurrently and completion order is unspecified.
pub trait ChatApi: Send + Sync {
    /// Combined bootstrap fetch for one room view.
    fn init_room(
        &self,
        session: &Session,
        space_slug: &str,
        room_id: Uuid,
    ) -> impl Future<Output = Result<InitData, SessionError>> + Send;

    /// Mark the thread as read up to `last_read_post_id`. Failures other
    /// than session expiry carry no user-visible effect.
    fn record_view(
        &self,
        session: &Session,
        space_id: Uuid,
        room_id: Uuid,
        last_read_post_id: Option<Uuid>,
    ) -> impl Future<Output = Result<(), SessionError>> + Send;

    /// Fetch the page of posts before `before`. `NotFound` signals the
    /// end of history, not a failure.
    fn fetch_older(
        &self,
        session: &Session,
        room_id: Uuid,
        before: Option<String>,
        limit: usize,
    ) -> impl Future<Output = Result<PostPage, SessionError>> + Send;

    /// Create a post in the room. Validation failures return the
    /// field-level errors unmodified.
    fn submit_post(
        &self,
        session: &Session,
        room_id: Uuid,
        body: &str,
    ) -> impl Future<Output = Result<Post, SessionError>> + Send;
}
