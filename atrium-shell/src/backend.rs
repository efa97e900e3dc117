//! Local in-memory backend for the shell.
//!
//! Implements the [`ChatApi`] boundary over a seeded post history and
//! publishes created posts to the gateway, so the shell exercises the
//! same two delivery paths a production backend would: the mutation
//! response and the push echo.

use std::future::Future;
use std::sync::{Arc, Mutex};

use atrium_sync::api::{ChatApi, InitData, PostPage};
use atrium_sync::connection::{Connection, Edge, PageInfo};
use atrium_sync::events::InboundEvent;
use atrium_sync::presence::room_topic;
use atrium_sync::server::GatewayHandle;
use atrium_sync::session::{Session, SessionError, ValidationError};
use atrium_sync::types::{Post, Room, RoomSummary, Space, User};
use chrono::Utc;
use uuid::Uuid;

const PAGE_SIZE: usize = 20;

/// In-memory backend with one space, one room, one viewer.
pub struct LocalBackend {
    viewer: User,
    space: Space,
    room: Room,
    /// Full history, oldest first.
    history: Arc<Mutex<Vec<Post>>>,
    gateway: GatewayHandle,
}

impl LocalBackend {
    /// Seed a demo space with a little scrollback.
    pub fn seed(gateway: GatewayHandle) -> Self {
        let viewer = User::new("you", "You");
        let teammate = User::new("sam", "Sam");
        let space = Space {
            id: Uuid::new_v4(),
            slug: "atrium".into(),
            name: "Atrium HQ".into(),
        };
        let room = Room {
            id: Uuid::new_v4(),
            space_id: space.id,
            name: "general".into(),
            purpose: Some("Everything else".into()),
        };

        let history: Vec<Post> = (0..40)
            .map(|i| {
                let author = if i % 3 == 0 {
                    viewer.clone()
                } else {
                    teammate.clone()
                };
                Post::new(room.id, author, format!("scrollback message {i}"))
            })
            .collect();

        Self {
            viewer,
            space,
            room,
            history: Arc::new(Mutex::new(history)),
            gateway,
        }
    }

    pub fn room_id(&self) -> Uuid {
        self.room.id
    }

    pub fn space_slug(&self) -> &str {
        &self.space.slug
    }

    fn window(&self, before: Option<usize>, limit: usize) -> (Vec<Edge<Post>>, PageInfo) {
        let history = self.history.lock().unwrap();
        let end = before.unwrap_or(history.len()).min(history.len());
        let start = end.saturating_sub(limit);
        let edges = history[start..end]
            .iter()
            .cloned()
            .enumerate()
            .map(|(offset, post)| Edge::new(post, Some((start + offset).to_string())))
            .collect();
        let page_info = PageInfo {
            has_next_page: start > 0,
            end_cursor: Some(start.to_string()),
        };
        (edges, page_info)
    }
}

impl ChatApi for LocalBackend {
    fn init_room(
        &self,
        _session: &Session,
        _space_slug: &str,
        room_id: Uuid,
    ) -> impl Future<Output = Result<InitData, SessionError>> + Send {
        async move {
            if room_id != self.room.id {
                return Err(SessionError::NotFound);
            }
            let (edges, page_info) = self.window(None, PAGE_SIZE);
            Ok(InitData {
                viewer: self.viewer.clone(),
                space: self.space.clone(),
                room: self.room.clone(),
                bookmarks: vec![RoomSummary::from(&self.room)],
                posts: Connection::new(edges, page_info),
                now: Utc::now().fixed_offset(),
            })
        }
    }

    fn record_view(
        &self,
        _session: &Session,
        _space_id: Uuid,
        room_id: Uuid,
        last_read_post_id: Option<Uuid>,
    ) -> impl Future<Output = Result<(), SessionError>> + Send {
        async move {
            log::debug!("recorded view of {room_id} up to {last_read_post_id:?}");
            Ok(())
        }
    }

    fn fetch_older(
        &self,
        _session: &Session,
        room_id: Uuid,
        before: Option<String>,
        limit: usize,
    ) -> impl Future<Output = Result<PostPage, SessionError>> + Send {
        async move {
            if room_id != self.room.id {
                return Err(SessionError::NotFound);
            }
            let boundary = before
                .as_deref()
                .and_then(|c| c.parse::<usize>().ok())
                .unwrap_or(0);
            if boundary == 0 {
                return Err(SessionError::NotFound);
            }
            let (edges, page_info) = self.window(Some(boundary), limit);
            Ok(PostPage { edges, page_info })
        }
    }

    fn submit_post(
        &self,
        _session: &Session,
        room_id: Uuid,
        body: &str,
    ) -> impl Future<Output = Result<Post, SessionError>> + Send {
        async move {
            if body.trim().is_empty() {
                return Err(SessionError::Validation(vec![ValidationError {
                    field: "body".into(),
                    message: "can't be blank".into(),
                }]));
            }
            let post = Post::new(room_id, self.viewer.clone(), body);
            self.history.lock().unwrap().push(post.clone());

            // Echo through the push path, like a production backend.
            let event = InboundEvent::PostCreated {
                room_id,
                post: post.clone(),
            };
            if let Err(e) = self.gateway.publish(&room_topic(room_id), &event).await {
                log::debug!("push echo failed: {e}");
            }
            Ok(post)
        }
    }
}
