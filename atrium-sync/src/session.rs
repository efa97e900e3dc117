//! The room session controller.
//!
//! One [`SessionModel`] owns the composed state for one mounted
//! conversation view: the loaded thread window, composer, sidebar
//! lists, wall-clock and presence roster. All mutation flows through
//! [`update`], a pure reducer over [`Msg`]; effects are returned as
//! [`Command`] values for the surrounding runtime to interpret.
//!
//! ```text
//!            ┌────────────► ChatApi / push client / scroll bridge
//!            │ Command
//!  update(model, msg) ◄──── Msg (responses, push events, timers, input)
//! ```
//!
//! Concurrency model: the runtime delivers messages one at a time, so
//! handlers never race each other. Outstanding requests of the same
//! kind are prevented by the in-flight flags (`is_submitting`,
//! `is_fetching_older`) rather than cancellation; a late response is
//! absorbed by the normal merge paths. No handler may assume anything
//! about the completion order of concurrently issued requests.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::{ChatApi, InitData, PostPage};
use crate::connection::{Connection, Ident};
use crate::events::{self, InboundEvent};
use crate::presence::{Participant, PresenceTracker};
use crate::scroll::{ScrollPosition, Viewport, THREAD_VIEWPORT};
use crate::types::{Post, Room, RoomSummary, Space, User};

/// Page size for backward fetches.
pub const OLDER_PAGE_SIZE: usize = 20;

/// The viewer's authenticated context, threaded through every
/// asynchronous operation and invalidated on expiry.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: String,
}

impl Session {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

/// A field-level rejection attached to a failed submission. Rendered
/// next to the relevant input by the view layer; passed through here
/// unmodified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

/// Failure taxonomy for session operations.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// Authentication lapsed. Always routes to a login redirect,
    /// overriding any other handling for the response that carried it.
    Expired,
    /// Network or server failure. Absorbed locally: the affected
    /// in-flight flag is cleared and user-entered state is preserved.
    RequestFailed(String),
    /// The requested page or entity does not exist. For pagination this
    /// is the terminal no-more-data signal, not an error.
    NotFound,
    /// Structured field-level rejections for a submission.
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Expired => write!(f, "session expired"),
            Self::RequestFailed(e) => write!(f, "request failed: {e}"),
            Self::NotFound => write!(f, "not found"),
            Self::Validation(errors) => write!(f, "validation failed ({} errors)", errors.len()),
        }
    }
}

impl std::error::Error for SessionError {}

/// Per-view composed state. Exclusively owns its connection and
/// presence tracker; nothing outside the reducer mutates them.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionModel {
    pub viewer: User,
    pub space: Space,
    pub room: Room,
    pub bookmarks: Vec<RoomSummary>,
    pub posts: Connection<Post>,
    pub composer_body: String,
    pub is_submitting: bool,
    pub is_fetching_older: bool,
    pub now: DateTime<FixedOffset>,
    pub viewport: Viewport,
    pub presence: PresenceTracker,
    /// Field errors from the last rejected submission, for the view.
    pub submit_errors: Vec<ValidationError>,
}

impl SessionModel {
    pub fn from_init(data: InitData) -> Self {
        let presence = PresenceTracker::for_room(data.room.id);
        Self {
            viewer: data.viewer,
            space: data.space,
            room: data.room,
            bookmarks: data.bookmarks,
            posts: data.posts,
            composer_body: String::new(),
            is_submitting: false,
            is_fetching_older: false,
            now: data.now,
            viewport: Viewport::new(),
            presence,
            submit_errors: Vec::new(),
        }
    }

    /// The send control is disabled iff the composer is empty or a
    /// submission is already in flight.
    pub fn is_send_disabled(&self) -> bool {
        self.composer_body.is_empty() || self.is_submitting
    }

    /// Fold a created post into the thread. Idempotent: a post already
    /// present (the submit response and the push echo both deliver it)
    /// is left alone. Posts for other rooms are ignored. Returns
    /// whether the thread grew.
    pub fn handle_post_created(&mut self, post: &Post) -> bool {
        if post.room_id != self.room.id {
            return false;
        }
        self.posts.add_node(post.clone())
    }

    /// ID of the most recent loaded post, if the window is non-empty.
    pub fn last_read_post_id(&self) -> Option<Uuid> {
        self.posts.last(1).first().map(|edge| edge.node.ident())
    }
}

/// Messages delivered to the reducer.
#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// Composer text changed.
    ComposerChanged(String),
    /// The viewer asked to send the composer contents.
    SubmitRequested,
    /// Response to an earlier submission.
    SubmitResponded(Result<Post, SessionError>),
    /// Periodic wall-clock refresh (about once per second).
    Ticked(DateTime<FixedOffset>),
    /// Fast poll asking the bridge for the current scroll position.
    ScrollPolled,
    /// The bridge reported a measured position.
    ScrollPositionReceived(ScrollPosition),
    /// Response to an earlier backward-page fetch.
    OlderFetched(Result<PostPage, SessionError>),
    /// Response to the record-view side effect.
    ViewRecorded(Result<(), SessionError>),
    /// Out-of-band entity event from the push transport.
    PushEventReceived(InboundEvent),
    /// Full-state presence snapshot from the push transport.
    PresenceSnapshotReceived {
        topic: String,
        participants: Vec<Participant>,
    },
}

/// Effects requested by the reducer, interpreted by the runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    FetchOlder {
        room_id: Uuid,
        before: Option<String>,
        limit: usize,
    },
    SubmitPost {
        room_id: Uuid,
        body: String,
    },
    RecordView {
        space_id: Uuid,
        room_id: Uuid,
        last_read_post_id: Option<Uuid>,
    },
    JoinPresence {
        topic: String,
    },
    LeavePresence {
        topic: String,
    },
    QueryScrollPosition {
        container: String,
    },
    ScrollToAnchor {
        container: String,
        anchor_id: Uuid,
        offset: f32,
    },
    ScrollToBottom {
        container: String,
    },
    RedirectToLogin,
}

/// Combined bootstrap fetch. Fails as a unit: any missing piece fails
/// the whole initialization and no partial model is produced.
pub async fn init<A: ChatApi>(
    api: &A,
    session: &Session,
    space_slug: &str,
    room_id: Uuid,
) -> Result<SessionModel, SessionError> {
    let data = api.init_room(session, space_slug, room_id).await?;
    Ok(SessionModel::from_init(data))
}

/// Effects to run once the view is mounted: record the latest loaded
/// post as read (omitted when the window is empty), join the presence
/// topic, and put the viewport at the bottom of the thread.
pub fn setup_commands(model: &SessionModel) -> Vec<Command> {
    vec![
        Command::RecordView {
            space_id: model.space.id,
            room_id: model.room.id,
            last_read_post_id: model.last_read_post_id(),
        },
        Command::JoinPresence {
            topic: model.presence.topic().to_string(),
        },
        Command::ScrollToBottom {
            container: THREAD_VIEWPORT.to_string(),
        },
    ]
}

/// Effects to run on unmount. Safe to invoke while setup's async
/// effects are still in flight: the leave is ordered after the join by
/// the transport's write channel, so the topic is never left joined.
pub fn teardown_commands(model: &SessionModel) -> Vec<Command> {
    vec![Command::LeavePresence {
        topic: model.presence.topic().to_string(),
    }]
}

/// The reducer. Every branch leaves the model in a valid state; session
/// expiry from any response short-circuits to a redirect without
/// touching the model's data fields.
pub fn update(model: &mut SessionModel, msg: Msg) -> Vec<Command> {
    match msg {
        Msg::ComposerChanged(body) => {
            model.composer_body = body;
            Vec::new()
        }

        Msg::SubmitRequested => {
            if model.is_send_disabled() {
                return Vec::new();
            }
            model.is_submitting = true;
            vec![Command::SubmitPost {
                room_id: model.room.id,
                body: model.composer_body.clone(),
            }]
        }

        Msg::SubmitResponded(Ok(post)) => {
            model.is_submitting = false;
            model.composer_body.clear();
            model.submit_errors.clear();
            // The push echo delivers the same post; add_node absorbs
            // whichever copy arrives second.
            if model.handle_post_created(&post) {
                vec![Command::ScrollToBottom {
                    container: THREAD_VIEWPORT.to_string(),
                }]
            } else {
                Vec::new()
            }
        }

        Msg::SubmitResponded(Err(SessionError::Expired)) => vec![Command::RedirectToLogin],

        Msg::SubmitResponded(Err(SessionError::Validation(errors))) => {
            model.is_submitting = false;
            model.submit_errors = errors;
            Vec::new()
        }

        Msg::SubmitResponded(Err(error)) => {
            // Composer text is preserved so the viewer can retry.
            log::debug!("submit failed: {error}");
            model.is_submitting = false;
            Vec::new()
        }

        Msg::Ticked(now) => {
            model.now = now;
            Vec::new()
        }

        Msg::ScrollPolled => vec![Command::QueryScrollPosition {
            container: THREAD_VIEWPORT.to_string(),
        }],

        Msg::ScrollPositionReceived(position) => {
            model.viewport.record_position(position);
            if model
                .viewport
                .should_fetch_older(model.posts.page_info.has_next_page, model.is_fetching_older)
            {
                model.is_fetching_older = true;
                let topmost = model.posts.first().map(|edge| edge.node.ident());
                model.viewport.capture_anchor(topmost);
                vec![Command::FetchOlder {
                    room_id: model.room.id,
                    before: model.posts.page_info.end_cursor.clone(),
                    limit: OLDER_PAGE_SIZE,
                }]
            } else {
                Vec::new()
            }
        }

        Msg::OlderFetched(Ok(page)) => {
            model.is_fetching_older = false;
            model.posts.prepend_older(page.edges, page.page_info);
            match model.viewport.take_anchor() {
                Some(anchor) => vec![Command::ScrollToAnchor {
                    container: THREAD_VIEWPORT.to_string(),
                    anchor_id: anchor.post_id,
                    offset: anchor.offset_from_top,
                }],
                None => Vec::new(),
            }
        }

        Msg::OlderFetched(Err(SessionError::Expired)) => vec![Command::RedirectToLogin],

        Msg::OlderFetched(Err(SessionError::NotFound)) => {
            // End of history: stop asking, keep everything loaded.
            model.is_fetching_older = false;
            model.posts.page_info.has_next_page = false;
            model.viewport.clear_anchor();
            Vec::new()
        }

        Msg::OlderFetched(Err(error)) => {
            log::debug!("older-page fetch failed: {error}");
            model.is_fetching_older = false;
            model.viewport.clear_anchor();
            Vec::new()
        }

        Msg::ViewRecorded(Ok(())) => Vec::new(),

        Msg::ViewRecorded(Err(SessionError::Expired)) => vec![Command::RedirectToLogin],

        Msg::ViewRecorded(Err(error)) => {
            log::debug!("record-view failed: {error}");
            Vec::new()
        }

        Msg::PushEventReceived(event) => events::consume(model, &event),

        Msg::PresenceSnapshotReceived {
            topic,
            participants,
        } => {
            model.presence.receive_snapshot(&topic, participants);
            Vec::new()
        }
    }
}

// ===================================================================
// Tests
// ===================================================================
