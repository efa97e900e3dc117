//! # atrium-sync — real-time conversation synchronization for Atrium
//!
//! Keeps a locally held, paginated view of a team-chat conversation
//! consistent with the server despite network latency and concurrent
//! updates: out-of-band push events, presence rosters, and
//! user-initiated pagination all converge on one per-view model.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ChatApi (queries/mutations)   ┌─────────────┐
//! │ SessionModel │ ◄──────────────────────────────► │  backend    │
//! │  + update()  │                                  └──────┬──────┘
//! └──────┬───────┘                                         │ publish
//!        │ Msg / Command                                   ▼
//! ┌──────┴───────┐        binary frames          ┌─────────────────┐
//! │  PushClient  │ ◄───────────────────────────► │   PushGateway   │
//! │  (per user)  │                               │ (topic fan-out) │
//! └──────────────┘                               └─────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`connection`] — cursor-paginated ordered windows with idempotent merge
//! - [`presence`] — topic-scoped rosters with full-state snapshots
//! - [`events`] — folding pushed entity events into the model
//! - [`session`] — the per-view reducer, commands, and lifecycle
//! - [`scroll`] — viewport tracking and backward-pagination policy
//! - [`api`] — the query/mutation boundary the controller talks through
//! - [`protocol`] — binary wire format of the push transport
//! - [`client`] / [`server`] / [`broadcast`] — transport endpoints
//! - [`timefmt`] — 12-hour timestamp labels
//!
//! All state transitions happen through serialized reducer invocations;
//! concurrency lives entirely in outstanding async operations whose
//! completions come back as messages. See [`session`] for the rules.

pub mod api;
pub mod broadcast;
pub mod client;
pub mod connection;
pub mod events;
pub mod presence;
pub mod protocol;
pub mod scroll;
pub mod server;
pub mod session;
pub mod timefmt;
pub mod types;

// Re-exports for convenience
pub use api::{ChatApi, InitData, PostPage};
pub use broadcast::{HubStats, TopicHub};
pub use client::{ConnectionState, PushClient, PushEvent};
pub use connection::{insert_unique_by, remove_by, Connection, Edge, Ident, PageInfo};
pub use events::{consume, InboundEvent};
pub use presence::{room_topic, Participant, PresenceState, PresenceTracker};
pub use protocol::{ChannelMessage, MessageKind, ProtocolError};
pub use scroll::{Anchor, ScrollPosition, Viewport, FETCH_THRESHOLD, THREAD_VIEWPORT};
pub use server::{GatewayConfig, GatewayHandle, GatewayStats, PushGateway};
pub use session::{
    init, setup_commands, teardown_commands, update, Command, Msg, Session, SessionError,
    SessionModel, ValidationError, OLDER_PAGE_SIZE,
};
pub use timefmt::format_time;
pub use types::{Post, Room, RoomSummary, Space, User};
