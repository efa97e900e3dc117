//! Viewport tracking and backward-pagination triggering.
//!
//! The core never touches a real scroll container. It receives measured
//! positions from the platform bridge as messages, and emits scroll
//! commands back. This module tracks the last measured position and the
//! anchor needed to keep the visual position stable when older items
//! are prepended above it:
//!
//! ```text
//! Idle ──(position received)──► PositionKnown
//!   PositionKnown ──(near top, not fetching, more pages)──► Fetching
//!     Fetching ──(older page merged)──► Idle + restore-anchor command
//! ```
//!
//! Live (forward) appends never produce an anchor restore; new realtime
//! content always scrolls the viewport to the bottom.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Element ID of the conversation thread container, as understood by
/// the platform scroll bridge.
pub const THREAD_VIEWPORT: &str = "thread-viewport";

/// Offset-from-top at or below which backward pagination triggers.
pub const FETCH_THRESHOLD: f32 = 200.0;

/// A measured scroll position reported by the platform bridge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScrollPosition {
    pub offset_from_top: f32,
}

impl ScrollPosition {
    pub fn new(offset_from_top: f32) -> Self {
        Self { offset_from_top }
    }
}

/// The item that was topmost before a prepend, plus the measured offset
/// used to fine-tune the restored position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub post_id: Uuid,
    pub offset_from_top: f32,
}

/// Tracks the viewport for one conversation view.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    last_position: Option<ScrollPosition>,
    pending_anchor: Option<Anchor>,
}

impl Viewport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> Option<ScrollPosition> {
        self.last_position
    }

    pub fn record_position(&mut self, position: ScrollPosition) {
        self.last_position = Some(position);
    }

    /// Whether the last measured position is within the fetch threshold
    /// of the top. `false` while no position has been measured yet.
    pub fn near_top(&self) -> bool {
        match self.last_position {
            Some(position) => position.offset_from_top <= FETCH_THRESHOLD,
            None => false,
        }
    }

    /// Backward pagination triggers iff the server reports more pages,
    /// no backward fetch is outstanding, and the viewport is near the
    /// top.
    pub fn should_fetch_older(&self, has_next_page: bool, is_fetching: bool) -> bool {
        has_next_page && !is_fetching && self.near_top()
    }

    /// Capture the restore anchor at fetch time: the currently topmost
    /// loaded item and the offset measured just before the fetch.
    pub fn capture_anchor(&mut self, topmost: Option<Uuid>) {
        self.pending_anchor = match (topmost, self.last_position) {
            (Some(post_id), Some(position)) => Some(Anchor {
                post_id,
                offset_from_top: position.offset_from_top,
            }),
            _ => None,
        };
    }

    /// Take the pending anchor, leaving none behind.
    pub fn take_anchor(&mut self) -> Option<Anchor> {
        self.pending_anchor.take()
    }

    pub fn clear_anchor(&mut self) {
        self.pending_anchor = None;
    }
}

// ===================================================================
// Tests
// ===================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_fetch_before_first_measurement() {
        let viewport = Viewport::new();
        assert!(!viewport.near_top());
        assert!(!viewport.should_fetch_older(true, false));
    }

    #[test]
    fn test_fetch_triggers_below_threshold() {
        let mut viewport = Viewport::new();
        viewport.record_position(ScrollPosition::new(150.0));
        assert!(viewport.should_fetch_older(true, false));
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let mut viewport = Viewport::new();
        viewport.record_position(ScrollPosition::new(FETCH_THRESHOLD));
        assert!(viewport.should_fetch_older(true, false));
    }

    #[test]
    fn test_no_fetch_above_threshold() {
        let mut viewport = Viewport::new();
        viewport.record_position(ScrollPosition::new(250.0));
        assert!(!viewport.should_fetch_older(true, false));
    }

    #[test]
    fn test_no_fetch_while_already_fetching() {
        let mut viewport = Viewport::new();
        viewport.record_position(ScrollPosition::new(10.0));
        assert!(!viewport.should_fetch_older(true, true));
    }

    #[test]
    fn test_no_fetch_without_next_page() {
        let mut viewport = Viewport::new();
        viewport.record_position(ScrollPosition::new(10.0));
        assert!(!viewport.should_fetch_older(false, false));
    }

    #[test]
    fn test_anchor_capture_and_take() {
        let mut viewport = Viewport::new();
        viewport.record_position(ScrollPosition::new(120.0));
        let topmost = Uuid::new_v4();
        viewport.capture_anchor(Some(topmost));

        let anchor = viewport.take_anchor().unwrap();
        assert_eq!(anchor.post_id, topmost);
        assert_eq!(anchor.offset_from_top, 120.0);
        assert!(viewport.take_anchor().is_none());
    }

    #[test]
    fn test_anchor_requires_topmost_item() {
        let mut viewport = Viewport::new();
        viewport.record_position(ScrollPosition::new(120.0));
        viewport.capture_anchor(None);
        assert!(viewport.take_anchor().is_none());
    }

    #[test]
    fn test_anchor_requires_measured_position() {
        let mut viewport = Viewport::new();
        viewport.capture_anchor(Some(Uuid::new_v4()));
        assert!(viewport.take_anchor().is_none());
    }

    #[test]
    fn test_clear_anchor() {
        let mut viewport = Viewport::new();
        viewport.record_position(ScrollPosition::new(50.0));
        viewport.capture_anchor(Some(Uuid::new_v4()));
        viewport.clear_anchor();
        assert!(viewport.take_anchor().is_none());
    }
}
