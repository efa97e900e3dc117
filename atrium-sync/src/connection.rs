//! Cursor-paginated ordered collections.
//!
//! A [`Connection`] holds one contiguous, chronologically ordered window
//! of a server-side list, together with the [`PageInfo`] boundary needed
//! to fetch the page before it. Two merge paths exist:
//!
//! ```text
//! fetch-older response ──► prepend_older()  (dedup by ID, anchor window)
//! live push / append   ──► add_node()       (idempotent tail insert)
//! ```
//!
//! Dedup is always by stable entity ID ([`Ident`]), never by value:
//! the same post may arrive once through a mutation response and again
//! through the push echo, and must end up in the window exactly once.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identity for nodes held in ordered collections.
pub trait Ident {
    fn ident(&self) -> Uuid;
}

/// One element of a [`Connection`]: a node plus its opaque position cursor.
///
/// Cursors are absent on edges inserted by the live path; only
/// server-fetched pages carry them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge<T> {
    pub node: T,
    pub cursor: Option<String>,
}

impl<T> Edge<T> {
    pub fn new(node: T, cursor: Option<String>) -> Self {
        Self { node, cursor }
    }

    /// Edge without a cursor, as produced by the live append path.
    pub fn cursorless(node: T) -> Self {
        Self { node, cursor: None }
    }
}

/// Pagination boundary reported by the server for the loaded window.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PageInfo {
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

/// A loaded window of an ordered server-side list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection<T> {
    pub edges: Vec<Edge<T>>,
    pub page_info: PageInfo,
}

impl<T> Default for Connection<T> {
    fn default() -> Self {
        Self {
            edges: Vec::new(),
            page_info: PageInfo::default(),
        }
    }
}

impl<T: Ident> Connection<T> {
    pub fn new(edges: Vec<Edge<T>>, page_info: PageInfo) -> Self {
        Self { edges, page_info }
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Concatenate a newly fetched forward page after the existing edges
    /// and adopt its boundary. Forward pages are strictly newer than the
    /// loaded window, so no dedup is applied here.
    pub fn append(&mut self, edges: Vec<Edge<T>>, page_info: PageInfo) {
        self.edges.extend(edges);
        self.page_info = page_info;
    }

    /// Insert an older page before the existing edges and adopt its
    /// boundary. Edges whose node ID is already loaded are dropped before
    /// the merge.
    pub fn prepend_older(&mut self, edges: Vec<Edge<T>>, page_info: PageInfo) {
        let mut older: Vec<Edge<T>> = edges
            .into_iter()
            .filter(|edge| !self.contains(edge.node.ident()))
            .collect();
        older.append(&mut self.edges);
        self.edges = older;
        self.page_info = page_info;
    }

    /// The `n` most recent edges (tail of the window).
    pub fn last(&self, n: usize) -> &[Edge<T>] {
        let start = self.edges.len().saturating_sub(n);
        &self.edges[start..]
    }

    /// The oldest loaded edge, if any.
    pub fn first(&self) -> Option<&Edge<T>> {
        self.edges.first()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.edges.iter().any(|edge| edge.node.ident() == id)
    }

    /// Idempotent live append. Returns `false` (and leaves the window
    /// untouched) when a node with the same ID is already present.
    pub fn add_node(&mut self, node: T) -> bool {
        if self.contains(node.ident()) {
            return false;
        }
        self.edges.push(Edge::cursorless(node));
        true
    }

    /// Replace the node with the same ID in place. Returns `false` when
    /// the ID is not loaded.
    pub fn update_node(&mut self, node: T) -> bool {
        match self.edges.iter_mut().find(|e| e.node.ident() == node.ident()) {
            Some(edge) => {
                edge.node = node;
                true
            }
            None => false,
        }
    }

    /// Remove the edge carrying the given node ID. Returns whether an
    /// edge was removed.
    pub fn remove_node(&mut self, id: Uuid) -> bool {
        let before = self.edges.len();
        self.edges.retain(|edge| edge.node.ident() != id);
        self.edges.len() != before
    }

    pub fn nodes(&self) -> impl Iterator<Item = &T> {
        self.edges.iter().map(|edge| &edge.node)
    }
}

// ─── Auxiliary list operations ──────────────────────────────────────

/// Insert `item` into `list` unless an element with the same key is
/// already present, in which case that element is replaced in place:
/// the list keeps exactly one element per key, the most recent value
/// wins, and the relative order of untouched elements never changes.
pub fn insert_unique_by<T, K, F>(key: F, item: T, list: &mut Vec<T>)
where
    K: PartialEq,
    F: Fn(&T) -> K,
{
    let item_key = key(&item);
    match list.iter().position(|existing| key(existing) == item_key) {
        Some(index) => list[index] = item,
        None => list.push(item),
    }
}

/// Remove the first element of `list` sharing `item`'s key. No-op when
/// no element matches.
pub fn remove_by<T, K, F>(key: F, item: &T, list: &mut Vec<T>)
where
    K: PartialEq,
    F: Fn(&T) -> K,
{
    let item_key = key(item);
    if let Some(index) = list.iter().position(|existing| key(existing) == item_key) {
        list.remove(index);
    }
}

// ===================================================================
// Tests
// ===================================================================
