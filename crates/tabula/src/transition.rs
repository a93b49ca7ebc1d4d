//! Row transitions.
//!
//! A [`Transition`] is the edit script the reconciler hands to the live list:
//! deletions in the old index space, insertions and updates in the new one.
//! Applying deletions from high to low, then insertions from low to high,
//! then updates, to the old list yields the new list. That ordering is
//! enforced by [`apply_transition`](crate::live_list::apply_transition).

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identity of a constructed transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransitionId(u64);

impl TransitionId {
    /// Get the raw u64 value of this transition ID.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

static NEXT_TRANSITION_ID: AtomicU64 = AtomicU64::new(1);

fn next_transition_id() -> TransitionId {
    TransitionId(NEXT_TRANSITION_ID.fetch_add(1, Ordering::Relaxed))
}

/// An edit script turning one generation of rows into the next.
#[derive(Debug, Clone)]
pub struct Transition<R> {
    id: TransitionId,
    /// Indices to remove, ascending, in the old index space.
    pub deleted: Vec<usize>,
    /// Rows to insert, ascending by index, in the new index space.
    pub inserted: Vec<(usize, R)>,
    /// Rows whose payload changed, ascending by index, in the new index space.
    pub updated: Vec<(usize, R)>,
    /// Whether the host should animate the change.
    pub animated: bool,
    /// Whether the host should batch the change into one visual update.
    pub grouping: bool,
    /// Whether only visible rows should animate.
    pub animate_visible_only: bool,
    /// Set on the trailing chunk of a split initial load.
    pub is_part_of_transition: bool,
}

impl<R> Transition<R> {
    /// Create a transition with default presentation flags and a fresh id.
    pub fn new(deleted: Vec<usize>, inserted: Vec<(usize, R)>, updated: Vec<(usize, R)>) -> Self {
        Self {
            id: next_transition_id(),
            deleted,
            inserted,
            updated,
            animated: false,
            grouping: true,
            animate_visible_only: true,
            is_part_of_transition: false,
        }
    }

    /// A transition that changes nothing.
    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new(), Vec::new())
    }

    /// The unique id of this transition.
    pub fn id(&self) -> TransitionId {
        self.id
    }

    /// Whether the transition changes nothing.
    pub fn is_empty(&self) -> bool {
        self.deleted.is_empty() && self.inserted.is_empty() && self.updated.is_empty()
    }

    /// Total number of row changes.
    pub fn change_count(&self) -> usize {
        self.deleted.len() + self.inserted.len() + self.updated.len()
    }

    /// Set whether the host should animate.
    pub fn with_animated(mut self, animated: bool) -> Self {
        self.animated = animated;
        self
    }

    /// Set whether the change is grouped.
    pub fn with_grouping(mut self, grouping: bool) -> Self {
        self.grouping = grouping;
        self
    }

    /// Set whether only visible rows animate.
    pub fn with_animate_visible_only(mut self, visible_only: bool) -> Self {
        self.animate_visible_only = visible_only;
        self
    }

    /// Mark the transition as the tail of a split load.
    pub fn with_part_of_transition(mut self, part: bool) -> Self {
        self.is_part_of_transition = part;
        self
    }

    /// Convert the row type, keeping the id and flags.
    pub fn map_rows<T>(self, mut f: impl FnMut(R) -> T) -> Transition<T> {
        Transition {
            id: self.id,
            deleted: self.deleted,
            inserted: self.inserted.into_iter().map(|(i, r)| (i, f(r))).collect(),
            updated: self.updated.into_iter().map(|(i, r)| (i, f(r))).collect(),
            animated: self.animated,
            grouping: self.grouping,
            animate_visible_only: self.animate_visible_only,
            is_part_of_transition: self.is_part_of_transition,
        }
    }
}

impl<R> Default for Transition<R> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<R> fmt::Display for Transition<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "inserted: {}, updated: {}, deleted: {}",
            self.inserted.len(),
            self.updated.len(),
            self.deleted.len()
        )
    }
}
