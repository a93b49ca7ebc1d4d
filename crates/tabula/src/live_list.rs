//! The live row list and the transition applier.
//!
//! [`apply_transition`] is the single place that knows the order in which a
//! [`Transition`] must be applied: deletions from high to low, insertions
//! from low to high, then updates. It validates every index first and
//! leaves the rows untouched when the transition does not fit them.
//!
//! [`LiveList`] wraps the rows owned by the UI execution context, applies
//! transitions through `apply_transition`, skips a transition it has applied
//! recently, and reports each change through [`ListSignals`].

use std::collections::VecDeque;
use std::fmt;

use tabula_core::{Signal, ThreadAffinity};

use crate::transition::{Transition, TransitionId};

/// Which part of a transition an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Row removal.
    Delete,
    /// Row insertion.
    Insert,
    /// Row replacement.
    Update,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delete => write!(f, "deletion"),
            Self::Insert => write!(f, "insertion"),
            Self::Update => write!(f, "update"),
        }
    }
}

/// A transition that does not fit the rows it was applied to.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApplyError {
    /// A deletion index is past the end of the old rows.
    #[error("deletion index {index} out of bounds for {len} rows")]
    DeleteOutOfBounds { index: usize, len: usize },
    /// An insertion index is past the end of the partially applied rows.
    #[error("insertion index {index} out of bounds for {len} rows")]
    InsertOutOfBounds { index: usize, len: usize },
    /// An update index is past the end of the new rows.
    #[error("update index {index} out of bounds for {len} rows")]
    UpdateOutOfBounds { index: usize, len: usize },
    /// Indices of one kind are not strictly ascending.
    #[error("{kind} indices not strictly ascending at index {index}")]
    Unordered { kind: ChangeKind, index: usize },
}

/// Check that `transition` fits a list of `len` rows.
///
/// Returns the row count after application.
pub fn validate_transition<R>(len: usize, transition: &Transition<R>) -> Result<usize, ApplyError> {
    ascending(ChangeKind::Delete, transition.deleted.iter().copied())?;
    ascending(ChangeKind::Insert, transition.inserted.iter().map(|(i, _)| *i))?;
    ascending(ChangeKind::Update, transition.updated.iter().map(|(i, _)| *i))?;

    if let Some(&index) = transition.deleted.last() {
        if index >= len {
            return Err(ApplyError::DeleteOutOfBounds { index, len });
        }
    }

    let mut current = len - transition.deleted.len();
    for &(index, _) in &transition.inserted {
        if index > current {
            return Err(ApplyError::InsertOutOfBounds { index, len: current });
        }
        current += 1;
    }

    if let Some(&(index, _)) = transition.updated.last() {
        if index >= current {
            return Err(ApplyError::UpdateOutOfBounds { index, len: current });
        }
    }

    Ok(current)
}

fn ascending(kind: ChangeKind, indices: impl Iterator<Item = usize>) -> Result<(), ApplyError> {
    let mut previous: Option<usize> = None;
    for index in indices {
        if previous.is_some_and(|p| p >= index) {
            return Err(ApplyError::Unordered { kind, index });
        }
        previous = Some(index);
    }
    Ok(())
}

/// Apply `transition` to `rows` in the only order that is correct.
///
/// On error `rows` is left exactly as it was.
///
/// ```
/// use tabula::{Transition, apply_transition};
///
/// let mut rows = vec!["a", "b"];
/// let transition = Transition::new(vec![0], vec![(1, "c")], vec![(0, "B")]);
/// apply_transition(&mut rows, transition).unwrap();
/// assert_eq!(rows, vec!["B", "c"]);
/// ```
pub fn apply_transition<R>(rows: &mut Vec<R>, transition: Transition<R>) -> Result<(), ApplyError> {
    validate_transition(rows.len(), &transition)?;

    for &index in transition.deleted.iter().rev() {
        rows.remove(index);
    }
    for (index, row) in transition.inserted {
        rows.insert(index, row);
    }
    for (index, row) in transition.updated {
        rows[index] = row;
    }
    Ok(())
}

/// Result of [`LiveList::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The transition was applied.
    Applied {
        deleted: usize,
        inserted: usize,
        updated: usize,
    },
    /// A transition with the same id was applied before; nothing changed.
    AlreadyApplied,
}

/// Notifications emitted by a [`LiveList`].
///
/// Row signals fire once per changed row, in application order, with the
/// index the change happened at. Slots run while the list is being
/// mutated and must not access it.
#[derive(Default)]
pub struct ListSignals {
    /// A row was removed at the given index.
    pub rows_removed: Signal<usize>,
    /// A row was inserted at the given index.
    pub rows_inserted: Signal<usize>,
    /// The row at the given index was replaced.
    pub row_updated: Signal<usize>,
    /// Fired once per applied transition, including empty ones.
    pub transition_applied: Signal<TransitionId>,
}

/// How many applied transition ids a [`LiveList`] remembers.
pub const RECENT_TRANSITIONS: usize = 64;

/// The live ordered collection of row view-models.
pub struct LiveList<R> {
    rows: Vec<R>,
    affinity: ThreadAffinity,
    /// Ids of the last [`RECENT_TRANSITIONS`] applied transitions, oldest first.
    recent: VecDeque<TransitionId>,
    applied_count: usize,
    signals: ListSignals,
}

impl<R> Default for LiveList<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> LiveList<R> {
    /// Create an empty list owned by the current thread.
    pub fn new() -> Self {
        Self::with_affinity(ThreadAffinity::current())
    }

    /// Create an empty list owned by the thread `affinity` refers to.
    pub fn with_affinity(affinity: ThreadAffinity) -> Self {
        Self {
            rows: Vec::new(),
            affinity,
            recent: VecDeque::with_capacity(RECENT_TRANSITIONS),
            applied_count: 0,
            signals: ListSignals::default(),
        }
    }

    /// The list's notifications.
    pub fn signals(&self) -> &ListSignals {
        &self.signals
    }

    /// Apply a transition.
    ///
    /// Out-of-range or unordered transitions are refused without touching
    /// the rows. A transition whose id is among the last
    /// [`RECENT_TRANSITIONS`] applied is skipped.
    #[tracing::instrument(
        skip_all,
        target = "tabula::live_list",
        level = "trace",
        fields(transition = transition.id().as_u64())
    )]
    pub fn apply(&mut self, transition: Transition<R>) -> Result<ApplyOutcome, ApplyError> {
        self.affinity.debug_assert_same_thread();

        let id = transition.id();
        if self.recent.contains(&id) {
            tracing::debug!(target: "tabula::live_list", transition = id.as_u64(), "transition already applied");
            return Ok(ApplyOutcome::AlreadyApplied);
        }

        let deleted = transition.deleted.clone();
        let inserted: Vec<usize> = transition.inserted.iter().map(|(i, _)| *i).collect();
        let updated: Vec<usize> = transition.updated.iter().map(|(i, _)| *i).collect();

        apply_transition(&mut self.rows, transition).inspect_err(|err| {
            tracing::warn!(target: "tabula::live_list", transition = id.as_u64(), %err, "refused transition");
        })?;

        if self.recent.len() == RECENT_TRANSITIONS {
            self.recent.pop_front();
        }
        self.recent.push_back(id);
        self.applied_count += 1;

        for &index in deleted.iter().rev() {
            self.signals.rows_removed.emit(index);
        }
        for &index in &inserted {
            self.signals.rows_inserted.emit(index);
        }
        for &index in &updated {
            self.signals.row_updated.emit(index);
        }
        self.signals.transition_applied.emit(id);

        tracing::trace!(
            target: "tabula::live_list",
            rows = self.rows.len(),
            deleted = deleted.len(),
            inserted = inserted.len(),
            updated = updated.len(),
            "applied transition"
        );

        Ok(ApplyOutcome::Applied {
            deleted: deleted.len(),
            inserted: inserted.len(),
            updated: updated.len(),
        })
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the list has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The row at `index`.
    pub fn get(&self, index: usize) -> Option<&R> {
        self.rows.get(index)
    }

    /// All rows in order.
    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    /// Iterate the rows in order.
    pub fn iter(&self) -> std::slice::Iter<'_, R> {
        self.rows.iter()
    }

    /// Number of transitions applied so far.
    pub fn applied_count(&self) -> usize {
        self.applied_count
    }

    /// Whether a transition with `id` is among the recently applied ones.
    pub fn has_applied(&self, id: TransitionId) -> bool {
        self.recent.contains(&id)
    }
}

impl<'a, R> IntoIterator for &'a LiveList<R> {
    type Item = &'a R;
    type IntoIter = std::slice::Iter<'a, R>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

impl<R: fmt::Debug> fmt::Debug for LiveList<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveList")
            .field("rows", &self.rows)
            .field("applied_count", &self.applied_count)
            .finish()
    }
}

static_assertions::assert_impl_all!(LiveList<String>: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn seeded(rows: &[&'static str]) -> LiveList<&'static str> {
        let mut list = LiveList::new();
        let inserted = rows.iter().copied().enumerate().collect();
        list.apply(Transition::new(vec![], inserted, vec![])).unwrap();
        list
    }

    #[test]
    fn test_apply_orders_changes() {
        let mut list = seeded(&["a", "b", "c", "d"]);
        let transition = Transition::new(vec![0, 2], vec![(0, "x"), (3, "y")], vec![(1, "B")]);

        let outcome = list.apply(transition).unwrap();

        assert_eq!(list.rows(), ["x", "B", "d", "y"]);
        assert_eq!(
            outcome,
            ApplyOutcome::Applied {
                deleted: 2,
                inserted: 2,
                updated: 1
            }
        );
    }

    #[test]
    fn test_out_of_bounds_refused_without_mutation() {
        let mut list = seeded(&["a", "b"]);

        let delete = Transition::new(vec![2], vec![], vec![]);
        assert_eq!(
            list.apply(delete).unwrap_err(),
            ApplyError::DeleteOutOfBounds { index: 2, len: 2 }
        );

        let insert = Transition::new(vec![0], vec![(2, "z")], vec![]);
        assert_eq!(
            list.apply(insert).unwrap_err(),
            ApplyError::InsertOutOfBounds { index: 2, len: 1 }
        );

        let update = Transition::new(vec![], vec![], vec![(2, "z")]);
        assert_eq!(
            list.apply(update).unwrap_err(),
            ApplyError::UpdateOutOfBounds { index: 2, len: 2 }
        );

        assert_eq!(list.rows(), ["a", "b"]);
        assert_eq!(list.applied_count(), 1);
    }

    #[test]
    fn test_unordered_indices_refused() {
        let mut rows = vec![1, 2, 3];
        let err = apply_transition(&mut rows, Transition::new(vec![2, 0], vec![], vec![])).unwrap_err();
        assert_eq!(
            err,
            ApplyError::Unordered {
                kind: ChangeKind::Delete,
                index: 0
            }
        );
        assert_eq!(rows, vec![1, 2, 3]);
        assert_eq!(err.to_string(), "deletion indices not strictly ascending at index 0");
    }

    #[test]
    fn test_duplicate_transition_is_skipped() {
        let mut list = seeded(&["a"]);
        let transition = Transition::new(vec![], vec![(1, "b")], vec![]);
        let replay = transition.clone();

        list.apply(transition).unwrap();
        assert_eq!(list.apply(replay).unwrap(), ApplyOutcome::AlreadyApplied);
        assert_eq!(list.rows(), ["a", "b"]);
        assert_eq!(list.applied_count(), 2);
    }

    #[test]
    fn test_applied_record_stays_bounded() {
        let mut list = LiveList::new();
        let mut ids = Vec::new();
        for index in 0..RECENT_TRANSITIONS * 3 {
            let transition = Transition::new(vec![], vec![(index, index)], vec![]);
            ids.push(transition.id());
            list.apply(transition).unwrap();
        }

        assert_eq!(list.recent.len(), RECENT_TRANSITIONS);
        assert_eq!(list.applied_count(), RECENT_TRANSITIONS * 3);
        assert!(!list.has_applied(ids[0]));
        assert!(ids[ids.len() - RECENT_TRANSITIONS..].iter().all(|id| list.has_applied(*id)));
    }

    #[test]
    fn test_signals_report_each_change() {
        let mut list = seeded(&["a", "b", "c"]);
        let events = Arc::new(Mutex::new(Vec::new()));

        let e = events.clone();
        list.signals().rows_removed.connect(move |&i| e.lock().push(format!("removed {i}")));
        let e = events.clone();
        list.signals().rows_inserted.connect(move |&i| e.lock().push(format!("inserted {i}")));
        let e = events.clone();
        list.signals().row_updated.connect(move |&i| e.lock().push(format!("updated {i}")));
        let e = events.clone();
        list.signals().transition_applied.connect(move |_| e.lock().push("applied".to_string()));

        let transition = Transition::new(vec![0, 2], vec![(1, "x")], vec![(0, "B")]);
        list.apply(transition).unwrap();

        assert_eq!(
            *events.lock(),
            vec!["removed 2", "removed 0", "inserted 1", "updated 0", "applied"]
        );
    }

    #[test]
    fn test_empty_transition_still_reports_applied() {
        let mut list = seeded(&["a"]);
        let applied = Arc::new(Mutex::new(Vec::new()));

        let a = applied.clone();
        list.signals().transition_applied.connect(move |&id| a.lock().push(id));

        let transition = Transition::<&str>::empty();
        let id = transition.id();
        list.apply(transition).unwrap();

        assert_eq!(*applied.lock(), vec![id]);
        assert!(list.has_applied(id));
    }

    #[test]
    fn test_accessors() {
        let list = seeded(&["a", "b"]);
        assert_eq!(list.len(), 2);
        assert!(!list.is_empty());
        assert_eq!(list.get(1), Some(&"b"));
        assert_eq!(list.get(2), None);
        assert_eq!(list.iter().count(), 2);
        assert_eq!((&list).into_iter().copied().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
