//! The reconciler.
//!
//! [`reconcile`] compares two generations of entries and produces the
//! [`Transition`] that turns the old rows into the new ones:
//!
//! - ids only in `next` are inserted at their new position
//! - ids only in `previous` are deleted at their old position
//! - ids in both keep their row when their relative order is preserved;
//!   the kept set is the longest increasing run of old positions taken in
//!   new order, every other shared id becomes a delete plus an insert
//! - kept ids whose payload changed are updated at their new position
//!
//! Row factories run only for inserted and updated rows. Reconciliation is
//! pure and total: it never mutates its inputs and never fails, including
//! on duplicate ids, where the first occurrence takes part in matching and
//! later ones are treated as unrelated rows.

use std::collections::hash_map::Entry as Slot;
use std::collections::{HashMap, HashSet};

use crate::entry::{Entry, RowContext};
use crate::transition::Transition;

/// Diff `previous` against `next`, materializing rows with `make_row`.
///
/// Both slices are expected in sort order.
///
/// ```
/// use tabula::{Entry, RowContext, SortKey, reconcile};
///
/// #[derive(PartialEq)]
/// struct Item(&'static str, u32);
///
/// impl Entry for Item {
///     type Id = &'static str;
///     type Row = String;
///     type Arguments = ();
///
///     fn stable_id(&self) -> &'static str { self.0 }
///     fn sort_key(&self) -> SortKey { SortKey::new(0, 0) }
///     fn make_row(&self, _: &RowContext, _: &()) -> String {
///         format!("{}{}", self.0, self.1)
///     }
/// }
///
/// let previous = [Item("a", 1), Item("b", 1)];
/// let next = [Item("b", 2), Item("c", 1)];
/// let transition = reconcile(&previous, &next, |item| format!("{}{}", item.0, item.1));
///
/// assert_eq!(transition.deleted, vec![0]);
/// assert_eq!(transition.updated, vec![(0, "b2".to_string())]);
/// assert_eq!(transition.inserted, vec![(1, "c1".to_string())]);
/// ```
#[tracing::instrument(
    skip_all,
    target = "tabula::reconcile",
    level = "trace",
    fields(previous = previous.len(), next = next.len())
)]
pub fn reconcile<E, R, F>(previous: &[E], next: &[E], mut make_row: F) -> Transition<R>
where
    E: Entry,
    F: FnMut(&E) -> R,
{
    let mut duplicates = 0usize;

    let mut old_positions: HashMap<E::Id, usize> = HashMap::with_capacity(previous.len());
    for (position, entry) in previous.iter().enumerate() {
        match old_positions.entry(entry.stable_id()) {
            Slot::Occupied(_) => duplicates += 1,
            Slot::Vacant(slot) => {
                slot.insert(position);
            }
        }
    }

    // (new position, old position) of every shared id, in new order.
    let mut matched: Vec<(usize, usize)> = Vec::with_capacity(next.len().min(previous.len()));
    let mut insert_positions: Vec<usize> = Vec::new();
    let mut seen: HashSet<E::Id> = HashSet::with_capacity(next.len());

    for (position, entry) in next.iter().enumerate() {
        let id = entry.stable_id();
        match old_positions.get(&id) {
            _ if seen.contains(&id) => {
                duplicates += 1;
                insert_positions.push(position);
            }
            Some(&old) => {
                seen.insert(id);
                matched.push((position, old));
            }
            None => {
                seen.insert(id);
                insert_positions.push(position);
            }
        }
    }

    let old_order: Vec<usize> = matched.iter().map(|&(_, old)| old).collect();
    let stable = longest_increasing(&old_order);

    let mut retained = vec![false; previous.len()];
    let mut updated = Vec::new();
    for (&(new, old), keep) in matched.iter().zip(stable) {
        if keep {
            retained[old] = true;
            if previous[old] != next[new] {
                updated.push((new, make_row(&next[new])));
            }
        } else {
            insert_positions.push(new);
        }
    }

    let deleted: Vec<usize> = retained
        .iter()
        .enumerate()
        .filter_map(|(position, &kept)| (!kept).then_some(position))
        .collect();

    insert_positions.sort_unstable();
    let inserted: Vec<(usize, R)> = insert_positions
        .into_iter()
        .map(|position| (position, make_row(&next[position])))
        .collect();

    if duplicates > 0 {
        tracing::warn!(
            target: "tabula::reconcile",
            duplicates,
            "duplicate entry ids; later occurrences treated as distinct rows"
        );
    }

    let transition = Transition::new(deleted, inserted, updated);
    tracing::debug!(target: "tabula::reconcile", summary = %transition, "reconciled");
    transition
}

/// Diff two generations, materializing rows through [`Entry::make_row`].
pub fn reconcile_with<E>(
    previous: &[E],
    next: &[E],
    ctx: &RowContext,
    arguments: &E::Arguments,
) -> Transition<E::Row>
where
    E: Entry,
{
    reconcile(previous, next, |entry| entry.make_row(ctx, arguments))
}

/// Marks the members of one longest strictly increasing subsequence.
///
/// Patience sorting with predecessor links, `O(n log n)`.
fn longest_increasing(values: &[usize]) -> Vec<bool> {
    // tails[k]: index into `values` of the smallest tail of a run of length k + 1.
    let mut tails: Vec<usize> = Vec::new();
    let mut predecessors: Vec<Option<usize>> = vec![None; values.len()];

    for (i, &value) in values.iter().enumerate() {
        let length = tails.partition_point(|&t| values[t] < value);
        if length > 0 {
            predecessors[i] = Some(tails[length - 1]);
        }
        if length == tails.len() {
            tails.push(i);
        } else {
            tails[length] = i;
        }
    }

    let mut members = vec![false; values.len()];
    let mut cursor = tails.last().copied();
    while let Some(i) = cursor {
        members[i] = true;
        cursor = predecessors[i];
    }
    members
}
