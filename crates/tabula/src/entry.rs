//! Declarative list entries.
//!
//! An [`Entry`] is an immutable description of one row: a stable identity,
//! an ordering key, an equatable payload (its `PartialEq`) and a factory for
//! the concrete row view-model. A fresh `Vec` of entries is projected from
//! state on every publication and diffed against the previous generation.

use std::fmt::Debug;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Stride between sections in the packed sort order.
pub const SECTION_STRIDE: i64 = 100_000;

/// Ordering hint of an entry: rows are grouped into sections and ordered
/// by `(section, index)` ascending.
///
/// Comparison uses the packed value `section * 100_000 + index`, so an index
/// is expected to stay below the stride.
///
/// ```
/// use tabula::SortKey;
///
/// let row = SortKey::new(0, 7);
/// let separator = SortKey::section_separator(0);
/// let next_section = SortKey::new(1, 0);
///
/// assert!(row < separator);
/// assert!(separator < next_section);
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SortKey {
    /// Section the row belongs to.
    pub section: i32,
    /// Position within the section.
    pub index: i32,
}

impl SortKey {
    /// Create a key for the row at `index` of `section`.
    pub const fn new(section: i32, index: i32) -> Self {
        Self { section, index }
    }

    /// The key of the separator that closes `section`.
    ///
    /// Its packed value is `(section + 1) * 100_000 - section`: after every
    /// ordinary row of `section` and before the first row of the next one.
    pub const fn section_separator(section: i32) -> Self {
        Self {
            section,
            index: SECTION_STRIDE as i32 - section,
        }
    }

    /// The packed integer used for comparison.
    pub const fn flat(&self) -> i64 {
        self.section as i64 * SECTION_STRIDE + self.index as i64
    }
}

impl PartialEq for SortKey {
    fn eq(&self, other: &Self) -> bool {
        self.flat() == other.flat()
    }
}

impl Eq for SortKey {}

impl Hash for SortKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.flat().hash(state);
    }
}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.flat().cmp(&other.flat())
    }
}

/// Layout constraints handed to row factories.
///
/// `height` doubles as the viewport extent for first-fast loading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RowContext {
    /// Available width in logical pixels.
    pub width: f32,
    /// Visible height in logical pixels.
    pub height: f32,
}

impl RowContext {
    /// Create a context for a `width` × `height` viewport.
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

impl Default for RowContext {
    fn default() -> Self {
        Self::new(320.0, 480.0)
    }
}

/// A materialized row view-model.
pub trait RowModel {
    /// Height the row occupies in the list.
    fn height(&self) -> f32;
}

/// A declarative description of one list row.
///
/// Payload equality is the entry's `PartialEq`: two entries with the same
/// [`stable_id`](Entry::stable_id) that compare unequal produce an update.
/// Capabilities that cannot be compared (callbacks) must be left out of it.
pub trait Entry: PartialEq {
    /// Identity preserved across generations.
    type Id: Hash + Eq + Clone + Debug;
    /// The materialized row view-model.
    type Row;
    /// Capability bundle handed to every row factory.
    type Arguments;

    /// The identity of this entry.
    fn stable_id(&self) -> Self::Id;

    /// Where this entry sorts.
    fn sort_key(&self) -> SortKey;

    /// Materialize the row view-model.
    fn make_row(&self, ctx: &RowContext, arguments: &Self::Arguments) -> Self::Row;
}

/// Stable-sort entries by [`Entry::sort_key`].
///
/// Entries with equal keys keep their projected order.
pub fn sort_entries<E: Entry>(entries: &mut [E]) {
    entries.sort_by_key(|entry| entry.sort_key());
}
