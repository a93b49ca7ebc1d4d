//! Tabula - declarative list reconciliation.
//!
//! A screen describes its content as a sorted list of [`Entry`] values
//! derived from state. Whenever the state changes, Tabula projects the new
//! generation of entries, diffs it against the previous one by stable id and
//! payload, and produces a minimal [`Transition`] of deletions, insertions
//! and updates. Rows are only materialized for inserted and updated entries.
//! Transitions are applied to a [`LiveList`] on the host's main queue.
//!
//! The reactive plumbing (state container, signals, queues, disposables) is
//! re-exported from `tabula-core`.
//!
//! # Example
//!
//! ```
//! use tabula::{Entry, RowContext, SortKey, reconcile};
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Item {
//!     id: u32,
//!     label: &'static str,
//! }
//!
//! impl Entry for Item {
//!     type Id = u32;
//!     type Row = String;
//!     type Arguments = ();
//!
//!     fn stable_id(&self) -> u32 {
//!         self.id
//!     }
//!
//!     fn sort_key(&self) -> SortKey {
//!         SortKey::new(0, self.id as i32)
//!     }
//!
//!     fn make_row(&self, _ctx: &RowContext, _args: &()) -> String {
//!         self.label.to_string()
//!     }
//! }
//!
//! let previous = [Item { id: 1, label: "a" }, Item { id: 2, label: "b" }];
//! let next = [Item { id: 2, label: "B" }, Item { id: 3, label: "c" }];
//!
//! let transition = reconcile(&previous, &next, |item| item.label.to_string());
//! assert_eq!(transition.deleted, vec![0]);
//! assert_eq!(transition.updated, vec![(0, "B".to_string())]);
//! assert_eq!(transition.inserted, vec![(1, "c".to_string())]);
//! ```

pub use tabula_core::*;

pub mod arguments;
pub mod config;
pub mod controller;
pub mod entry;
mod error;
pub mod form;
pub mod live_list;
pub mod prelude;
pub mod reconcile;
pub mod transition;
pub mod validation;

pub use arguments::{ActionQueue, ActionSink, FormAction, FormArguments};
pub use config::{ConfigError, ListConfig, ListConfigBuilder};
pub use controller::{ControllerSignals, ListController, ListControllerBuilder, LoadHook, Projection};
pub use entry::{Entry, RowContext, RowModel, SECTION_STRIDE, SortKey, sort_entries};
pub use error::{Error, Result};
pub use form::{
    DataHook, DataHooks, FormData, FormEntry, FormEntryId, FormRow, Identifier, InputMode,
    RowKind, SectionKind, Value, ValueError, collect_values,
};
pub use live_list::{
    ApplyError, ApplyOutcome, ChangeKind, ListSignals, LiveList, RECENT_TRANSITIONS,
    apply_transition, validate_transition,
};
pub use reconcile::{reconcile, reconcile_with};
pub use transition::{Transition, TransitionId};
pub use validation::{
    Behaviour, Continuation, FailAction, FailResult, Validation, ValidationEvent, ValidationSink,
    check_input_limits, input_overflow, process_validation,
};
