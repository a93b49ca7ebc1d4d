//! Prelude module for Tabula.
//!
//! ```
//! use tabula::prelude::*;
//! ```
//!
//! This provides access to:
//! - Entries and rows (`Entry`, `RowModel`, `SortKey`, `RowContext`)
//! - Diffing and application (`reconcile`, `Transition`, `LiveList`)
//! - The controller and its configuration (`ListController`, `ListConfig`)
//! - Reactive plumbing (`StateContainer`, `Signal`, `MainQueue`, `SerialQueue`)
//! - Forms and validation (`FormEntry`, `FormArguments`, `Validation`)

// ============================================================================
// Entries and Rows
// ============================================================================

pub use crate::entry::{Entry, RowContext, RowModel, SortKey, sort_entries};

// ============================================================================
// Diffing and Application
// ============================================================================

pub use crate::live_list::{ApplyError, ApplyOutcome, LiveList};
pub use crate::reconcile::{reconcile, reconcile_with};
pub use crate::transition::{Transition, TransitionId};

// ============================================================================
// Controller
// ============================================================================

pub use crate::config::ListConfig;
pub use crate::controller::ListController;
pub use crate::{Error, Result};

// ============================================================================
// Reactive Plumbing
// ============================================================================

pub use tabula_core::{
    CancellationToken, ConnectionGuard, Disposable, DisposableBag, MainQueue, SerialQueue, Signal,
    StateContainer,
};

// ============================================================================
// Forms and Validation
// ============================================================================

pub use crate::arguments::{ActionSink, FormAction, FormArguments};
pub use crate::form::{FormData, FormEntry, FormRow, Identifier, Value};
pub use crate::validation::{Behaviour, FailResult, Validation, ValidationEvent};
