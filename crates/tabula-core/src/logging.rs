//! Logging conventions.
//!
//! Tabula logs through `tracing` and never installs a subscriber. Hosts pick
//! what to see with the usual directives, for example:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("tabula::controller=debug,tabula::reconcile=trace")
//!     .init();
//! ```
//!
//! Reconciliation summaries are logged at `debug`, individual emissions at
//! `trace`, and recoverable anomalies (duplicate ids, dropped generations)
//! at `warn`.

/// Log targets, one per subsystem.
pub mod targets {
    pub const CORE: &str = "tabula_core";
    pub const SIGNAL: &str = "tabula_core::signal";
    pub const STATE: &str = "tabula_core::state";
    /// Main and serial queues.
    pub const QUEUE: &str = "tabula_core::queue";
    pub const RECONCILE: &str = "tabula::reconcile";
    pub const LIVE_LIST: &str = "tabula::live_list";
    pub const CONTROLLER: &str = "tabula::controller";
    pub const VALIDATION: &str = "tabula::validation";
    /// Timing spans opened by [`PerfSpan`](super::PerfSpan).
    pub const PERF: &str = "tabula::perf";
}

/// Times a scope.
///
/// Opens an `info` span on [`targets::PERF`] and closes it on drop.
///
/// ```
/// use tabula_core::PerfSpan;
///
/// {
///     let _span = PerfSpan::new("first_fast_head");
///     // build rows
/// }
/// ```
pub struct PerfSpan {
    _entered: tracing::span::EnteredSpan,
}

impl PerfSpan {
    pub fn new(operation: &'static str) -> Self {
        Self {
            _entered: tracing::info_span!(target: "tabula::perf", "perf", operation).entered(),
        }
    }
}
