//! Core systems for Tabula.
//!
//! This crate provides the reactive plumbing underneath the list
//! reconciliation engine:
//!
//! - **Signals**: Type-safe observer lists with RAII connection guards
//! - **State Container**: Serialized read-modify-write state with
//!   change-deduplicated publication
//! - **Main Queue**: A thread-affine task queue drained by the host UI thread
//! - **Serial Queue**: A dedicated background thread for ordered preparation work
//! - **Disposables**: Cancellation tokens and bags for subscription teardown
//! - **Thread Affinity**: Runtime checks for UI-owned data
//!
//! # State Example
//!
//! ```
//! use tabula_core::StateContainer;
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! let state = StateContainer::new(0);
//! let published = Arc::new(AtomicUsize::new(0));
//!
//! let counter = published.clone();
//! state.subscribe(move |_| {
//!     counter.fetch_add(1, Ordering::SeqCst);
//! });
//!
//! state.modify(|value| value + 1);
//! // Returning an equal value publishes nothing.
//! state.modify(|value| value);
//!
//! assert_eq!(state.read(), 1);
//! assert_eq!(published.load(Ordering::SeqCst), 1);
//! ```
//!
//! # Main Queue Example
//!
//! ```
//! use tabula_core::MainQueue;
//!
//! let queue = MainQueue::new();
//! queue.post(|| println!("runs when the host drains the queue"));
//! assert_eq!(queue.drain(), 1);
//! ```

pub mod disposable;
mod error;
pub mod logging;
pub mod queue;
pub mod serial;
pub mod signal;
pub mod state;
pub mod thread_check;

pub use disposable::{ActionDisposable, CancellationToken, Disposable, DisposableBag, MetaDisposable};
pub use error::{CoreError, QueueError, Result};
pub use logging::PerfSpan;
pub use queue::{MainQueue, TaskId};
pub use serial::{SerialQueue, SerialQueueBuilder, SerialQueueConfig};
pub use signal::{ConnectionGuard, ConnectionId, Signal};
pub use state::StateContainer;
pub use thread_check::ThreadAffinity;
