//! Disposables and cancellation.
//!
//! A [`Disposable`] is anything that can be torn down: a signal connection,
//! a pending pipeline, a background subscription. Disposing is idempotent.
//!
//! [`CancellationToken`] is the cooperative flag checked by long-running
//! work (reconciliation, queued application) so that a disposed controller
//! stops producing transitions.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::error::{CoreError, Result};

/// Something that can be disposed.
pub trait Disposable: Send + Sync {
    /// Tear the resource down. Calling this more than once has no effect.
    fn dispose(&self);
}

/// A cancellation token for cooperative task cancellation.
///
/// Clones share the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Return `Err(CoreError::Cancelled)` once cancellation has been requested.
    ///
    /// ```
    /// use tabula_core::{CancellationToken, CoreError};
    ///
    /// let token = CancellationToken::new();
    /// assert!(token.check().is_ok());
    /// token.cancel();
    /// assert_eq!(token.check(), Err(CoreError::Cancelled));
    /// ```
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(CoreError::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl Disposable for CancellationToken {
    fn dispose(&self) {
        self.cancel();
    }
}

/// Runs a closure the first time it is disposed.
pub struct ActionDisposable {
    action: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl ActionDisposable {
    /// Wrap `action` so it runs on the first `dispose()`.
    pub fn new<F>(action: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            action: Mutex::new(Some(Box::new(action))),
        }
    }
}

impl Disposable for ActionDisposable {
    fn dispose(&self) {
        let action = self.action.lock().take();
        if let Some(action) = action {
            action();
        }
    }
}

impl std::fmt::Debug for ActionDisposable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionDisposable")
            .field("pending", &self.action.lock().is_some())
            .finish()
    }
}

/// A collection of disposables torn down together.
///
/// Items added after the bag was disposed are disposed immediately. The bag
/// disposes its contents when dropped.
#[derive(Default)]
pub struct DisposableBag {
    inner: Mutex<BagState>,
}

#[derive(Default)]
struct BagState {
    items: Vec<Box<dyn Disposable>>,
    disposed: bool,
}

impl DisposableBag {
    /// Create an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a disposable to the bag.
    pub fn add<D>(&self, item: D)
    where
        D: Disposable + 'static,
    {
        let mut state = self.inner.lock();
        if state.disposed {
            drop(state);
            item.dispose();
            return;
        }
        state.items.push(Box::new(item));
    }

    /// Number of disposables currently held.
    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    /// Whether the bag holds nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the bag has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.lock().disposed
    }
}

impl Disposable for DisposableBag {
    fn dispose(&self) {
        let items = {
            let mut state = self.inner.lock();
            state.disposed = true;
            std::mem::take(&mut state.items)
        };
        for item in items {
            item.dispose();
        }
    }
}

impl Drop for DisposableBag {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Holds at most one disposable; replacing it disposes the previous one.
#[derive(Default)]
pub struct MetaDisposable {
    inner: Mutex<MetaState>,
}

#[derive(Default)]
struct MetaState {
    current: Option<Box<dyn Disposable>>,
    disposed: bool,
}

impl MetaDisposable {
    /// Create an empty holder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the held disposable, disposing the previous one.
    pub fn set<D>(&self, item: D)
    where
        D: Disposable + 'static,
    {
        let mut state = self.inner.lock();
        if state.disposed {
            drop(state);
            item.dispose();
            return;
        }
        let previous = state.current.replace(Box::new(item));
        drop(state);
        if let Some(previous) = previous {
            previous.dispose();
        }
    }
}

impl Disposable for MetaDisposable {
    fn dispose(&self) {
        let current = {
            let mut state = self.inner.lock();
            state.disposed = true;
            state.current.take()
        };
        if let Some(current) = current {
            current.dispose();
        }
    }
}

static_assertions::assert_impl_all!(DisposableBag: Send, Sync);
static_assertions::assert_impl_all!(CancellationToken: Send, Sync);
