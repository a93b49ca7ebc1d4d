//! Arguments bundles.
//!
//! Rows never hold a reference to the controller that created them. Instead
//! every row factory receives a cheap-to-clone bundle of capabilities
//! (closures) built once per screen. The capabilities usually forward an
//! action into an [`ActionSink`], which delivers it wherever the host wants:
//! onto the [`MainQueue`], or into an [`ActionQueue`] drained explicitly.

use std::fmt;
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, unbounded};
use tabula_core::MainQueue;

use crate::form::{Identifier, Value};

/// Delivers actions of type `A` to their handler.
///
/// Clones share the same destination.
pub struct ActionSink<A> {
    deliver: Arc<dyn Fn(A) + Send + Sync>,
}

impl<A> Clone for ActionSink<A> {
    fn clone(&self) -> Self {
        Self {
            deliver: self.deliver.clone(),
        }
    }
}

impl<A: Send + 'static> ActionSink<A> {
    /// A sink that calls `deliver` directly on the sending thread.
    pub fn new<F>(deliver: F) -> Self
    where
        F: Fn(A) + Send + Sync + 'static,
    {
        Self {
            deliver: Arc::new(deliver),
        }
    }

    /// A sink that drops every action.
    pub fn discard() -> Self {
        Self::new(|_| {})
    }

    /// A sink paired with a queue the host drains when convenient.
    ///
    /// ```
    /// use tabula::ActionSink;
    ///
    /// let (sink, queue) = ActionSink::channel();
    /// sink.send("tap");
    /// sink.send("edit");
    ///
    /// let mut seen = Vec::new();
    /// assert_eq!(queue.drain(|action| seen.push(action)), 2);
    /// assert_eq!(seen, vec!["tap", "edit"]);
    /// ```
    pub fn channel() -> (Self, ActionQueue<A>) {
        let (sender, receiver): (Sender<A>, Receiver<A>) = unbounded();
        let sink = Self::new(move |action| {
            if sender.send(action).is_err() {
                tracing::warn!(target: "tabula::controller", "action queue dropped, discarding action");
            }
        });
        (sink, ActionQueue { receiver })
    }

    /// A sink that runs `handler` on the thread owning `queue`.
    pub fn on_queue<F>(queue: &MainQueue, handler: F) -> Self
    where
        F: Fn(A) + Send + Sync + 'static,
    {
        let queue = queue.clone();
        let handler = Arc::new(handler);
        Self::new(move |action| {
            let handler = handler.clone();
            queue.post(move || handler(action));
        })
    }

    /// Deliver an action.
    pub fn send(&self, action: A) {
        (self.deliver)(action);
    }
}

impl<A> fmt::Debug for ActionSink<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionSink").finish_non_exhaustive()
    }
}

/// The receiving half of [`ActionSink::channel`].
#[derive(Debug)]
pub struct ActionQueue<A> {
    receiver: Receiver<A>,
}

impl<A> ActionQueue<A> {
    /// Take the next pending action, if any.
    pub fn try_next(&self) -> Option<A> {
        self.receiver.try_recv().ok()
    }

    /// Hand every pending action to `handler`. Returns how many were handled.
    pub fn drain(&self, mut handler: impl FnMut(A)) -> usize {
        let mut handled = 0;
        while let Ok(action) = self.receiver.try_recv() {
            handler(action);
            handled += 1;
        }
        handled
    }

    /// Number of pending actions.
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Whether no action is pending.
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

/// Actions raised by form rows.
#[derive(Debug, Clone, PartialEq)]
pub enum FormAction {
    /// A row was activated or edited, carrying its new value.
    Select(Identifier, Value),
    /// Row data changed; dependent state should be refreshed.
    DataUpdated,
}

/// The capability bundle handed to every form row.
#[derive(Clone)]
pub struct FormArguments {
    select: Arc<dyn Fn(Identifier, Value) + Send + Sync>,
    data_updated: Arc<dyn Fn() + Send + Sync>,
}

impl FormArguments {
    /// Build a bundle from its two capabilities.
    pub fn new<S, D>(select: S, data_updated: D) -> Self
    where
        S: Fn(Identifier, Value) + Send + Sync + 'static,
        D: Fn() + Send + Sync + 'static,
    {
        Self {
            select: Arc::new(select),
            data_updated: Arc::new(data_updated),
        }
    }

    /// Build a bundle that forwards every capability into `sink`.
    pub fn from_sink(sink: ActionSink<FormAction>) -> Self {
        let on_update = sink.clone();
        Self::new(
            move |identifier, value| sink.send(FormAction::Select(identifier, value)),
            move || on_update.send(FormAction::DataUpdated),
        )
    }

    /// A bundle whose capabilities do nothing.
    pub fn noop() -> Self {
        Self::new(|_, _| {}, || {})
    }

    /// Report that the row `identifier` now holds `value`.
    pub fn select(&self, identifier: Identifier, value: Value) {
        (self.select)(identifier, value);
    }

    /// Report that row data changed.
    pub fn data_updated(&self) {
        (self.data_updated)();
    }
}

impl Default for FormArguments {
    fn default() -> Self {
        Self::noop()
    }
}

impl fmt::Debug for FormArguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormArguments").finish_non_exhaustive()
    }
}

static_assertions::assert_impl_all!(FormArguments: Send, Sync, Clone);
static_assertions::assert_impl_all!(ActionSink<FormAction>: Send, Sync, Clone);
