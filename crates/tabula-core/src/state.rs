//! Serialized state container.
//!
//! [`StateContainer<S>`] holds the single authoritative value of a screen's
//! state. Every mutation is a read-modify-write closure run under one lock,
//! so concurrent producers serialize and no delta is lost. A new value is
//! published to subscribers only when it differs from the last published
//! one; that equality gate is the only coalescing in the pipeline.
//!
//! Publications are delivered in the order the mutations were made, even
//! when producers race from different threads or a subscriber mutates the
//! container while a publication is being delivered. A nested mutation is
//! queued and delivered once every subscriber has seen the value before it.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::{Mutex, ReentrantMutex};

use crate::signal::{ConnectionGuard, ConnectionId, Signal};

/// A thread-safe state holder with change-deduplicated publication.
///
/// # Example
///
/// ```
/// use tabula_core::StateContainer;
/// use std::sync::Arc;
/// use parking_lot::Mutex;
///
/// #[derive(Clone, PartialEq, Debug, Default)]
/// struct Counter {
///     value: i32,
/// }
///
/// let state = StateContainer::new(Counter::default());
/// let seen = Arc::new(Mutex::new(Vec::new()));
///
/// let seen_clone = seen.clone();
/// state.subscribe(move |counter: &Counter| seen_clone.lock().push(counter.value));
///
/// state.modify(|mut counter| {
///     counter.value += 1;
///     counter
/// });
/// state.set(Counter { value: 1 });
///
/// assert_eq!(*seen.lock(), vec![1]);
/// ```
pub struct StateContainer<S> {
    value: Mutex<S>,
    /// Held from the read-modify-write through the end of publication so
    /// that subscribers observe values in mutation order.
    publish_order: ReentrantMutex<()>,
    /// Changed values not delivered yet, oldest first.
    outbox: Mutex<VecDeque<S>>,
    /// Set while the outermost mutation delivers the outbox.
    delivering: AtomicBool,
    changed: Arc<Signal<S>>,
    publish_count: AtomicU64,
}

impl<S> StateContainer<S>
where
    S: Clone + PartialEq + Send + 'static,
{
    /// Create a container holding `initial`.
    ///
    /// The initial value counts as published; subscribers are not notified
    /// of it. Use [`observe`](Self::observe) to receive it.
    pub fn new(initial: S) -> Self {
        Self {
            value: Mutex::new(initial),
            publish_order: ReentrantMutex::new(()),
            outbox: Mutex::new(VecDeque::new()),
            delivering: AtomicBool::new(false),
            changed: Arc::new(Signal::new()),
            publish_count: AtomicU64::new(0),
        }
    }

    /// Return a clone of the current value.
    pub fn read(&self) -> S {
        self.value.lock().clone()
    }

    /// Borrow the current value for the duration of `f`.
    ///
    /// `f` must not call back into this container.
    pub fn with<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.value.lock())
    }

    /// Apply `f` to the current value, store the result and return it.
    ///
    /// Subscribers are notified, on the calling thread, when the result
    /// differs from the previous value. `f` runs under the container's lock
    /// and must not call back into this container; subscribers may. A
    /// subscriber that mutates the container gets the new value back
    /// immediately, but subscribers see it only after the current
    /// publication has reached all of them.
    pub fn modify(&self, f: impl FnOnce(S) -> S) -> S {
        self.commit(f).0
    }

    /// Replace the value. Returns `true` when it differed and was published.
    pub fn set(&self, value: S) -> bool {
        self.commit(|_| value).1
    }

    fn commit(&self, f: impl FnOnce(S) -> S) -> (S, bool) {
        let _order = self.publish_order.lock();
        let (next, changed) = {
            let mut value = self.value.lock();
            let next = f(value.clone());
            let changed = *value != next;
            if changed {
                *value = next.clone();
            }
            (next, changed)
        };

        if changed {
            let count = self.publish_count.fetch_add(1, Ordering::SeqCst) + 1;
            tracing::trace!(target: "tabula_core::state", publish = count, "state changed");
            self.outbox.lock().push_back(next.clone());
            self.deliver();
        } else {
            tracing::trace!(target: "tabula_core::state", "state unchanged, skipping publish");
        }
        (next, changed)
    }

    /// Connect a subscriber to future publications.
    pub fn subscribe<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&S) + Send + Sync + 'static,
    {
        self.changed.connect(slot)
    }

    /// Connect a subscriber that is disconnected when the guard drops.
    pub fn subscribe_scoped<F>(&self, slot: F) -> ConnectionGuard<S>
    where
        F: Fn(&S) + Send + Sync + 'static,
    {
        self.changed.connect_scoped(slot)
    }

    /// Connect a subscriber and immediately deliver the current value to it.
    ///
    /// No publication can slip between the replay and the connection.
    pub fn observe<F>(&self, slot: F) -> ConnectionGuard<S>
    where
        F: Fn(&S) + Send + Sync + 'static,
    {
        let _order = self.publish_order.lock();
        let current = self.read();
        slot(&current);
        self.changed.connect_scoped(slot)
    }

    /// Disconnect a subscriber.
    pub fn unsubscribe(&self, id: ConnectionId) -> bool {
        self.changed.disconnect(id)
    }

    /// Number of publications made so far.
    pub fn publish_count(&self) -> u64 {
        self.publish_count.load(Ordering::SeqCst)
    }

    /// Number of connected subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.changed.connection_count()
    }

    /// Drain the outbox. Only the outermost caller holding `publish_order`
    /// delivers; nested calls leave their value queued behind the current one.
    fn deliver(&self) {
        if self.delivering.swap(true, Ordering::AcqRel) {
            return;
        }
        let _reset = DeliveryGuard(&self.delivering);
        loop {
            let Some(value) = self.outbox.lock().pop_front() else {
                break;
            };
            self.changed.emit(value);
        }
    }
}

/// Clears the delivering flag even when a subscriber panics.
struct DeliveryGuard<'a>(&'a AtomicBool);

impl Drop for DeliveryGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<S> std::fmt::Debug for StateContainer<S>
where
    S: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateContainer")
            .field("value", &*self.value.lock())
            .field("publish_count", &self.publish_count.load(Ordering::SeqCst))
            .finish()
    }
}

static_assertions::assert_impl_all!(StateContainer<Vec<String>>: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, PartialEq, Debug, Default)]
    struct TestState {
        count: i32,
        name: String,
    }

    #[test]
    fn test_modify_publishes_on_change() {
        let state = StateContainer::new(TestState::default());
        let received = Arc::new(Mutex::new(Vec::new()));

        let received_clone = received.clone();
        state.subscribe(move |s: &TestState| received_clone.lock().push(s.count));

        let result = state.modify(|mut s| {
            s.count = 3;
            s
        });

        assert_eq!(result.count, 3);
        assert_eq!(state.read().count, 3);
        assert_eq!(*received.lock(), vec![3]);
        assert_eq!(state.publish_count(), 1);
    }

    #[test]
    fn test_noop_modify_publishes_nothing() {
        let state = StateContainer::new(TestState::default());
        let received = Arc::new(Mutex::new(0));

        let received_clone = received.clone();
        state.subscribe(move |_| *received_clone.lock() += 1);

        state.modify(|s| s);
        state.modify(|mut s| {
            s.name = String::new();
            s
        });

        assert_eq!(*received.lock(), 0);
        assert_eq!(state.publish_count(), 0);
    }

    #[test]
    fn test_set_reports_change() {
        let state = StateContainer::new(1);
        assert!(state.set(2));
        assert!(!state.set(2));
        assert_eq!(state.read(), 2);
    }

    #[test]
    fn test_concurrent_modify_folds_all_deltas() {
        let state = Arc::new(StateContainer::new(0u64));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let state = state.clone();
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        state.modify(|v| v + 1);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(state.read(), 2000);
        assert_eq!(state.publish_count(), 2000);
    }

    #[test]
    fn test_publications_arrive_in_mutation_order() {
        let state = Arc::new(StateContainer::new(0u64));
        let received = Arc::new(Mutex::new(Vec::new()));

        let received_clone = received.clone();
        state.subscribe(move |v: &u64| received_clone.lock().push(*v));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let state = state.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        state.modify(|v| v + 1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let received = received.lock();
        assert_eq!(received.len(), 400);
        assert!(received.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn test_observe_replays_current_value() {
        let state = StateContainer::new(5);
        let received = Arc::new(Mutex::new(Vec::new()));

        let received_clone = received.clone();
        let guard = state.observe(move |v: &i32| received_clone.lock().push(*v));
        state.set(6);
        drop(guard);
        state.set(7);

        assert_eq!(*received.lock(), vec![5, 6]);
        assert_eq!(state.subscriber_count(), 0);
    }

    #[test]
    fn test_subscriber_may_modify_reentrantly() {
        let state = Arc::new(StateContainer::new(0));
        let weak = Arc::downgrade(&state);
        state.subscribe(move |v: &i32| {
            if *v == 1
                && let Some(state) = weak.upgrade()
            {
                state.modify(|v| v + 10);
            }
        });

        state.set(1);
        assert_eq!(state.read(), 11);
        assert_eq!(state.publish_count(), 2);
    }

    #[test]
    fn test_nested_modify_is_delivered_after_current_publication() {
        let state = Arc::new(StateContainer::new(0));
        let weak = Arc::downgrade(&state);
        state.subscribe(move |v: &i32| {
            if *v == 1
                && let Some(state) = weak.upgrade()
            {
                state.modify(|_| 2);
            }
        });

        let later = Arc::new(Mutex::new(Vec::new()));
        let later_clone = later.clone();
        state.subscribe(move |v: &i32| later_clone.lock().push(*v));

        state.set(1);

        assert_eq!(state.read(), 2);
        assert_eq!(*later.lock(), vec![1, 2]);
        assert_eq!(later.lock().last().copied(), Some(state.read()));
    }

    #[test]
    fn test_concurrent_set_reports_exactly_one_change() {
        let state = Arc::new(StateContainer::new(0u32));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let state = state.clone();
                std::thread::spawn(move || state.set(1))
            })
            .collect();

        let changed = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|changed| *changed)
            .count();
        assert_eq!(changed, 1);
        assert_eq!(state.publish_count(), 1);
    }

    #[test]
    fn test_unsubscribe() {
        let state = StateContainer::new(0);
        let received = Arc::new(Mutex::new(0));
        let received_clone = received.clone();
        let id = state.subscribe(move |_| *received_clone.lock() += 1);

        state.set(1);
        assert!(state.unsubscribe(id));
        state.set(2);
        assert_eq!(*received.lock(), 1);
    }
}
