//! Observer lists.
//!
//! A [`Signal<Args>`] holds slots and calls each of them, in the order they
//! were connected, whenever a value is emitted. Slots run on the emitting
//! thread. The state container publishes through a signal, and so do the
//! live list and the controller.
//!
//! ```
//! use std::sync::Arc;
//! use parking_lot::Mutex;
//! use tabula_core::Signal;
//!
//! let rows_inserted = Signal::<usize>::new();
//! let seen = Arc::new(Mutex::new(Vec::new()));
//!
//! let sink = seen.clone();
//! let id = rows_inserted.connect(move |index| sink.lock().push(*index));
//!
//! rows_inserted.emit(3);
//! rows_inserted.disconnect(id);
//! rows_inserted.emit(4);
//! assert_eq!(*seen.lock(), vec![3]);
//! ```

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

use crate::disposable::Disposable;

new_key_type! {
    /// Identifies one connected slot.
    ///
    /// Ids are versioned: once disconnected, an id never matches a later slot.
    pub struct ConnectionId;
}

type Slot<Args> = Arc<dyn Fn(&Args) + Send + Sync>;

/// A list of slots receiving `&Args` on every emission.
///
/// Emission copies the slot list and releases the lock before calling
/// anything, so a slot may connect or disconnect slots on the signal it is
/// called from. A slot removed mid-emission still sees that emission.
pub struct Signal<Args> {
    slots: Mutex<SlotMap<ConnectionId, Slot<Args>>>,
}

impl<Args: Send + 'static> Default for Signal<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args: Send + 'static> Signal<Args> {
    /// A signal without slots.
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(SlotMap::with_key()),
        }
    }

    /// Add `slot`; it stays connected until [`disconnect`](Self::disconnect).
    pub fn connect<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        self.slots.lock().insert(Arc::new(slot))
    }

    /// Add `slot` for as long as the returned guard lives.
    ///
    /// The guard refers to the signal weakly; dropping the signal first is
    /// fine.
    pub fn connect_scoped<F>(self: &Arc<Self>, slot: F) -> ConnectionGuard<Args>
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        ConnectionGuard {
            id: self.connect(slot),
            signal: Arc::downgrade(self),
        }
    }

    /// Remove a slot. Returns `false` if it was already gone.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        self.slots.lock().remove(id).is_some()
    }

    /// Number of connected slots.
    pub fn connection_count(&self) -> usize {
        self.slots.lock().len()
    }

    /// Call every slot with `args`.
    #[tracing::instrument(skip_all, target = "tabula_core::signal", level = "trace")]
    pub fn emit(&self, args: Args) {
        let snapshot: Vec<Slot<Args>> = self.slots.lock().values().cloned().collect();
        tracing::trace!(target: "tabula_core::signal", slots = snapshot.len(), "emit");
        for slot in &snapshot {
            slot(&args);
        }
    }
}

/// Keeps a slot connected while alive.
///
/// Returned by [`Signal::connect_scoped`]; disconnects on drop or
/// [`dispose`](Disposable::dispose).
pub struct ConnectionGuard<Args> {
    signal: Weak<Signal<Args>>,
    id: ConnectionId,
}

impl<Args> ConnectionGuard<Args> {
    fn release(&self) {
        if let Some(signal) = self.signal.upgrade() {
            signal.slots.lock().remove(self.id);
        }
    }
}

impl<Args: Send + 'static> Disposable for ConnectionGuard<Args> {
    fn dispose(&self) {
        self.release();
    }
}

impl<Args> Drop for ConnectionGuard<Args> {
    fn drop(&mut self) {
        self.release();
    }
}

static_assertions::assert_impl_all!(Signal<usize>: Send, Sync);
static_assertions::assert_impl_all!(ConnectionGuard<usize>: Send, Sync);
