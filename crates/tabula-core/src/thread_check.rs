//! Owning-thread checks.
//!
//! A [`MainQueue`](crate::MainQueue) and the live row list it feeds belong
//! to the thread that created them, normally the host's UI thread. They carry
//! a [`ThreadAffinity`] and check it before touching their contents: always
//! where a foreign thread would corrupt state, only in debug builds on row
//! accessors.

use std::thread::{self, ThreadId};

/// The thread a value belongs to.
///
/// ```
/// use tabula_core::ThreadAffinity;
///
/// let owner = ThreadAffinity::current();
/// assert!(owner.is_same_thread());
///
/// let seen_elsewhere = std::thread::spawn(move || owner.is_same_thread())
///     .join()
///     .unwrap();
/// assert!(!seen_elsewhere);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadAffinity {
    owner: ThreadId,
}

impl Default for ThreadAffinity {
    fn default() -> Self {
        Self::current()
    }
}

impl ThreadAffinity {
    /// Bind to the calling thread.
    #[inline]
    pub fn current() -> Self {
        Self {
            owner: thread::current().id(),
        }
    }

    /// The owning thread.
    #[inline]
    pub fn thread_id(&self) -> ThreadId {
        self.owner
    }

    /// Whether the calling thread is the owner.
    #[inline]
    pub fn is_same_thread(&self) -> bool {
        thread::current().id() == self.owner
    }

    /// Panic unless called on the owning thread.
    #[inline]
    pub fn assert_same_thread(&self) {
        self.assert_same_thread_with_msg("value accessed from wrong thread");
    }

    /// Panic with `msg` unless called on the owning thread.
    pub fn assert_same_thread_with_msg(&self, msg: &str) {
        if !self.is_same_thread() {
            wrong_thread(self.owner, msg);
        }
    }

    /// [`assert_same_thread`](Self::assert_same_thread) in debug builds, nothing in release.
    #[inline]
    pub fn debug_assert_same_thread(&self) {
        if cfg!(debug_assertions) {
            self.assert_same_thread();
        }
    }
}

#[cold]
#[inline(never)]
fn wrong_thread(owner: ThreadId, msg: &str) -> ! {
    let caller = thread::current();
    panic!(
        "{msg}: owned by {owner:?}, called from {:?} ({:?}); post the work to the owner's MainQueue",
        caller.name().unwrap_or("<unnamed>"),
        caller.id(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_passes_checks() {
        let owner = ThreadAffinity::default();
        owner.assert_same_thread();
        owner.debug_assert_same_thread();
        assert_eq!(owner, ThreadAffinity::current());
    }

    #[test]
    fn test_foreign_thread_panics_with_message() {
        let owner = ThreadAffinity::current();
        let outcome = std::thread::spawn(move || {
            owner.assert_same_thread_with_msg("rows touched off the UI thread");
        })
        .join();

        let payload = outcome.unwrap_err();
        let message = payload.downcast_ref::<String>().cloned().unwrap_or_default();
        assert!(message.starts_with("rows touched off the UI thread"));
    }

    #[test]
    fn test_copies_share_owner() {
        let owner = ThreadAffinity::current();
        let copy = owner;
        let id = std::thread::spawn(move || copy.thread_id()).join().unwrap();
        assert_eq!(id, owner.thread_id());
    }
}
