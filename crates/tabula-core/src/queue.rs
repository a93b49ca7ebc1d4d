//! Main-thread task queue.
//!
//! [`MainQueue`] is the hand-off point between background preparation and
//! the UI execution context. Any thread may post; only the thread that
//! created the queue drains it, typically from the host toolkit's idle or
//! frame callback. Tasks run in posting order.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::thread_check::ThreadAffinity;

/// A unique identifier for a posted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

impl TaskId {
    /// The numeric id, for logs.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

fn next_task_id() -> TaskId {
    TaskId(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
}

type Task = Box<dyn FnOnce() + Send>;

struct Posted {
    id: TaskId,
    task: Task,
}

struct QueueInner {
    tasks: Mutex<VecDeque<Posted>>,
    affinity: ThreadAffinity,
}

/// A FIFO task queue bound to the thread that created it.
///
/// Cloning yields another handle to the same queue.
///
/// ```
/// use tabula_core::MainQueue;
/// use std::sync::Arc;
/// use parking_lot::Mutex;
///
/// let queue = MainQueue::new();
/// let log = Arc::new(Mutex::new(Vec::new()));
///
/// let handle = queue.clone();
/// let log_clone = log.clone();
/// std::thread::spawn(move || {
///     handle.post(move || log_clone.lock().push("from worker"));
/// })
/// .join()
/// .unwrap();
///
/// assert_eq!(queue.drain(), 1);
/// assert_eq!(*log.lock(), vec!["from worker"]);
/// ```
#[derive(Clone)]
pub struct MainQueue {
    inner: Arc<QueueInner>,
}

impl Default for MainQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MainQueue {
    /// Create a queue owned by the current thread.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(QueueInner {
                tasks: Mutex::new(VecDeque::new()),
                affinity: ThreadAffinity::current(),
            }),
        }
    }

    /// Post a task to run on the owning thread.
    ///
    /// The returned id can [`cancel`](Self::cancel) it until it runs.
    pub fn post<F>(&self, task: F) -> TaskId
    where
        F: FnOnce() + Send + 'static,
    {
        let id = next_task_id();
        self.inner.tasks.lock().push_back(Posted {
            id,
            task: Box::new(task),
        });
        tracing::trace!(target: "tabula_core::queue", task = id.as_u64(), "posted task");
        id
    }

    /// Run `task` immediately when called on the owning thread, otherwise post it.
    pub fn run_or_post<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_current() {
            task();
        } else {
            self.post(task);
        }
    }

    /// Drop a task that has not run yet. Returns `false` if it already ran
    /// or was cancelled.
    pub fn cancel(&self, id: TaskId) -> bool {
        let mut tasks = self.inner.tasks.lock();
        if let Some(pos) = tasks.iter().position(|t| t.id == id) {
            tasks.remove(pos);
            true
        } else {
            false
        }
    }

    /// Whether anything is waiting to run.
    pub fn has_pending(&self) -> bool {
        !self.inner.tasks.lock().is_empty()
    }

    /// Number of tasks waiting to run.
    pub fn pending_count(&self) -> usize {
        self.inner.tasks.lock().len()
    }

    /// Whether the calling thread owns this queue.
    pub fn is_current(&self) -> bool {
        self.inner.affinity.is_same_thread()
    }

    /// The owning thread's affinity.
    pub fn affinity(&self) -> ThreadAffinity {
        self.inner.affinity
    }

    /// Run up to `max` tasks and report how many ran.
    ///
    /// # Panics
    ///
    /// Panics if called from a thread other than the owner.
    pub fn process_batch(&self, max: usize) -> usize {
        self.inner
            .affinity
            .assert_same_thread_with_msg("MainQueue drained off its owning thread");
        let mut processed = 0;
        while processed < max {
            // The lock is released before the task runs so tasks may post.
            let next = self.inner.tasks.lock().pop_front();
            let Some(entry) = next else { break };
            (entry.task)();
            processed += 1;
        }
        processed
    }

    /// Run tasks until none are left, including those posted while
    /// draining, and report how many ran.
    ///
    /// # Panics
    ///
    /// Panics if called from a thread other than the owner.
    #[tracing::instrument(skip_all, target = "tabula_core::queue", level = "trace")]
    pub fn drain(&self) -> usize {
        let processed = self.process_batch(usize::MAX);
        if processed > 0 {
            tracing::trace!(target: "tabula_core::queue", processed, "drained main queue");
        }
        processed
    }
}

impl std::fmt::Debug for MainQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainQueue")
            .field("pending", &self.pending_count())
            .field("thread", &self.inner.affinity.thread_id())
            .finish()
    }
}

static_assertions::assert_impl_all!(MainQueue: Send, Sync, Clone);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tasks_run_in_post_order() {
        let queue = MainQueue::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..5 {
            let order = order.clone();
            queue.post(move || order.lock().push(i));
        }

        assert_eq!(queue.pending_count(), 5);
        assert_eq!(queue.drain(), 5);
        assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
        assert!(!queue.has_pending());
    }

    #[test]
    fn test_cancel_pending_task() {
        let queue = MainQueue::new();
        let ran = Arc::new(Mutex::new(Vec::new()));

        let ran_a = ran.clone();
        let a = queue.post(move || ran_a.lock().push("a"));
        let ran_b = ran.clone();
        queue.post(move || ran_b.lock().push("b"));

        assert!(queue.cancel(a));
        assert!(!queue.cancel(a));
        queue.drain();
        assert_eq!(*ran.lock(), vec!["b"]);
    }

    #[test]
    fn test_drain_runs_tasks_posted_during_drain() {
        let queue = MainQueue::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let inner_queue = queue.clone();
        let order_outer = order.clone();
        queue.post(move || {
            order_outer.lock().push("outer");
            let order_inner = order_outer.clone();
            inner_queue.post(move || order_inner.lock().push("inner"));
        });

        assert_eq!(queue.drain(), 2);
        assert_eq!(*order.lock(), vec!["outer", "inner"]);
    }

    #[test]
    fn test_process_batch_limits_work() {
        let queue = MainQueue::new();
        for _ in 0..4 {
            queue.post(|| {});
        }
        assert_eq!(queue.process_batch(3), 3);
        assert_eq!(queue.pending_count(), 1);
    }

    #[test]
    fn test_run_or_post() {
        let queue = MainQueue::new();
        let ran = Arc::new(Mutex::new(0));

        let ran_clone = ran.clone();
        queue.run_or_post(move || *ran_clone.lock() += 1);
        assert_eq!(*ran.lock(), 1);
        assert!(!queue.has_pending());

        let handle = queue.clone();
        let ran_clone = ran.clone();
        std::thread::spawn(move || {
            assert!(!handle.is_current());
            handle.run_or_post(move || *ran_clone.lock() += 1);
        })
        .join()
        .unwrap();

        assert_eq!(*ran.lock(), 1);
        queue.drain();
        assert_eq!(*ran.lock(), 2);
    }

    #[test]
    fn test_drain_from_other_thread_panics() {
        let queue = MainQueue::new();
        let handle = queue.clone();
        let result = std::thread::spawn(move || handle.drain()).join();
        assert!(result.is_err());
    }

    #[test]
    fn test_task_ids_are_unique() {
        let queue = MainQueue::new();
        let a = queue.post(|| {});
        let b = queue.post(|| {});
        assert_ne!(a, b);
        assert!(b.as_u64() > a.as_u64());
    }
}
