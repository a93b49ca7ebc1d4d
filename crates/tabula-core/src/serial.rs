//! Serial background queue.
//!
//! A [`SerialQueue`] owns one named thread fed by a bounded channel and runs
//! tasks strictly in submission order. The list controller uses one as its
//! prepare queue so that diffs of consecutive generations never overlap.
//!
//! Stopping drops the sending half of the channel: the thread finishes what
//! is already queued, sees the disconnect and exits.
//!
//! # Example
//!
//! ```
//! use tabula_core::SerialQueue;
//!
//! let queue = SerialQueue::builder().name("prepare").build();
//! queue.send(|| println!("runs on the prepare thread")).unwrap();
//!
//! let answer = queue.send_sync(|| 6 * 7).unwrap();
//! assert_eq!(answer, 42);
//!
//! queue.stop_and_join();
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle, ThreadId};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use parking_lot::Mutex;

use crate::error::QueueError;

type Task = Box<dyn FnOnce() + Send>;

/// Settings for a [`SerialQueue`].
#[derive(Debug, Clone)]
pub struct SerialQueueConfig {
    /// Thread name.
    pub name: String,
    /// Thread stack size in bytes; `None` keeps the platform default.
    pub stack_size: Option<usize>,
    /// How many tasks may wait before `send` reports [`QueueError::Full`].
    pub queue_capacity: usize,
}

impl Default for SerialQueueConfig {
    fn default() -> Self {
        Self {
            name: "tabula-prepare".to_string(),
            stack_size: None,
            queue_capacity: 256,
        }
    }
}

impl SerialQueueConfig {
    /// Default settings under another thread name.
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Builder for [`SerialQueue`].
#[derive(Debug, Default)]
pub struct SerialQueueBuilder {
    config: SerialQueueConfig,
}

impl SerialQueueBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.config.stack_size = Some(bytes);
        self
    }

    /// Channel capacity; clamped to at least one.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity.max(1);
        self
    }

    /// Spawn the queue thread.
    pub fn build(self) -> SerialQueue {
        SerialQueue::with_config(self.config)
    }
}

/// A dedicated thread executing tasks one at a time, in order.
pub struct SerialQueue {
    sender: Mutex<Option<Sender<Task>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    thread_id: ThreadId,
    pending: Arc<AtomicUsize>,
}

impl SerialQueue {
    /// Spawn a queue with default settings.
    ///
    /// # Panics
    ///
    /// Panics if the operating system refuses to spawn the thread.
    pub fn new() -> Self {
        Self::with_config(SerialQueueConfig::default())
    }

    pub fn builder() -> SerialQueueBuilder {
        SerialQueueBuilder::new()
    }

    /// Spawn a queue with `config`.
    ///
    /// # Panics
    ///
    /// Panics if the operating system refuses to spawn the thread.
    pub fn with_config(config: SerialQueueConfig) -> Self {
        let (sender, receiver) = bounded::<Task>(config.queue_capacity.max(1));
        let pending = Arc::new(AtomicUsize::new(0));

        let mut spawner = thread::Builder::new().name(config.name);
        if let Some(bytes) = config.stack_size {
            spawner = spawner.stack_size(bytes);
        }
        let thread_pending = pending.clone();
        let handle = spawner
            .spawn(move || run_tasks(receiver, &thread_pending))
            .expect("Failed to spawn serial queue thread");

        Self {
            sender: Mutex::new(Some(sender)),
            thread_id: handle.thread().id(),
            handle: Mutex::new(Some(handle)),
            pending,
        }
    }

    /// Whether the queue still accepts tasks.
    pub fn is_running(&self) -> bool {
        self.sender.lock().is_some()
    }

    /// Whether the calling thread is this queue's thread.
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Tasks submitted but not finished yet.
    pub fn pending_tasks(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    fn sender(&self) -> Result<Sender<Task>, QueueError> {
        self.sender.lock().clone().ok_or(QueueError::Stopped)
    }

    /// Queue a task without blocking.
    ///
    /// Fails with [`QueueError::Full`] when the channel is at capacity and
    /// [`QueueError::Stopped`] after [`stop`](Self::stop).
    pub fn send<F>(&self, task: F) -> Result<(), QueueError>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self.sender()?;
        self.pending.fetch_add(1, Ordering::AcqRel);
        sender.try_send(Box::new(task)).map_err(|err| {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            match err {
                TrySendError::Full(_) => QueueError::Full,
                TrySendError::Disconnected(_) => QueueError::Stopped,
            }
        })
    }

    /// Queue a task, waiting for room in the channel.
    ///
    /// Calling this from the queue's own thread with a full channel never
    /// returns.
    pub fn send_blocking<F>(&self, task: F) -> Result<(), QueueError>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self.sender()?;
        self.pending.fetch_add(1, Ordering::AcqRel);
        sender.send(Box::new(task)).map_err(|_| {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            QueueError::Stopped
        })
    }

    /// Run `task` on the queue and wait for its result.
    ///
    /// Everything queued earlier finishes first, so this doubles as a
    /// barrier. On the queue's own thread the task runs inline.
    pub fn send_sync<F, T>(&self, task: F) -> Result<T, QueueError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        if self.is_current() {
            return Ok(task());
        }

        let (reply, result) = bounded(1);
        self.send_blocking(move || {
            let _ = reply.send(task());
        })?;
        result.recv().map_err(|_| QueueError::Stopped)
    }

    /// Stop accepting tasks. Queued tasks still run.
    pub fn stop(&self) {
        if self.sender.lock().take().is_some() {
            tracing::debug!(target: "tabula_core::queue", "serial queue stopping");
        }
    }

    /// Wait for the thread to exit.
    ///
    /// Returns `false` when already joined, when called on the queue's own
    /// thread, or when the thread panicked.
    pub fn join(&self) -> bool {
        if self.is_current() {
            return false;
        }
        let handle = self.handle.lock().take();
        handle.is_some_and(|handle| handle.join().is_ok())
    }

    /// [`stop`](Self::stop) then [`join`](Self::join).
    pub fn stop_and_join(&self) -> bool {
        self.stop();
        self.join()
    }
}

impl Default for SerialQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SerialQueue {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for SerialQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialQueue")
            .field("running", &self.is_running())
            .field("pending_tasks", &self.pending_tasks())
            .finish()
    }
}

fn run_tasks(receiver: Receiver<Task>, pending: &AtomicUsize) {
    // Disconnection is only reported once the channel is empty.
    for task in receiver.iter() {
        task();
        pending.fetch_sub(1, Ordering::AcqRel);
    }
    tracing::debug!(target: "tabula_core::queue", "serial queue stopped");
}

static_assertions::assert_impl_all!(SerialQueue: Send, Sync);
