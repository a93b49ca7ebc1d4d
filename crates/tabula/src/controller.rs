//! The list controller.
//!
//! A [`ListController`] wires the whole pipeline together:
//!
//! 1. it observes a [`StateContainer`] and projects each published state
//!    into a sorted generation of entries,
//! 2. swaps the new generation in as "previous" for the one after it,
//! 3. reconciles the two generations, inline or on the prepare queue,
//! 4. posts the resulting transition to the [`MainQueue`], where it is
//!    applied to the [`LiveList`] when the host drains the queue.
//!
//! The first generation can be split ("first-fast"): the head transition
//! only materializes rows until the viewport is filled, the remaining rows
//! follow in a second transition flagged `is_part_of_transition`.
//!
//! # Example
//!
//! ```
//! use tabula::prelude::*;
//!
//! let main_queue = MainQueue::new();
//! let controller = ListController::builder(
//!     vec!["alpha".to_string()],
//!     FormArguments::noop(),
//!     |names: &Vec<String>, _args: &FormArguments| {
//!         names
//!             .iter()
//!             .enumerate()
//!             .map(|(index, name)| FormEntry::Desc {
//!                 section: 0,
//!                 index: index as i32,
//!                 text: name.clone(),
//!             })
//!             .collect()
//!     },
//! )
//! .main_queue(main_queue.clone())
//! .build()
//! .unwrap();
//!
//! main_queue.drain();
//! assert!(controller.is_ready());
//!
//! controller.update_state(|mut names| {
//!     names.push("beta".to_string());
//!     names
//! });
//! main_queue.drain();
//! assert_eq!(controller.list().lock().len(), 2);
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tabula_core::{
    ActionDisposable, CancellationToken, Disposable, DisposableBag, MainQueue, MetaDisposable,
    PerfSpan, QueueError, SerialQueue, Signal, StateContainer,
};

use crate::config::ListConfig;
use crate::entry::{Entry, RowContext, RowModel, sort_entries};
use crate::error::Result;
use crate::form::DataHooks;
use crate::live_list::{ApplyOutcome, LiveList};
use crate::reconcile::reconcile_with;
use crate::transition::{Transition, TransitionId};
use crate::validation::{Validation, ValidationEvent, ValidationSink, process_validation};

/// Projects a state value into the entries of one generation.
pub type Projection<S, E> = Arc<dyn Fn(&S, &<E as Entry>::Arguments) -> Vec<E> + Send + Sync>;

/// Called once with the rows of the first applied transition, right after
/// `ready`. Runs with the live list locked.
pub type LoadHook<R> = Arc<dyn Fn(&[R]) + Send + Sync>;

/// Notifications emitted by a [`ListController`] on the main queue's thread.
#[derive(Default)]
pub struct ControllerSignals {
    /// Fired once, after the first transition has been applied.
    pub ready: Signal<()>,
    /// Fired before a transition is applied.
    pub before_transaction: Signal<TransitionId>,
    /// Fired for every applied transition.
    pub transition_applied: Signal<TransitionId>,
    /// Fired after a transition was applied and relayed.
    pub after_transaction: Signal<TransitionId>,
    /// Events produced by [`ListController::validate`].
    pub validation_events: Signal<ValidationEvent>,
}

struct Shared<S, E: Entry> {
    state: Arc<StateContainer<S>>,
    projection: Projection<S, E>,
    arguments: E::Arguments,
    config: ListConfig,
    main_queue: MainQueue,
    prepare_queue: Option<Arc<SerialQueue>>,
    previous: Mutex<Arc<Vec<E>>>,
    generation: AtomicU64,
    list: Arc<Mutex<LiveList<E::Row>>>,
    signals: ControllerSignals,
    did_set_ready: AtomicBool,
    on_load: Option<LoadHook<E::Row>>,
    data_hooks: DataHooks,
    lifetime: CancellationToken,
}

/// One generation waiting to be reconciled.
struct Preparation<E> {
    generation: u64,
    previous: Arc<Vec<E>>,
    next: Arc<Vec<E>>,
}

/// Drives a [`LiveList`] from a [`StateContainer`] through a projection.
pub struct ListController<S, E: Entry> {
    shared: Arc<Shared<S, E>>,
    disposables: DisposableBag,
}

impl<S, E> ListController<S, E>
where
    S: Clone + PartialEq + Send + 'static,
    E: Entry + Send + Sync + 'static,
    E::Row: RowModel + Send + 'static,
    E::Arguments: Send + Sync + 'static,
{
    /// Start building a controller around a fresh state container.
    pub fn builder<P>(initial: S, arguments: E::Arguments, projection: P) -> ListControllerBuilder<S, E>
    where
        P: Fn(&S, &E::Arguments) -> Vec<E> + Send + Sync + 'static,
    {
        Self::builder_with_state(Arc::new(StateContainer::new(initial)), arguments, projection)
    }

    /// Start building a controller around an existing state container.
    pub fn builder_with_state<P>(
        state: Arc<StateContainer<S>>,
        arguments: E::Arguments,
        projection: P,
    ) -> ListControllerBuilder<S, E>
    where
        P: Fn(&S, &E::Arguments) -> Vec<E> + Send + Sync + 'static,
    {
        ListControllerBuilder {
            state,
            arguments,
            projection: Arc::new(projection),
            config: ListConfig::default(),
            main_queue: None,
            prepare_queue: None,
            on_load: None,
            data_hooks: DataHooks::default(),
        }
    }

    /// Apply `f` to the state. Returns the new state.
    pub fn update_state(&self, f: impl FnOnce(S) -> S) -> S {
        self.shared.state.modify(f)
    }

    /// A clone of the current state.
    pub fn current_state(&self) -> S {
        self.shared.state.read()
    }

    /// Process a validation result, emitting its events on
    /// [`ControllerSignals::validation_events`] from the main queue's thread.
    pub fn validate(&self, validation: Validation) {
        let weak = Arc::downgrade(&self.shared);
        let main_queue = self.shared.main_queue.clone();
        let sink: ValidationSink = Arc::new(move |event| {
            let weak = weak.clone();
            main_queue.run_or_post(move || {
                if let Some(shared) = weak.upgrade() {
                    shared.signals.validation_events.emit(event);
                }
            });
        });
        process_validation(validation, &sink);
    }

    /// Stop the pipeline: no further state is projected and no pending
    /// transition is applied.
    pub fn dispose(&self) {
        self.disposables.dispose();
        tracing::debug!(target: "tabula::controller", "controller disposed");
    }
}

impl<S, E: Entry> ListController<S, E> {
    /// The state container.
    pub fn state(&self) -> &Arc<StateContainer<S>> {
        &self.shared.state
    }

    /// Shared handle to the live list.
    ///
    /// Locking it from a [`ListSignals`](crate::ListSignals) slot deadlocks.
    pub fn list(&self) -> Arc<Mutex<LiveList<E::Row>>> {
        self.shared.list.clone()
    }

    /// The arguments bundle handed to row factories.
    pub fn arguments(&self) -> &E::Arguments {
        &self.shared.arguments
    }

    /// The configuration.
    pub fn config(&self) -> &ListConfig {
        &self.shared.config
    }

    /// The queue transitions are applied on.
    pub fn main_queue(&self) -> &MainQueue {
        &self.shared.main_queue
    }

    /// The controller's notifications.
    pub fn signals(&self) -> &ControllerSignals {
        &self.shared.signals
    }

    /// Fired once after the first transition was applied.
    pub fn ready(&self) -> &Signal<()> {
        &self.shared.signals.ready
    }

    /// Fired for every applied transition.
    pub fn transition_applied(&self) -> &Signal<TransitionId> {
        &self.shared.signals.transition_applied
    }

    /// Validation events.
    pub fn validation_events(&self) -> &Signal<ValidationEvent> {
        &self.shared.signals.validation_events
    }

    /// Whether the first transition has been applied.
    pub fn is_ready(&self) -> bool {
        self.shared.did_set_ready.load(Ordering::SeqCst)
    }

    /// Whether [`dispose`](Self::dispose) was called.
    pub fn is_disposed(&self) -> bool {
        self.shared.lifetime.is_cancelled()
    }

    pub(crate) fn data_hooks(&self) -> &DataHooks {
        &self.shared.data_hooks
    }
}

impl<S, E> Shared<S, E>
where
    S: Clone + PartialEq + Send + 'static,
    E: Entry + Send + Sync + 'static,
    E::Row: RowModel + Send + 'static,
    E::Arguments: Send + Sync + 'static,
{
    /// Handle one published state on the publishing thread.
    fn on_state(self: &Arc<Self>, state: &S) {
        if self.lifetime.is_cancelled() {
            return;
        }

        let mut next = (self.projection)(state, &self.arguments);
        sort_entries(&mut next);
        let next = Arc::new(next);
        let previous = std::mem::replace(&mut *self.previous.lock(), next.clone());
        let generation = self.generation.fetch_add(1, Ordering::SeqCst);

        let preparation = Preparation {
            generation,
            previous,
            next,
        };

        let off_main = generation > 0 || self.config.prepare_off_main;
        match &self.prepare_queue {
            Some(queue) if off_main => {
                let weak = Arc::downgrade(self);
                self.schedule(queue, move || {
                    if let Some(shared) = weak.upgrade() {
                        shared.prepare(preparation);
                    }
                });
            }
            _ => self.prepare(preparation),
        }
    }

    fn schedule(&self, queue: &SerialQueue, task: impl FnOnce() + Send + 'static) {
        // A full channel only drains if this thread is not the one draining it.
        let sent = if queue.is_current() {
            queue.send(task)
        } else {
            queue.send_blocking(task)
        };
        match sent {
            Ok(()) => {}
            Err(QueueError::Stopped) => {
                tracing::warn!(target: "tabula::controller", "prepare queue stopped, dropping generation");
            }
            Err(err) => {
                tracing::error!(target: "tabula::controller", %err, "failed to schedule preparation");
            }
        }
    }

    fn prepare(self: &Arc<Self>, preparation: Preparation<E>) {
        if self.lifetime.check().is_err() {
            tracing::trace!(target: "tabula::controller", generation = preparation.generation, "preparation cancelled");
            return;
        }

        let first = preparation.generation == 0;
        let ctx = self.config.viewport;

        if first && self.config.make_first_fast && preparation.previous.is_empty() {
            self.prepare_first_fast(preparation.next, ctx);
            return;
        }

        let transition = reconcile_with(
            preparation.previous.as_slice(),
            preparation.next.as_slice(),
            &ctx,
            &self.arguments,
        );
        if transition.is_empty() && !first {
            tracing::trace!(
                target: "tabula::controller",
                generation = preparation.generation,
                "generation produced no changes"
            );
            return;
        }

        tracing::debug!(
            target: "tabula::controller",
            generation = preparation.generation,
            summary = %transition,
            "prepared transition"
        );
        self.post(self.present(transition, first));
    }

    /// Split the initial load into a viewport-sized head and a tail.
    fn prepare_first_fast(self: &Arc<Self>, next: Arc<Vec<E>>, ctx: RowContext) {
        let _span = PerfSpan::new("first_fast_head");

        let mut filled = 0.0f32;
        let mut head = Vec::new();
        for (index, entry) in next.iter().enumerate() {
            let row = entry.make_row(&ctx, &self.arguments);
            filled += row.height();
            head.push((index, row));
            if filled > ctx.height {
                break;
            }
        }
        let head_len = head.len();
        tracing::debug!(
            target: "tabula::controller",
            head = head_len,
            total = next.len(),
            "prepared first-fast head"
        );
        self.post(self.present(Transition::new(Vec::new(), head, Vec::new()), true));

        if head_len == next.len() {
            return;
        }

        let weak = Arc::downgrade(self);
        let tail = move || {
            let Some(shared) = weak.upgrade() else { return };
            if shared.lifetime.is_cancelled() {
                return;
            }
            let inserted: Vec<_> = next
                .iter()
                .enumerate()
                .skip(head_len)
                .map(|(index, entry)| (index, entry.make_row(&ctx, &shared.arguments)))
                .collect();
            let transition = shared
                .present(Transition::new(Vec::new(), inserted, Vec::new()), true)
                .with_part_of_transition(true);
            shared.post(transition);
        };

        // The tail must be queued before any later generation. From the
        // prepare queue's own thread that only holds if it runs now.
        match &self.prepare_queue {
            Some(queue) if !queue.is_current() => self.schedule(queue, tail),
            _ => tail(),
        }
    }

    fn present(&self, transition: Transition<E::Row>, first: bool) -> Transition<E::Row> {
        transition
            .with_animated(self.config.animated && !first)
            .with_grouping(self.config.grouping)
            .with_animate_visible_only(self.config.animate_visible_only())
    }

    fn post(self: &Arc<Self>, transition: Transition<E::Row>) {
        if self.lifetime.is_cancelled() {
            return;
        }
        let weak = Arc::downgrade(self);
        self.main_queue.post(move || {
            if let Some(shared) = weak.upgrade() {
                shared.apply(transition);
            }
        });
    }

    /// Runs on the main queue's thread.
    fn apply(&self, transition: Transition<E::Row>) {
        if self.lifetime.is_cancelled() {
            tracing::trace!(target: "tabula::controller", "controller disposed, dropping transition");
            return;
        }

        let id = transition.id();
        self.signals.before_transaction.emit(id);

        let outcome = self.list.lock().apply(transition);
        match outcome {
            Ok(ApplyOutcome::Applied { .. }) => {
                self.signals.transition_applied.emit(id);
                self.signals.after_transaction.emit(id);
                if !self.did_set_ready.swap(true, Ordering::SeqCst) {
                    tracing::debug!(target: "tabula::controller", "list ready");
                    self.signals.ready.emit(());
                    if let Some(on_load) = &self.on_load {
                        let list = self.list.lock();
                        on_load(list.rows());
                    }
                }
            }
            Ok(ApplyOutcome::AlreadyApplied) => {}
            Err(err) => {
                tracing::error!(target: "tabula::controller", %err, "transition does not fit the live list");
            }
        }
    }
}

/// Builder for [`ListController`].
pub struct ListControllerBuilder<S, E: Entry> {
    state: Arc<StateContainer<S>>,
    arguments: E::Arguments,
    projection: Projection<S, E>,
    config: ListConfig,
    main_queue: Option<MainQueue>,
    prepare_queue: Option<Arc<SerialQueue>>,
    on_load: Option<LoadHook<E::Row>>,
    pub(crate) data_hooks: DataHooks,
}

impl<S, E> ListControllerBuilder<S, E>
where
    S: Clone + PartialEq + Send + 'static,
    E: Entry + Send + Sync + 'static,
    E::Row: RowModel + Send + 'static,
    E::Arguments: Send + Sync + 'static,
{
    /// Use `config` instead of the defaults.
    pub fn config(mut self, config: ListConfig) -> Self {
        self.config = config;
        self
    }

    /// Apply transitions on `queue`. Defaults to a queue owned by the
    /// thread calling [`build`](Self::build).
    pub fn main_queue(mut self, queue: MainQueue) -> Self {
        self.main_queue = Some(queue);
        self
    }

    /// Reconcile generations after the first on `queue`, and the first too
    /// when [`ListConfig::prepare_off_main`] is set.
    pub fn prepare_queue(mut self, queue: Arc<SerialQueue>) -> Self {
        self.prepare_queue = Some(queue);
        self
    }

    /// Call `hook` with the rows once the first transition was applied.
    pub fn on_load<F>(mut self, hook: F) -> Self
    where
        F: Fn(&[E::Row]) + Send + Sync + 'static,
    {
        self.on_load = Some(Arc::new(hook));
        self
    }

    /// Validate the configuration, subscribe to the state and prepare the
    /// first generation from the current state.
    pub fn build(self) -> Result<ListController<S, E>> {
        self.config.validate()?;

        let main_queue = self.main_queue.unwrap_or_default();
        let lifetime = CancellationToken::new();
        let shared = Arc::new(Shared {
            state: self.state,
            projection: self.projection,
            arguments: self.arguments,
            config: self.config,
            list: Arc::new(Mutex::new(LiveList::with_affinity(main_queue.affinity()))),
            main_queue,
            prepare_queue: self.prepare_queue,
            previous: Mutex::new(Arc::new(Vec::new())),
            generation: AtomicU64::new(0),
            signals: ControllerSignals::default(),
            did_set_ready: AtomicBool::new(false),
            on_load: self.on_load,
            data_hooks: self.data_hooks,
            lifetime: lifetime.clone(),
        });

        let disposables = DisposableBag::new();
        disposables.add(lifetime);

        let weak: Weak<Shared<S, E>> = Arc::downgrade(&shared);
        let pipeline = MetaDisposable::new();
        pipeline.set(shared.state.observe(move |state| {
            if let Some(shared) = weak.upgrade() {
                shared.on_state(state);
            }
        }));
        disposables.add(pipeline);

        let weak = Arc::downgrade(&shared);
        disposables.add(ActionDisposable::new(move || {
            if let Some(shared) = weak.upgrade() {
                *shared.previous.lock() = Arc::new(Vec::new());
            }
        }));

        tracing::debug!(
            target: "tabula::controller",
            prepare_queue = shared.prepare_queue.is_some(),
            first_fast = shared.config.make_first_fast,
            "controller built"
        );

        Ok(ListController {
            shared,
            disposables,
        })
    }
}

static_assertions::assert_impl_all!(ControllerSignals: Send, Sync);
