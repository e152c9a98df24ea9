//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects sources and
//! computations. It owns the queue of pending eager computations and decides
//! when they run.
//!
//! # How It Works
//!
//! 1. When a source changes, it marks its subscribers dirty and queues the
//!    eager ones (memos, computeds, effects, reactions).
//!
//! 2. Unless a batch is open or a flush is already in progress, the writer
//!    flushes the queue before returning. Propagation is synchronous.
//!
//! 3. The queue is drained in priority order: memos first, then computeds,
//!    then effects and reactions. Within a priority, queue order is
//!    preserved. A computation queued twice runs once.
//!
//! 4. A panic that escapes the outermost batch or a flush discards whatever
//!    is still queued. Those computations run again on their next
//!    dependency change; memos also recompute on their next read.
//!
//! # Thread Safety
//!
//! Scheduling state is thread-local. Nodes are `Send + Sync` so they can be
//! stored anywhere, but propagation always happens on the writing thread.
//! One graph is meant to be driven from one thread at a time: a computation
//! that is notified while it runs on another thread skips that re-run.

use std::cell::{Cell, RefCell};
use std::sync::Arc;

use indexmap::IndexMap;

use super::context::ReactiveContext;
use super::subscriber::SubscriberId;

/// What kind of computation a reactive node is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Memo,
    Computed,
    Effect,
    Reaction,
}

impl Kind {
    /// Lower runs first when the queue is flushed.
    fn priority(self) -> u8 {
        match self {
            Kind::Memo => 0,
            Kind::Computed => 1,
            Kind::Effect | Kind::Reaction => 2,
        }
    }
}

/// A trait for computations that can be notified when dependencies change.
pub trait Reactive: Send + Sync {
    /// Get the subscriber ID for this computation.
    fn subscriber_id(&self) -> SubscriberId;

    /// The kind of computation, which decides its flush priority.
    fn kind(&self) -> Kind;

    /// Mark this computation as needing an update.
    fn mark_dirty(&self);

    /// Bring this computation up to date. Called by the flush loop.
    fn schedule(&self);

    /// Stop this computation permanently and release what it owns.
    fn dispose(&self);

    /// Whether this computation is queued when a dependency changes.
    fn is_eager(&self) -> bool {
        true
    }
}

thread_local! {
    static QUEUE: RefCell<IndexMap<SubscriberId, Arc<dyn Reactive>>> = RefCell::new(IndexMap::new());
    static BATCH_DEPTH: Cell<u32> = const { Cell::new(0) };
    static FLUSHING: Cell<bool> = const { Cell::new(false) };
    /// Computations created outside any owner. Kept alive until disposed.
    static DETACHED: RefCell<IndexMap<SubscriberId, Arc<dyn Reactive>>> = RefCell::new(IndexMap::new());
}

/// The reactive runtime.
pub struct Runtime;

impl Runtime {
    /// Queue an eager computation for the next flush.
    pub fn enqueue(reactive: Arc<dyn Reactive>) {
        QUEUE.with(|queue| {
            queue
                .borrow_mut()
                .entry(reactive.subscriber_id())
                .or_insert(reactive);
        });
    }

    /// Run queued computations until the queue is empty.
    ///
    /// No-op inside a batch or when a flush is already running further up
    /// the stack; that flush picks up whatever is queued now.
    pub fn flush() {
        if Self::is_batching() || FLUSHING.with(Cell::get) {
            return;
        }

        let _flushing = FlushGuard::enter();
        let mut ran = 0usize;
        while let Some(next) = Self::next_pending() {
            next.schedule();
            ran += 1;
        }

        if ran > 0 {
            tracing::trace!(ran, "flushed reactive queue");
        }
    }

    fn next_pending() -> Option<Arc<dyn Reactive>> {
        QUEUE.with(|queue| {
            let mut queue = queue.borrow_mut();
            let index = queue
                .values()
                .enumerate()
                .min_by_key(|(index, reactive)| (reactive.kind().priority(), *index))
                .map(|(index, _)| index)?;
            queue.shift_remove_index(index).map(|(_, reactive)| reactive)
        })
    }

    /// Drop everything queued without running it.
    ///
    /// Left to the running flush if there is one further up the stack.
    fn discard_pending() {
        if FLUSHING.with(Cell::get) {
            return;
        }
        let discarded = QUEUE.with(|queue| std::mem::take(&mut *queue.borrow_mut()));
        if !discarded.is_empty() {
            tracing::debug!(discarded = discarded.len(), "discarded queue after a panic");
        }
    }

    /// Number of computations waiting for a flush.
    pub fn pending_count() -> usize {
        QUEUE.with(|queue| queue.borrow().len())
    }

    /// Check if a batch is open on this thread.
    pub fn is_batching() -> bool {
        BATCH_DEPTH.with(Cell::get) > 0
    }

    /// Keep an unowned computation alive until it is disposed.
    pub(crate) fn retain_detached(reactive: Arc<dyn Reactive>) {
        tracing::warn!(
            subscriber = %reactive.subscriber_id(),
            kind = ?reactive.kind(),
            "computation created outside a root; it lives until disposed explicitly"
        );
        DETACHED.with(|detached| {
            detached
                .borrow_mut()
                .insert(reactive.subscriber_id(), reactive);
        });
    }

    pub(crate) fn release_detached(id: SubscriberId) {
        // Take the node out before dropping it; its drop may touch DETACHED.
        // `try_with` because disposal also runs while thread locals unwind.
        let released = DETACHED
            .try_with(|detached| detached.try_borrow_mut().ok()?.shift_remove(&id))
            .ok()
            .flatten();
        drop(released);
    }

    /// Get the current subscriber being tracked, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        ReactiveContext::current_subscriber()
    }

    /// Check if we're inside a tracking context.
    pub fn is_tracking() -> bool {
        ReactiveContext::is_active()
    }
}

struct FlushGuard;

impl FlushGuard {
    fn enter() -> Self {
        FLUSHING.with(|flushing| flushing.set(true));
        Self
    }
}

impl Drop for FlushGuard {
    fn drop(&mut self) {
        FLUSHING.with(|flushing| flushing.set(false));
        if std::thread::panicking() {
            Runtime::discard_pending();
        }
    }
}

struct BatchGuard;

impl Drop for BatchGuard {
    fn drop(&mut self) {
        let depth = BATCH_DEPTH.with(|depth| {
            let next = depth.get().saturating_sub(1);
            depth.set(next);
            next
        });
        if depth > 0 {
            return;
        }
        if std::thread::panicking() {
            Runtime::discard_pending();
        } else {
            Runtime::flush();
        }
    }
}

/// Group writes so dependents run once, after the outermost batch exits.
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    BATCH_DEPTH.with(|depth| depth.set(depth.get() + 1));
    let _batch = BatchGuard;
    f()
}

/// Run `f` without tracking any reads it performs.
pub fn untrack<R>(f: impl FnOnce() -> R) -> R {
    let _ctx = ReactiveContext::untracked();
    f()
}
