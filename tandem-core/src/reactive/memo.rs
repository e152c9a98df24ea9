//! Memo Implementation
//!
//! A Memo is a cached derived value that re-evaluates only when its
//! dependencies change.
//!
//! # How Memos Work
//!
//! 1. A memo does nothing until first read. The first read runs the
//!    computation and caches the result.
//!
//! 2. When accessed again, if no dependencies have changed, returns cached value.
//!
//! 3. When a dependency changes, the memo is marked dirty and queued ahead of
//!    every effect.
//!
//! 4. The queued memo recomputes. Only if the new value differs from the old
//!    one (by `PartialEq`, or the configured equality) are its own dependents
//!    marked. Effects downstream of an unchanged memo do not re-run.
//!
//! A dirty memo read before the queue reaches it recomputes on the spot, so
//! readers never observe a stale value.
//!
//! # Thread Safety
//!
//! The cached value and dirty state are behind locks; the computation itself
//! runs with no lock on the value held. A memo that reads itself while
//! computing is a cycle and panics.

use std::fmt::Debug;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use super::computation::Computation;
use super::owner::RootId;
use super::runtime::{untrack, Kind, Reactive};
use super::source::{Equals, Name, SourceNode};
use super::subscriber::{SourceId, SubscriberId};

/// Dirty state for a memo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoState {
    /// The cached value is up-to-date.
    Clean,

    /// The memo must recompute before its value is used.
    Dirty,
}

/// Options accepted by [`Memo::with_options`].
pub struct MemoOptions<T> {
    pub name: Option<Name>,
    /// Replaces the `PartialEq` comparison used to decide whether dependents
    /// are notified.
    pub equals: Option<Equals<T>>,
}

impl<T> MemoOptions<T> {
    pub fn named(name: impl Into<Name>) -> Self {
        Self {
            name: Some(name.into()),
            equals: None,
        }
    }

    pub fn with_equals(mut self, equals: impl Fn(&T, &T) -> bool + Send + Sync + 'static) -> Self {
        self.equals = Some(Arc::new(equals));
        self
    }
}

impl<T: 'static> MemoOptions<T> {
    /// Notify dependents after every recomputation.
    pub fn always_notify(self) -> Self {
        self.with_equals(|_: &T, _: &T| false)
    }
}

impl<T> Default for MemoOptions<T> {
    fn default() -> Self {
        Self {
            name: None,
            equals: None,
        }
    }
}

type ComputeFn<T> = Box<dyn FnMut(Option<T>) -> T + Send>;

/// A cached derived value that recomputes only when dependencies change.
///
/// The PartialEq bound is needed to detect when the computed value actually
/// changed (some memos return the same value even if inputs changed).
pub struct Memo<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    inner: Arc<MemoInner<T>>,
}

struct MemoInner<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    /// Readers of this memo subscribe here.
    node: Arc<SourceNode>,
    computation: Computation,
    compute: Mutex<ComputeFn<T>>,
    /// The cached value (None if never computed).
    value: RwLock<Option<T>>,
    state: Mutex<MemoState>,
    equals: Option<Equals<T>>,
    this: Weak<MemoInner<T>>,
}

impl<T> Memo<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    /// Create a new memo with the given computation function.
    ///
    /// The computation is not run immediately. It runs on first access.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + Send + 'static,
    {
        Self::with_options(move |_| compute(), MemoOptions::default())
    }

    /// Create a memo whose computation receives its previous value.
    pub fn with_options<F>(compute: F, options: MemoOptions<T>) -> Self
    where
        F: FnMut(Option<T>) -> T + Send + 'static,
    {
        let inner = Arc::new_cyclic(|this| MemoInner {
            node: SourceNode::new(options.name),
            computation: Computation::new(),
            compute: Mutex::new(Box::new(compute)),
            value: RwLock::new(None),
            state: Mutex::new(MemoState::Dirty),
            equals: options.equals,
            this: this.clone(),
        });
        Computation::attach(inner.clone());

        Self { inner }
    }

    /// Get the memo's unique ID as a source.
    pub fn id(&self) -> SourceId {
        self.inner.node.id()
    }

    /// Get the subscriber ID for this memo.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.computation.id()
    }

    /// The root that owns this memo, if it was created under one.
    pub fn root_id(&self) -> Option<RootId> {
        self.inner.computation.root_id()
    }

    /// Get the current value, recomputing if necessary.
    ///
    /// This is the main entry point for reading a memo's value.
    pub fn get(&self) -> T {
        self.with(T::clone)
    }

    /// Read the current value by reference.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.inner.refresh();
        self.inner.node.track();

        let value = self.inner.value.read();
        f(value.as_ref().expect("memo should have a value after refresh"))
    }

    /// Get the current dirty state.
    pub fn state(&self) -> MemoState {
        *self.inner.state.lock()
    }

    /// Get the number of computations reading this memo.
    pub fn dependent_count(&self) -> usize {
        self.inner.node.subscriber_count()
    }

    /// Number of sources read during the last computation.
    pub fn dependency_count(&self) -> usize {
        self.inner.computation.dependency_count()
    }

    /// Number of times the computation has run.
    pub fn run_count(&self) -> usize {
        self.inner.computation.run_count()
    }

    /// Check if the memo has a cached value.
    pub fn has_value(&self) -> bool {
        self.inner.value.read().is_some()
    }

    /// Stop tracking. The memo keeps returning its last value.
    pub fn dispose(&self) {
        self.inner.computation.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.computation.is_disposed()
    }
}

impl<T> MemoInner<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    fn is_equal(&self, previous: &T, next: &T) -> bool {
        match &self.equals {
            Some(equals) => equals(previous, next),
            None => previous == next,
        }
    }

    /// Make sure the cached value is current.
    fn refresh(&self) {
        if self.computation.is_disposed() {
            if self.value.read().is_none() {
                let mut compute = self.compute.lock();
                let value = untrack(|| compute(None));
                *self.value.write() = Some(value);
            }
            return;
        }

        if *self.state.lock() == MemoState::Dirty && self.recompute() {
            self.node.mark_subscribers();
        }
    }

    /// Run the computation. Returns whether an existing value changed.
    fn recompute(&self) -> bool {
        let Some(mut compute) = self.compute.try_lock() else {
            panic!("memo {} read itself while computing", self.node.id());
        };

        // Clean before running so a write during the run re-dirties it.
        *self.state.lock() = MemoState::Clean;

        let previous = self.value.read().clone();
        let observer: Weak<dyn Reactive> = self.this.clone();
        let next = self
            .computation
            .run(observer, || compute(previous.clone()));
        drop(compute);

        let changed = previous
            .as_ref()
            .is_some_and(|previous| !self.is_equal(previous, &next));
        *self.value.write() = Some(next);
        changed
    }
}

impl<T> Reactive for MemoInner<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    fn subscriber_id(&self) -> SubscriberId {
        self.computation.id()
    }

    fn kind(&self) -> Kind {
        Kind::Memo
    }

    fn mark_dirty(&self) {
        *self.state.lock() = MemoState::Dirty;
    }

    fn schedule(&self) {
        if self.computation.is_disposed() || *self.state.lock() == MemoState::Clean {
            return;
        }
        if self.recompute() {
            self.node.mark_subscribers();
        }
    }

    fn dispose(&self) {
        self.computation.dispose();
    }
}

impl<T> Clone for Memo<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> PartialEq for Memo<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> Debug for Memo<T>
where
    T: Clone + Send + Sync + PartialEq + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memo")
            .field("id", &self.id())
            .field("state", &self.state())
            .field("has_value", &self.has_value())
            .field("dependent_count", &self.dependent_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{batch, create_root, Effect, Signal};
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn memo_computes_on_first_access() {
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();

        let memo = Memo::new(move || {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
            42
        });

        // Not computed yet
        assert!(!memo.has_value());
        assert_eq!(call_count.load(Ordering::SeqCst), 0);

        // First access triggers computation
        assert_eq!(memo.get(), 42);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        assert!(memo.has_value());

        // Later accesses use the cache
        assert_eq!(memo.get(), 42);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn memo_recomputes_when_a_dependency_changes() {
        let signal = Signal::new(10);
        let signal_clone = signal.clone();
        let memo = Memo::new(move || signal_clone.get() * 2);

        assert_eq!(memo.get(), 20);
        assert_eq!(memo.dependency_count(), 1);

        signal.set(5);
        assert_eq!(memo.get(), 10);
        assert_eq!(memo.run_count(), 2);
    }

    #[test]
    fn memo_state_transitions() {
        let signal = Signal::new(1);
        let signal_clone = signal.clone();
        let memo = Memo::new(move || signal_clone.get());

        // Starts dirty
        assert_eq!(memo.state(), MemoState::Dirty);

        memo.get();
        assert_eq!(memo.state(), MemoState::Clean);

        batch(|| {
            signal.set(2);
            assert_eq!(memo.state(), MemoState::Dirty);
        });

        // The flush at the end of the batch recomputed it
        assert_eq!(memo.state(), MemoState::Clean);
        assert_eq!(memo.get(), 2);
    }

    #[test]
    fn unchanged_memo_does_not_rerun_effects() {
        let signal = Signal::new(2);
        let runs = Arc::new(AtomicI32::new(0));

        let parity = {
            let signal = signal.clone();
            Memo::new(move || signal.get() % 2)
        };

        let _dispose = create_root(|dispose| {
            let parity = parity.clone();
            let runs = runs.clone();
            Effect::new(move || {
                parity.get();
                runs.fetch_add(1, Ordering::SeqCst);
            });
            dispose
        });
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        signal.set(4);
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        signal.set(5);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn always_notify_reruns_effects() {
        let signal = Signal::new(2);
        let runs = Arc::new(AtomicI32::new(0));

        let parity = {
            let signal = signal.clone();
            Memo::with_options(
                move |_| signal.get() % 2,
                MemoOptions::named("parity").always_notify(),
            )
        };

        let _dispose = create_root(|dispose| {
            let parity = parity.clone();
            let runs = runs.clone();
            Effect::new(move || {
                parity.get();
                runs.fetch_add(1, Ordering::SeqCst);
            });
            dispose
        });

        signal.set(4);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn diamond_runs_effect_once_with_consistent_values() {
        let signal = Signal::new(1);
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let doubled = {
            let signal = signal.clone();
            Memo::new(move || signal.get() * 2)
        };

        let _dispose = create_root(|dispose| {
            let signal = signal.clone();
            let doubled = doubled.clone();
            let seen = seen.clone();
            Effect::new(move || {
                seen.lock().push((signal.get(), doubled.get()));
            });
            dispose
        });

        signal.set(3);
        assert_eq!(*seen.lock(), vec![(1, 2), (3, 6)]);
    }

    #[test]
    fn computation_receives_previous_value() {
        let signal = Signal::new(1);
        let signal_clone = signal.clone();
        let running_total = Memo::with_options(
            move |previous: Option<i32>| previous.unwrap_or_default() + signal_clone.get(),
            MemoOptions::default(),
        );

        assert_eq!(running_total.get(), 1);
        signal.set(10);
        assert_eq!(running_total.get(), 11);
    }

    #[test]
    fn disposed_memo_keeps_last_value() {
        let signal = Signal::new(1);
        let signal_clone = signal.clone();
        let memo = Memo::new(move || signal_clone.get() + 1);

        assert_eq!(memo.get(), 2);
        memo.dispose();
        assert!(memo.is_disposed());
        assert_eq!(signal.subscriber_count(), 0);

        signal.set(10);
        assert_eq!(memo.get(), 2);
    }

    #[test]
    fn memo_clone_shares_state() {
        let memo1 = Memo::new(|| 42);
        assert_eq!(memo1.get(), 42);

        let memo2 = memo1.clone();
        assert_eq!(memo1.id(), memo2.id());
        assert!(memo2.has_value());
        assert_eq!(memo1, memo2);
    }
}
