//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies.
//!
//! 2. When any dependency changes, the effect is queued and re-runs before
//!    the write returns.
//!
//! 3. Before re-running, the effect drops its old dependencies, disposes
//!    anything it created last run, and runs the cleanups registered with
//!    [`on_cleanup`](super::on_cleanup) during that run.
//!
//! # Computeds
//!
//! A computed is an effect that the flush runs before ordinary effects. Use
//! it to keep derived state in sync before anything observes it.
//!
//! # Thread Safety
//!
//! Handles are `Send + Sync`, but an effect is driven by whichever thread
//! writes its dependencies. A notification that arrives while the effect
//! is running on another thread is dropped, not queued.

use std::fmt::Debug;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::computation::Computation;
use super::owner::RootId;
use super::runtime::{batch, Kind, Reactive};
use super::subscriber::SubscriberId;

type RunFn = Box<dyn FnMut() + Send>;

/// A side-effecting computation that runs when dependencies change.
///
/// # Example
///
/// ```rust,ignore
/// let count = Signal::new(0);
///
/// let effect = Effect::new(move || {
///     println!("Count is: {}", count.get());
/// });
///
/// count.set(5);  // Prints: "Count is: 5"
/// ```
pub struct Effect {
    inner: Arc<EffectInner>,
}

struct EffectInner {
    computation: Computation,
    run: Mutex<RunFn>,
    kind: Kind,
    this: Weak<EffectInner>,
}

impl Effect {
    /// Create a new effect with the given function.
    ///
    /// The function runs immediately to establish dependencies. Writes it
    /// makes during that first run are flushed once it returns.
    pub fn new<F>(run: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let effect = Self::build(Kind::Effect, Box::new(run));
        batch(|| effect.execute());
        effect
    }

    /// Create an effect threading a value from one run to the next.
    ///
    /// The first run receives `initial`; each later run receives what the
    /// previous one returned.
    pub fn with_value<T, F>(initial: T, f: F) -> Self
    where
        T: Send + 'static,
        F: FnMut(T) -> T + Send + 'static,
    {
        Self::new(thread_value(initial, f))
    }

    /// Create a computed: an effect that flushes ahead of effects.
    pub fn computed<F>(run: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let effect = Self::build(Kind::Computed, Box::new(run));
        batch(|| effect.execute());
        effect
    }

    /// [`Effect::computed`] threading a value between runs.
    pub fn computed_with_value<T, F>(initial: T, f: F) -> Self
    where
        T: Send + 'static,
        F: FnMut(T) -> T + Send + 'static,
    {
        Self::computed(thread_value(initial, f))
    }

    /// Create a new effect without running it immediately.
    ///
    /// It has no dependencies until [`Effect::execute`] is called.
    pub fn new_lazy<F>(run: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        Self::build(Kind::Effect, Box::new(run))
    }

    fn build(kind: Kind, run: RunFn) -> Self {
        let inner = Arc::new_cyclic(|this| EffectInner {
            computation: Computation::new(),
            run: Mutex::new(run),
            kind,
            this: this.clone(),
        });
        Computation::attach(inner.clone());

        Self { inner }
    }

    /// Get the subscriber ID for this effect.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.computation.id()
    }

    /// Whether this is an effect or a computed.
    pub fn kind(&self) -> Kind {
        self.inner.kind
    }

    pub fn root_id(&self) -> Option<RootId> {
        self.inner.computation.root_id()
    }

    /// Execute the effect function.
    ///
    /// This runs the function within a reactive context to track dependencies.
    pub fn execute(&self) {
        self.inner.execute();
    }

    /// Dispose of the effect.
    ///
    /// After disposal, the effect will not run again.
    pub fn dispose(&self) {
        self.inner.computation.dispose();
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.computation.is_disposed()
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.inner.computation.run_count()
    }

    /// Get the number of dependencies.
    pub fn dependency_count(&self) -> usize {
        self.inner.computation.dependency_count()
    }
}

fn thread_value<T, F>(initial: T, mut f: F) -> impl FnMut() + Send + 'static
where
    T: Send + 'static,
    F: FnMut(T) -> T + Send + 'static,
{
    let mut value = Some(initial);
    move || {
        if let Some(previous) = value.take() {
            value = Some(f(previous));
        }
    }
}

impl EffectInner {
    fn execute(&self) {
        if self.computation.is_disposed() {
            return;
        }

        // A write inside the run can queue this effect again; the flush
        // reaches it after this run finishes.
        let Some(mut run) = self.run.try_lock() else {
            tracing::debug!(subscriber = %self.computation.id(), "effect already running");
            return;
        };

        let observer: Weak<dyn Reactive> = self.this.clone();
        self.computation.run(observer, || run());
    }
}

impl Reactive for EffectInner {
    fn subscriber_id(&self) -> SubscriberId {
        self.computation.id()
    }

    fn kind(&self) -> Kind {
        self.kind
    }

    fn mark_dirty(&self) {}

    fn schedule(&self) {
        self.execute();
    }

    fn dispose(&self) {
        self.computation.dispose();
    }
}

impl Clone for Effect {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.subscriber_id())
            .field("kind", &self.kind())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{create_root, on_cleanup, Signal};
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn effect_runs_on_creation() {
        let run_count = Arc::new(AtomicI32::new(0));
        let run_count_clone = run_count.clone();

        create_root(|_| {
            Effect::new(move || {
                run_count_clone.fetch_add(1, Ordering::SeqCst);
            });
        });

        // Effect should have run once on creation
        assert_eq!(run_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn effect_lazy_does_not_run_on_creation() {
        let run_count = Arc::new(AtomicI32::new(0));
        let run_count_clone = run_count.clone();

        let (_root, effect) = create_root(|dispose| {
            let effect = Effect::new_lazy(move || {
                run_count_clone.fetch_add(1, Ordering::SeqCst);
            });
            (dispose, effect)
        });

        assert_eq!(run_count.load(Ordering::SeqCst), 0);
        assert_eq!(effect.run_count(), 0);

        // Manually execute
        effect.execute();
        assert_eq!(run_count.load(Ordering::SeqCst), 1);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn effect_does_not_run_after_disposal() {
        let signal = Signal::new(0);
        let run_count = Arc::new(AtomicI32::new(0));

        let (_root, effect) = create_root(|dispose| {
            let signal = signal.clone();
            let run_count = run_count.clone();
            let effect = Effect::new(move || {
                signal.get();
                run_count.fetch_add(1, Ordering::SeqCst);
            });
            (dispose, effect)
        });

        signal.set(1);
        assert_eq!(run_count.load(Ordering::SeqCst), 2);

        effect.dispose();
        assert!(effect.is_disposed());
        assert_eq!(signal.subscriber_count(), 0);

        signal.set(2);
        effect.execute();
        assert_eq!(run_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn dropping_the_root_disposes_its_effects() {
        let signal = Signal::new(0);
        let run_count = Arc::new(AtomicI32::new(0));

        let effect = create_root(|_| {
            let signal = signal.clone();
            let run_count = run_count.clone();
            Effect::new(move || {
                signal.get();
                run_count.fetch_add(1, Ordering::SeqCst);
            })
        });

        assert!(effect.is_disposed());
        signal.set(1);
        assert_eq!(run_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dependencies_are_rebuilt_each_run() {
        let toggle = Signal::new(true);
        let a = Signal::new(0);
        let b = Signal::new(0);
        let run_count = Arc::new(AtomicI32::new(0));

        let (_root, effect) = create_root(|dispose| {
            let (toggle, a, b) = (toggle.clone(), a.clone(), b.clone());
            let run_count = run_count.clone();
            let effect = Effect::new(move || {
                run_count.fetch_add(1, Ordering::SeqCst);
                if toggle.get() {
                    a.get();
                } else {
                    b.get();
                }
            });
            (dispose, effect)
        });
        assert_eq!(effect.dependency_count(), 2);

        toggle.set(false);
        assert_eq!(run_count.load(Ordering::SeqCst), 2);

        // No longer read
        a.set(1);
        assert_eq!(run_count.load(Ordering::SeqCst), 2);

        b.set(1);
        assert_eq!(run_count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn panicked_run_does_not_keep_its_reads() {
        let failing = Signal::new(false);
        let a = Signal::new(0);
        let b = Signal::new(0);
        let run_count = Arc::new(AtomicI32::new(0));

        let (_root, effect) = create_root(|dispose| {
            let (failing, a, b) = (failing.clone(), a.clone(), b.clone());
            let run_count = run_count.clone();
            let effect = Effect::new(move || {
                run_count.fetch_add(1, Ordering::SeqCst);
                if failing.get() {
                    a.get();
                    panic!("effect failed");
                }
                b.get();
            });
            (dispose, effect)
        });

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| failing.set(true)));
        assert!(result.is_err());
        assert_eq!(run_count.load(Ordering::SeqCst), 2);
        assert_eq!(a.subscriber_count(), 0);

        // Nothing is subscribed after the failed run, so recover by hand.
        failing.set(false);
        effect.execute();
        assert_eq!(run_count.load(Ordering::SeqCst), 3);

        a.set(5);
        assert_eq!(run_count.load(Ordering::SeqCst), 3);
        assert_eq!(a.subscriber_count(), 0);

        b.set(1);
        assert_eq!(run_count.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn notification_from_another_thread_is_dropped_while_running() {
        use std::sync::mpsc;

        let signal = Signal::new(0);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (running_tx, running_rx) = mpsc::channel::<()>();
        let (resume_tx, resume_rx) = mpsc::channel::<()>();

        let (_root, effect) = create_root(|dispose| {
            let (signal, seen) = (signal.clone(), seen.clone());
            let effect = Effect::new(move || {
                let value = signal.get();
                seen.lock().push(value);
                if value == 1 {
                    let _ = running_tx.send(());
                    let _ = resume_rx.recv();
                }
            });
            (dispose, effect)
        });

        std::thread::scope(|scope| {
            let writer = signal.clone();
            scope.spawn(move || writer.set(1));
            running_rx.recv().unwrap();
            signal.set(2);
            resume_tx.send(()).unwrap();
        });

        assert_eq!(*seen.lock(), vec![0, 1]);
        assert_eq!(effect.run_count(), 2);
        assert_eq!(signal.get(), 2);
    }

    #[test]
    fn cleanups_and_children_are_released_before_rerun() {
        let signal = Signal::new(0);
        let log = Arc::new(Mutex::new(Vec::new()));

        let dispose = create_root(|dispose| {
            let signal = signal.clone();
            let log = log.clone();
            Effect::new(move || {
                let value = signal.get();
                let log_inner = log.clone();
                log.lock().push(format!("run {value}"));
                on_cleanup(move || log_inner.lock().push(format!("cleanup {value}")));
            });
            dispose
        });

        signal.set(1);
        dispose.dispose();

        assert_eq!(
            *log.lock(),
            vec!["run 0", "cleanup 0", "run 1", "cleanup 1"]
        );
    }

    #[test]
    fn nested_effects_are_disposed_when_the_parent_reruns() {
        let outer = Signal::new(0);
        let inner = Signal::new(0);
        let inner_runs = Arc::new(AtomicI32::new(0));

        let _root = create_root(|dispose| {
            let (outer, inner, inner_runs) = (outer.clone(), inner.clone(), inner_runs.clone());
            Effect::new(move || {
                outer.get();
                let (inner, inner_runs) = (inner.clone(), inner_runs.clone());
                Effect::new(move || {
                    inner.get();
                    inner_runs.fetch_add(1, Ordering::SeqCst);
                });
            });
            dispose
        });
        assert_eq!(inner_runs.load(Ordering::SeqCst), 1);

        // Re-running the parent replaces the child rather than adding one
        outer.set(1);
        assert_eq!(inner_runs.load(Ordering::SeqCst), 2);

        inner.set(1);
        assert_eq!(inner_runs.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn computed_runs_before_effects() {
        let source = Signal::new(1);
        let mirrored = Signal::new(1);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let _root = create_root(|dispose| {
            let (source_e, mirrored_e, seen) = (source.clone(), mirrored.clone(), seen.clone());
            Effect::new(move || {
                source_e.get();
                seen.lock().push(mirrored_e.get());
            });

            let (source_c, mirrored_c) = (source.clone(), mirrored.clone());
            let computed = Effect::computed(move || mirrored_c.set(source_c.get()));
            assert_eq!(computed.kind(), Kind::Computed);
            dispose
        });

        source.set(7);
        // The effect saw the mirrored value already updated
        assert_eq!(seen.lock().last().copied(), Some(7));
    }

    #[test]
    fn with_value_threads_previous_result() {
        let signal = Signal::new(1);
        let totals = Arc::new(Mutex::new(Vec::new()));

        let _root = create_root(|dispose| {
            let (signal, totals) = (signal.clone(), totals.clone());
            Effect::with_value(0, move |total| {
                let next = total + signal.get();
                totals.lock().push(next);
                next
            });
            dispose
        });

        signal.set(2);
        signal.set(3);
        assert_eq!(*totals.lock(), vec![1, 3, 6]);
    }

    #[test]
    fn write_during_first_run_is_flushed_after_it() {
        let signal = Signal::new(0);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let _root = create_root(|dispose| {
            let (signal, seen) = (signal.clone(), seen.clone());
            Effect::new(move || {
                let value = signal.get();
                seen.lock().push(value);
                if value == 0 {
                    signal.set(1);
                }
            });
            dispose
        });

        assert_eq!(*seen.lock(), vec![0, 1]);
    }

    #[test]
    fn effect_clone_shares_state() {
        let (_root, effect1) = create_root(|dispose| (dispose, Effect::new(|| {})));
        let effect2 = effect1.clone();

        assert_eq!(effect1.subscriber_id(), effect2.subscriber_id());
        assert_eq!(effect1.run_count(), 1);

        effect1.execute();
        assert_eq!(effect2.run_count(), 2);

        effect1.dispose();
        assert!(effect2.is_disposed());
    }
}
