//! Bridged primitives
//!
//! Each function here has one signature and two behaviours. Called in a
//! tracked scope, or with nothing rendering, it is the engine's own
//! constructor. Called while a component renders, it creates the primitive
//! on the first render, hands the same one back on every later render, and
//! disposes it when the component unmounts.
//!
//! Callbacks handed to the engine (effect, computed and memo bodies) are
//! wrapped with [`nest`](super::nest) in both cases, so bridged calls made
//! from inside them, on any later re-run, land in the tracked path.

use super::dispatch::Placement;
use super::mode::{nest, nest0};
use super::scope::scoped;
use crate::host::{use_memo, use_mount_effect};
use crate::reactive::{
    on_cleanup, Effect, Memo, MemoOptions, Mutable, Signal, SignalOptions, Store, StoreOptions,
};

pub use crate::reactive::{batch, untrack};

/// A signal, created once per component instance.
pub fn signal<T>(value: T) -> Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    signal_with_options(value, SignalOptions::default())
}

pub fn signal_with_options<T>(value: T, options: SignalOptions<T>) -> Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    let placement = Placement::current();
    placement.log_creation("signal");
    if placement.is_native() {
        return Signal::with_options(value, options);
    }
    use_memo(move || Signal::with_options(value, options))
}

/// A store, created once per component instance.
pub fn store<T>(value: T, options: StoreOptions) -> Store<T>
where
    T: Send + Sync + 'static,
{
    let placement = Placement::current();
    placement.log_creation("store");
    if placement.is_native() {
        return Store::with_options(value, options);
    }
    use_memo(move || Store::with_options(value, options))
}

/// A mutable store, created once per component instance.
pub fn mutable<T>(value: T, options: StoreOptions) -> Mutable<T>
where
    T: Send + Sync + 'static,
{
    let placement = Placement::current();
    placement.log_creation("mutable");
    if placement.is_native() {
        return Mutable::with_options(value, options);
    }
    use_memo(move || Mutable::with_options(value, options))
}

/// An effect. In a component it is created on the first render and lives
/// until unmount.
pub fn effect(f: impl FnMut() + Send + 'static) {
    let placement = Placement::current();
    placement.log_creation("effect");
    let run = nest0(f);
    if placement.is_native() {
        Effect::new(run);
        return;
    }
    scoped(move || {
        Effect::new(run);
    });
}

/// An effect threading a value from one run to the next.
pub fn effect_with<T, F>(initial: T, f: F)
where
    T: Send + 'static,
    F: FnMut(T) -> T + Send + 'static,
{
    let placement = Placement::current();
    placement.log_creation("effect");
    let run = nest(f);
    if placement.is_native() {
        Effect::with_value(initial, run);
        return;
    }
    scoped(move || {
        Effect::with_value(initial, run);
    });
}

/// Like [`effect`], but flushed before effects.
pub fn computed(f: impl FnMut() + Send + 'static) {
    let placement = Placement::current();
    placement.log_creation("computed");
    let run = nest0(f);
    if placement.is_native() {
        Effect::computed(run);
        return;
    }
    scoped(move || {
        Effect::computed(run);
    });
}

/// Like [`effect_with`], but flushed before effects.
pub fn computed_with<T, F>(initial: T, f: F)
where
    T: Send + 'static,
    F: FnMut(T) -> T + Send + 'static,
{
    let placement = Placement::current();
    placement.log_creation("computed");
    let run = nest(f);
    if placement.is_native() {
        Effect::computed_with_value(initial, run);
        return;
    }
    scoped(move || {
        Effect::computed_with_value(initial, run);
    });
}

/// A memo. In a component the same memo is returned on every render and
/// computes the first time it is read.
pub fn memo<T>(f: impl Fn() -> T + Send + 'static) -> Memo<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    memo_with_options(move |_| f(), MemoOptions::default())
}

/// A memo whose body receives its previous value.
pub fn memo_with_options<T, F>(f: F, options: MemoOptions<T>) -> Memo<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
    F: FnMut(Option<T>) -> T + Send + 'static,
{
    let placement = Placement::current();
    placement.log_creation("memo");
    let compute = nest(f);
    if placement.is_native() {
        return Memo::with_options(compute, options);
    }
    scoped(move || Memo::with_options(compute, options))
}

/// Run `f` when the surrounding scope ends: before the running computation
/// re-runs, or when the rendering component unmounts.
pub fn cleanup(f: impl FnOnce() + Send + 'static) {
    let placement = Placement::current();
    placement.log_creation("cleanup");
    if placement.is_native() {
        on_cleanup(f);
        return;
    }
    use_mount_effect(move || f);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::is_tracked;
    use crate::host::Host;
    use crate::reactive::create_root;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn signal_is_stable_across_renders() {
        let host = Host::new();
        let mounted = host.mount(|| signal(0)).unwrap();

        let first = mounted.output().unwrap();
        first.set(3);
        let second = mounted.render().unwrap();
        assert_eq!(first, second);
        assert_eq!(second.get(), 3);
    }

    #[test]
    fn store_and_mutable_are_stable_across_renders() {
        let host = Host::new();
        let mounted = host
            .mount(|| {
                (
                    store(vec![1], StoreOptions::named("items")),
                    mutable(0u8, StoreOptions::default()),
                )
            })
            .unwrap();

        let (items, counter) = mounted.output().unwrap();
        items.update(|items| items.push(2));
        *counter.write() += 1;

        let (items_again, counter_again) = mounted.render().unwrap();
        assert_eq!(items_again.get(), vec![1, 2]);
        assert_eq!(counter_again.get(), 1);
        assert_eq!(items.id(), items_again.id());
    }

    #[test]
    fn detached_primitives_are_native() {
        let count = signal(1);
        let doubled = memo({
            let count = count.clone();
            move || count.get() * 2
        });
        assert_eq!(doubled.get(), 2);
        count.set(4);
        assert_eq!(doubled.get(), 8);
    }

    #[test]
    fn effect_bodies_run_tracked() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let _root = create_root(|root| {
            let seen = seen.clone();
            effect(move || seen.lock().push(is_tracked()));
            root
        });
        assert_eq!(*seen.lock(), vec![true]);
        assert!(!is_tracked());
    }

    #[test]
    fn signals_created_inside_effects_belong_to_the_effect() {
        let host = Host::new();
        let trigger = Signal::new(0);
        let created = Arc::new(Mutex::new(Vec::new()));

        let trigger_clone = trigger.clone();
        let created_clone = created.clone();
        let mounted = host
            .mount(move || {
                let trigger = trigger_clone.clone();
                let created = created_clone.clone();
                effect(move || {
                    trigger.get();
                    // Tracked path: a fresh signal per run, no hook involved.
                    created.lock().push(signal(0).id());
                });
            })
            .unwrap();

        trigger.set(1);
        mounted.render().unwrap();
        let created = created.lock();
        assert_eq!(created.len(), 2);
        assert_ne!(created[0], created[1]);
    }

    #[test]
    fn component_effect_runs_until_unmount() {
        let host = Host::new();
        let count = Signal::new(0);
        let runs = Arc::new(AtomicUsize::new(0));

        let count_clone = count.clone();
        let runs_clone = runs.clone();
        let mounted = host
            .mount(move || {
                let count = count_clone.clone();
                let runs = runs_clone.clone();
                effect_with(0, move |total| {
                    runs.fetch_add(1, Ordering::SeqCst);
                    total + count.get()
                });
            })
            .unwrap();

        count.set(1);
        mounted.render().unwrap();
        count.set(2);
        assert_eq!(runs.load(Ordering::SeqCst), 3);

        mounted.unmount().unwrap();
        count.set(3);
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn computed_runs_before_effects() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let source = Signal::new(0);

        let _root = create_root(|root| {
            {
                let order = order.clone();
                let source = source.clone();
                effect(move || {
                    source.get();
                    order.lock().push("effect");
                });
            }
            {
                let order = order.clone();
                let source = source.clone();
                computed_with(0, move |_| {
                    order.lock().push("computed");
                    source.get()
                });
            }
            root
        });

        order.lock().clear();
        source.set(1);
        assert_eq!(*order.lock(), vec!["computed", "effect"]);
    }

    #[test]
    fn memo_is_created_once_and_lazily() {
        let host = Host::new();
        let computes = Arc::new(AtomicUsize::new(0));

        let computes_clone = computes.clone();
        let mounted = host
            .mount(move || {
                let computes = computes_clone.clone();
                memo(move || computes.fetch_add(1, Ordering::SeqCst))
            })
            .unwrap();

        let first = mounted.output().unwrap();
        assert!(!first.has_value());
        assert_eq!(computes.load(Ordering::SeqCst), 0);

        let second = mounted.render().unwrap();
        assert_eq!(first, second);
        assert_eq!(second.get(), 0);
        assert_eq!(computes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cleanup_follows_the_placement() {
        let host = Host::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let log_clone = log.clone();
        let mounted = host
            .mount(move || {
                let log = log_clone.clone();
                cleanup(move || log.lock().push("component"));
            })
            .unwrap();

        let root = create_root(|root| {
            let log = log.clone();
            cleanup(move || log.lock().push("root"));
            root
        });

        root.dispose();
        mounted.unmount().unwrap();
        assert_eq!(*log.lock(), vec!["root", "component"]);
    }
}
