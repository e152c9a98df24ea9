//! Hooks
//!
//! Hooks attach state and lifecycle callbacks to the component instance that
//! is currently rendering. They are identified by call order, so a component
//! must call the same hooks in the same order on every render.
//!
//! Calling a hook outside a render panics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::instance::{Instance, Teardown};
use super::store::{ExternalStore, Notify};

fn rendering(hook: &str) -> Arc<Instance> {
    Instance::current()
        .unwrap_or_else(|| panic!("{hook} can only be called while a component renders"))
}

/// Whether a component is rendering on this thread.
pub fn is_rendering() -> bool {
    Instance::current().is_some()
}

/// Identity-stable storage.
///
/// `init` runs on the first render only; every later render gets the same
/// `Arc`. `init` must not call hooks.
pub fn use_ref<T>(init: impl FnOnce() -> T) -> Arc<T>
where
    T: Send + Sync + 'static,
{
    rendering("use_ref").slot(init)
}

/// Like [`use_ref`], but hands out a clone of the stored value.
pub fn use_memo<T>(init: impl FnOnce() -> T) -> T
where
    T: Clone + Send + Sync + 'static,
{
    (*use_ref(init)).clone()
}

struct MountHook;

/// Run `effect` once, after the first commit. The teardown it returns runs
/// at unmount.
///
/// Nothing runs if the first render fails.
pub fn use_mount_effect<F, C>(effect: F)
where
    F: FnOnce() -> C + Send + 'static,
    C: FnOnce() + Send + 'static,
{
    let instance = rendering("use_mount_effect");
    instance.slot(|| {
        instance.queue_mount_effect(Box::new(move || Box::new(effect()) as Teardown));
        MountHook
    });
}

struct UnmountHook;

/// Run `teardown` when the instance unmounts.
///
/// The teardown is registered during the first render, so it runs even if
/// that render fails later on.
pub fn use_unmount(teardown: impl FnOnce() + Send + 'static) {
    let instance = rendering("use_unmount");
    instance.slot(|| {
        instance.add_teardown(Box::new(teardown));
        UnmountHook
    });
}

struct Subscription {
    seen: Arc<AtomicU64>,
}

/// Subscribe the instance to an external store and read its version.
///
/// The store passed on the first render is the one subscribed; it is
/// unsubscribed at unmount. A notification with a version different from
/// the last one rendered requests a re-render.
pub fn use_sync_external_store(store: Arc<dyn ExternalStore>) -> u64 {
    let instance = rendering("use_sync_external_store");
    let subscription = instance.slot(|| {
        let seen = Arc::new(AtomicU64::new(store.snapshot()));
        let notify: Notify = {
            let instance = Arc::downgrade(&instance);
            let store = Arc::downgrade(&store);
            let seen = Arc::clone(&seen);
            Arc::new(move || {
                let (Some(instance), Some(store)) = (instance.upgrade(), store.upgrade()) else {
                    return;
                };
                let version = store.snapshot();
                if seen.swap(version, Ordering::SeqCst) != version {
                    instance.request_update();
                }
            })
        };
        instance.add_teardown(store.subscribe(notify));
        Subscription { seen }
    });

    let version = store.snapshot();
    subscription.seen.store(version, Ordering::SeqCst);
    version
}
