//! Render tracking
//!
//! [`use_observer`] lets a component read engine state during render and
//! re-render when that state changes.
//!
//! # How It Works
//!
//! 1. Each instance gets a [`ForceUpdate`] store, subscribed through the
//!    host's external-store hook, and one [`Reaction`] living in a scoped
//!    root.
//! 2. Every render runs the computation through the reaction, so the
//!    dependency set is exactly what this render read.
//! 3. The first change to any of those dependencies triggers the store,
//!    the host schedules a render, and that render tracks again.
//!
//! The root, and the reaction with it, is disposed at unmount.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::scope::scoped;
use crate::host::{
    is_rendering, use_memo, use_sync_external_store, ExternalStore, Notify, Unsubscribe,
};
use crate::reactive::Reaction;

/// An external store whose only state is a version counter.
///
/// Calling [`ForceUpdate::trigger`] bumps the version and notifies every
/// subscriber.
#[derive(Default)]
pub struct ForceUpdate {
    version: AtomicU64,
    next_listener: AtomicU64,
    listeners: Arc<Mutex<IndexMap<u64, Notify>>>,
}

impl ForceUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        let listeners: Vec<Notify> = self.listeners.lock().values().cloned().collect();
        tracing::debug!(version, listeners = listeners.len(), "forcing update");
        for notify in listeners {
            notify();
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }
}

impl ExternalStore for ForceUpdate {
    fn subscribe(&self, notify: Notify) -> Unsubscribe {
        let key = self.next_listener.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().insert(key, notify);

        let listeners = Arc::clone(&self.listeners);
        Box::new(move || {
            listeners.lock().shift_remove(&key);
        })
    }

    fn snapshot(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for ForceUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForceUpdate")
            .field("version", &self.snapshot())
            .field("listener_count", &self.listener_count())
            .finish()
    }
}

/// Evaluate `compute` for the rendering component, re-rendering it whenever
/// anything `compute` read changes.
///
/// Outside a render there is nothing to re-render, so `compute` just runs.
pub fn use_observer<T>(compute: impl FnOnce() -> T) -> T {
    if !is_rendering() {
        tracing::debug!("use_observer called outside a render; running untracked");
        return compute();
    }

    let force = use_memo(|| Arc::new(ForceUpdate::new()));
    use_sync_external_store(force.clone());

    let reaction = scoped(move || Reaction::new(move || force.trigger()));
    reaction.track(compute)
}

/// Turn a component that returns a render callback into a host component.
///
/// `component` runs on every render and may call hooks and bridged
/// primitives. The callback it returns is evaluated through
/// [`use_observer`]. The observer hooks run even when `component` returns
/// nothing, so the hook order stays the same either way.
pub fn observed<P, R, T, C>(component: C) -> impl Fn(&P) -> Option<T> + Send + Sync
where
    C: Fn(&P) -> Option<R> + Send + Sync,
    R: FnOnce() -> T,
{
    move |props| {
        let render = component(props);
        use_observer(move || render.map(|render| render()))
    }
}
