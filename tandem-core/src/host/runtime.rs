//! Host Runtime
//!
//! The [`Host`] owns every mounted instance and the queue of instances that
//! asked to be rendered again.
//!
//! # How It Works
//!
//! 1. [`Host::mount`] creates an instance and renders it once.
//! 2. Hooks call back into the instance to request updates. Requests land
//!    in a deduplicated queue; nothing renders until the host is flushed.
//! 3. [`Host::flush`] re-renders queued instances in request order until the
//!    queue stays empty.

use std::sync::{Arc, Weak};

use dashmap::DashMap;
use indexmap::IndexSet;
use parking_lot::Mutex;

use super::instance::{Instance, InstanceId};
use super::renderer::{Mounted, Render, Renderer};
use crate::error::{Error, Result};

/// Upper bound on render passes in one flush, so a component that requests
/// an update on every render cannot spin forever.
const MAX_FLUSH_PASSES: usize = 100;

pub(crate) struct HostInner {
    instances: DashMap<InstanceId, Entry>,
    scheduled: Mutex<IndexSet<InstanceId>>,
}

struct Entry {
    instance: Arc<Instance>,
    renderer: Weak<dyn Render>,
}

impl HostInner {
    pub(crate) fn schedule(&self, id: InstanceId) {
        if self.instances.contains_key(&id) {
            self.scheduled.lock().insert(id);
        }
    }

    /// Drop an instance from the arena without tearing it down.
    pub(crate) fn forget(&self, id: InstanceId) {
        self.instances.remove(&id);
        self.scheduled.lock().shift_remove(&id);
    }
}

/// A render-callback host for components.
///
/// Cloning shares the host.
#[derive(Clone)]
pub struct Host {
    inner: Arc<HostInner>,
}

impl Host {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HostInner {
                instances: DashMap::new(),
                scheduled: Mutex::new(IndexSet::new()),
            }),
        }
    }

    /// Mount a component and render it for the first time.
    ///
    /// If the first render panics, the instance is torn down and the panic
    /// is returned as [`Error::RenderPanicked`].
    pub fn mount<T, F>(&self, body: F) -> Result<Mounted<T>>
    where
        T: Clone + Send + 'static,
        F: FnMut() -> T + Send + 'static,
    {
        let instance = Instance::new(Arc::downgrade(&self.inner));
        let renderer = Arc::new(Renderer::new(Arc::clone(&instance), Box::new(body)));
        let erased: Arc<dyn Render> = renderer.clone();

        self.inner.instances.insert(
            instance.id(),
            Entry {
                instance: Arc::clone(&instance),
                renderer: Arc::downgrade(&erased),
            },
        );
        tracing::trace!(instance = %instance.id(), "mounting");

        renderer.render()?;
        Ok(Mounted::new(self.clone(), renderer))
    }

    /// Tear an instance down, running its teardowns.
    pub fn unmount(&self, id: InstanceId) -> Result<()> {
        let (_, entry) = self
            .inner
            .instances
            .remove(&id)
            .ok_or(Error::UnknownInstance(id))?;
        self.inner.scheduled.lock().shift_remove(&id);
        entry.instance.destroy();
        Ok(())
    }

    /// Take the queued update requests, in request order.
    pub fn take_scheduled(&self) -> Vec<InstanceId> {
        std::mem::take(&mut *self.inner.scheduled.lock())
            .into_iter()
            .collect()
    }

    /// Remove an instance from the queue without rendering it.
    pub(crate) fn unschedule(&self, id: InstanceId) {
        self.inner.scheduled.lock().shift_remove(&id);
    }

    /// Number of instances waiting for a render.
    pub fn pending_count(&self) -> usize {
        self.inner.scheduled.lock().len()
    }

    /// Re-render every instance that requested an update, including ones
    /// that request it during this flush. Returns the number of renders.
    pub fn flush(&self) -> usize {
        let mut rendered = 0;

        for _ in 0..MAX_FLUSH_PASSES {
            let scheduled = self.take_scheduled();
            if scheduled.is_empty() {
                break;
            }

            for id in scheduled {
                let Some(renderer) = self.renderer(id) else {
                    continue;
                };
                match renderer.render_erased() {
                    Ok(()) => rendered += 1,
                    Err(error) => tracing::error!(instance = %id, %error, "scheduled render failed"),
                }
            }
        }

        if self.pending_count() > 0 {
            tracing::warn!(
                pending = self.pending_count(),
                "instances still requesting updates after {MAX_FLUSH_PASSES} passes"
            );
        }
        if rendered > 0 {
            tracing::trace!(rendered, "flushed host");
        }
        rendered
    }

    fn renderer(&self, id: InstanceId) -> Option<Arc<dyn Render>> {
        self.inner
            .instances
            .get(&id)
            .and_then(|entry| entry.renderer.upgrade())
    }

    pub fn is_mounted(&self, id: InstanceId) -> bool {
        self.inner.instances.contains_key(&id)
    }

    pub fn instance_count(&self) -> usize {
        self.inner.instances.len()
    }
}

impl Default for Host {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("instance_count", &self.instance_count())
            .field("pending_count", &self.pending_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{use_ref, use_sync_external_store, ExternalStore, Notify, Unsubscribe};
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counter {
        version: AtomicU64,
        listeners: Mutex<Vec<Notify>>,
    }

    impl Counter {
        fn bump(&self) {
            self.version.fetch_add(1, Ordering::SeqCst);
            let listeners = self.listeners.lock().clone();
            for notify in listeners {
                notify();
            }
        }
    }

    impl ExternalStore for Counter {
        fn subscribe(&self, notify: Notify) -> Unsubscribe {
            self.listeners.lock().push(notify);
            Box::new(|| {})
        }

        fn snapshot(&self) -> u64 {
            self.version.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn flush_renders_each_requested_instance_once() {
        let host = Host::new();
        let store = Arc::new(Counter::default());

        let store_clone = store.clone();
        let mounted = host
            .mount(move || use_sync_external_store(store_clone.clone()))
            .unwrap();
        assert_eq!(mounted.render_count(), 1);

        store.bump();
        store.bump();
        assert_eq!(host.pending_count(), 1);
        assert_eq!(mounted.update_requests(), 2);

        assert_eq!(host.flush(), 1);
        assert_eq!(mounted.output(), Some(2));
        assert_eq!(mounted.render_count(), 2);
        assert_eq!(host.flush(), 0);
    }

    #[test]
    fn unmount_removes_the_instance() {
        let host = Host::new();
        let mounted = host.mount(|| ()).unwrap();
        let id = mounted.id();

        assert!(host.is_mounted(id));
        host.unmount(id).unwrap();
        assert!(!host.is_mounted(id));
        assert_eq!(host.unmount(id), Err(Error::UnknownInstance(id)));
        assert_eq!(mounted.render(), Err(Error::Unmounted(id)));
    }

    #[test]
    fn unmounted_instances_are_not_rendered() {
        let host = Host::new();
        let store = Arc::new(Counter::default());
        let renders = Arc::new(AtomicUsize::new(0));

        let store_clone = store.clone();
        let renders_clone = renders.clone();
        let mounted = host
            .mount(move || {
                renders_clone.fetch_add(1, Ordering::SeqCst);
                use_ref(|| ());
                use_sync_external_store(store_clone.clone())
            })
            .unwrap();

        mounted.unmount().unwrap();
        store.bump();
        assert_eq!(host.flush(), 0);
        assert_eq!(renders.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn direct_render_satisfies_queued_requests() {
        let host = Host::new();
        let store = Arc::new(Counter::default());

        let store_clone = store.clone();
        let mounted = host
            .mount(move || use_sync_external_store(store_clone.clone()))
            .unwrap();

        store.bump();
        assert_eq!(host.pending_count(), 1);

        assert_eq!(mounted.render(), Ok(1));
        assert_eq!(host.pending_count(), 0);
        assert_eq!(host.flush(), 0);
        assert_eq!(mounted.render_count(), 2);
    }

    #[test]
    fn flush_stops_after_the_pass_limit() {
        let host = Host::new();
        let mounted = host
            .mount(|| {
                if let Some(instance) = Instance::current() {
                    instance.request_update();
                }
            })
            .unwrap();
        assert_eq!(host.pending_count(), 1);

        assert_eq!(host.flush(), MAX_FLUSH_PASSES);
        assert_eq!(host.pending_count(), 1);
        assert_eq!(mounted.render_count(), MAX_FLUSH_PASSES + 1);
    }
}
