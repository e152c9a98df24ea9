//! Component Instances
//!
//! An [`Instance`] is one mounted occurrence of a component. It keeps the
//! hook slots that survive re-renders, the teardowns registered by hooks,
//! and the effects waiting for the next commit.
//!
//! # Lifecycle
//!
//! 1. The first render fills the slot table in hook call order.
//! 2. A successful render commits: pending mount effects run and their
//!    teardowns are recorded.
//! 3. Later renders look slots up by the same call order.
//! 4. Unmount runs every teardown once, newest first, and drops the slots.
//!
//! A render that panics before the first commit destroys the instance, so
//! teardowns registered during that render still run.

use std::any::{type_name, Any};
use std::cell::RefCell;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::runtime::HostInner;
use crate::error::{Error, Result};

/// A callback run when its instance unmounts.
pub type Teardown = Box<dyn FnOnce() + Send>;

type MountEffect = Box<dyn FnOnce() -> Teardown + Send>;

/// Identifies a mounted component instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(u64);

impl InstanceId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "instance#{}", self.0)
    }
}

thread_local! {
    static RENDERING: RefCell<Vec<Arc<Instance>>> = const { RefCell::new(Vec::new()) };
}

struct Slot {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

pub(crate) struct Instance {
    id: InstanceId,
    host: Weak<HostInner>,
    slots: Mutex<Vec<Slot>>,
    /// Index of the next hook called during the current render.
    cursor: AtomicUsize,
    committed: AtomicBool,
    mounted: AtomicBool,
    teardowns: Mutex<Vec<Teardown>>,
    pending_effects: Mutex<Vec<MountEffect>>,
    render_count: AtomicUsize,
    update_requests: AtomicUsize,
}

impl Instance {
    pub(crate) fn new(host: Weak<HostInner>) -> Arc<Self> {
        Arc::new(Self {
            id: InstanceId::new(),
            host,
            slots: Mutex::new(Vec::new()),
            cursor: AtomicUsize::new(0),
            committed: AtomicBool::new(false),
            mounted: AtomicBool::new(true),
            teardowns: Mutex::new(Vec::new()),
            pending_effects: Mutex::new(Vec::new()),
            render_count: AtomicUsize::new(0),
            update_requests: AtomicUsize::new(0),
        })
    }

    /// The instance whose body is running on this thread, if any.
    pub(crate) fn current() -> Option<Arc<Instance>> {
        RENDERING.with(|rendering| rendering.borrow().last().cloned())
    }

    pub(crate) fn id(&self) -> InstanceId {
        self.id
    }

    pub(crate) fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    pub(crate) fn is_committed(&self) -> bool {
        self.committed.load(Ordering::SeqCst)
    }

    pub(crate) fn render_count(&self) -> usize {
        self.render_count.load(Ordering::SeqCst)
    }

    pub(crate) fn update_requests(&self) -> usize {
        self.update_requests.load(Ordering::SeqCst)
    }

    /// Look up the next hook slot, creating it with `init` on first render.
    ///
    /// # Panics
    ///
    /// When the hook order differs from the previous render.
    pub(crate) fn slot<T>(&self, init: impl FnOnce() -> T) -> Arc<T>
    where
        T: Send + Sync + 'static,
    {
        let index = self.cursor.fetch_add(1, Ordering::SeqCst);
        let existing = self
            .slots
            .lock()
            .get(index)
            .map(|slot| (Arc::clone(&slot.value), slot.type_name));

        if let Some((value, previous)) = existing {
            return value.downcast::<T>().unwrap_or_else(|_| {
                panic!(
                    "{}: hook {} was {} on the previous render but is now {}; \
                     hooks must be called in the same order on every render",
                    self.id,
                    index,
                    previous,
                    type_name::<T>()
                )
            });
        }

        if self.is_committed() {
            panic!(
                "{}: rendered more hooks than on the previous render (hook {} is new)",
                self.id, index
            );
        }

        let value = Arc::new(init());
        let mut slots = self.slots.lock();
        assert_eq!(
            slots.len(),
            index,
            "{}: a hook initializer called another hook",
            self.id
        );
        slots.push(Slot {
            value: Arc::clone(&value) as Arc<dyn Any + Send + Sync>,
            type_name: type_name::<T>(),
        });
        value
    }

    /// Register a teardown. Runs immediately if already unmounted.
    pub(crate) fn add_teardown(&self, teardown: Teardown) {
        if !self.is_mounted() {
            run_teardown(self.id, teardown);
            return;
        }
        self.teardowns.lock().push(teardown);
    }

    /// Queue `effect` to run after the next commit.
    pub(crate) fn queue_mount_effect(&self, effect: MountEffect) {
        self.pending_effects.lock().push(effect);
    }

    /// Ask the host to render this instance again.
    pub(crate) fn request_update(&self) {
        if !self.is_mounted() {
            return;
        }

        self.update_requests.fetch_add(1, Ordering::SeqCst);
        if let Some(host) = self.host.upgrade() {
            host.schedule(self.id);
        }
        tracing::debug!(instance = %self.id, "update requested");
    }

    /// Run one render of `body` with this instance current.
    pub(crate) fn render<T>(self: &Arc<Self>, body: &mut dyn FnMut() -> T) -> Result<T> {
        if !self.is_mounted() {
            return Err(Error::Unmounted(self.id));
        }

        self.cursor.store(0, Ordering::SeqCst);
        let result = {
            let _rendering = RenderingGuard::enter(Arc::clone(self));
            catch_unwind(AssertUnwindSafe(|| {
                let output = body();
                self.check_hook_count();
                output
            }))
        };
        let renders = self.render_count.fetch_add(1, Ordering::SeqCst) + 1;

        match result {
            Ok(output) => {
                tracing::trace!(instance = %self.id, renders, "rendered");
                self.commit();
                Ok(output)
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(instance = %self.id, %message, "render panicked");
                if !self.is_committed() {
                    self.destroy_and_detach();
                }
                Err(Error::RenderPanicked {
                    id: self.id,
                    message,
                })
            }
        }
    }

    fn check_hook_count(&self) {
        if !self.is_committed() {
            return;
        }
        let called = self.cursor.load(Ordering::SeqCst);
        let expected = self.slots.lock().len();
        if called != expected {
            panic!(
                "{}: rendered {} hooks but the previous render called {}",
                self.id, called, expected
            );
        }
    }

    fn commit(&self) {
        self.committed.store(true, Ordering::SeqCst);

        let effects = std::mem::take(&mut *self.pending_effects.lock());
        for effect in effects {
            match catch_unwind(AssertUnwindSafe(effect)) {
                Ok(teardown) => self.add_teardown(teardown),
                Err(_) => tracing::error!(instance = %self.id, "mount effect panicked"),
            }
        }
    }

    fn destroy_and_detach(&self) {
        if let Some(host) = self.host.upgrade() {
            host.forget(self.id);
        }
        self.destroy();
    }

    /// Run every teardown once, newest first, and release the slots.
    ///
    /// Returns `false` if the instance was already destroyed.
    pub(crate) fn destroy(&self) -> bool {
        if !self.mounted.swap(false, Ordering::SeqCst) {
            return false;
        }

        self.pending_effects.lock().clear();
        let teardowns = std::mem::take(&mut *self.teardowns.lock());
        for teardown in teardowns.into_iter().rev() {
            run_teardown(self.id, teardown);
        }

        let slots = std::mem::take(&mut *self.slots.lock());
        drop(slots);

        tracing::trace!(instance = %self.id, "destroyed");
        true
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("id", &self.id)
            .field("mounted", &self.is_mounted())
            .field("committed", &self.is_committed())
            .field("render_count", &self.render_count())
            .finish()
    }
}

fn run_teardown(id: InstanceId, teardown: Teardown) {
    if catch_unwind(AssertUnwindSafe(teardown)).is_err() {
        tracing::error!(instance = %id, "teardown panicked");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

struct RenderingGuard;

impl RenderingGuard {
    fn enter(instance: Arc<Instance>) -> Self {
        RENDERING.with(|rendering| rendering.borrow_mut().push(instance));
        Self
    }
}

impl Drop for RenderingGuard {
    fn drop(&mut self) {
        RENDERING.with(|rendering| {
            rendering.borrow_mut().pop();
        });
    }
}
