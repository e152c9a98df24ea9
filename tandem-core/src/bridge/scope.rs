//! Scoped roots
//!
//! A component that creates engine computations needs somewhere for them to
//! live. [`scoped`] gives each call site of each instance one reactive root,
//! created on the first render and disposed when the instance unmounts.
//!
//! Ordering matters for failure cases:
//!
//! 1. The unmount teardown is registered before the root exists.
//! 2. The root's disposer is stored before `create` runs.
//!
//! So if `create` panics, the root it left behind is still disposed at
//! unmount, and a failed first render unmounts right away.

use parking_lot::Mutex;

use crate::host::{use_ref, use_unmount};
use crate::reactive::{create_root, Disposer, RootId};

struct ScopeSlot<T> {
    disposer: Mutex<Option<Disposer>>,
    value: Mutex<Option<T>>,
}

impl<T> ScopeSlot<T> {
    fn new() -> Self {
        Self {
            disposer: Mutex::new(None),
            value: Mutex::new(None),
        }
    }

    fn dispose(&self) {
        let disposer = self.disposer.lock().take();
        if let Some(disposer) = disposer {
            disposer.dispose();
        }
        self.value.lock().take();
    }
}

/// Run `create` once per instance inside a fresh reactive root and return
/// its result on every render.
///
/// Must be called while a component renders.
pub fn scoped<T>(create: impl FnOnce() -> T) -> T
where
    T: Clone + Send + Sync + 'static,
{
    scoped_with_root(create).0
}

/// Like [`scoped`], also returning the id of the root backing this call site.
pub fn scoped_with_root<T>(create: impl FnOnce() -> T) -> (T, RootId)
where
    T: Clone + Send + Sync + 'static,
{
    let slot = use_ref(ScopeSlot::<T>::new);
    let teardown = slot.clone();
    use_unmount(move || teardown.dispose());

    let existing = {
        let disposer = slot.disposer.lock();
        let value = slot.value.lock();
        match (&*disposer, &*value) {
            (Some(disposer), Some(value)) => Some((value.clone(), disposer.root_id())),
            _ => None,
        }
    };
    if let Some(existing) = existing {
        return existing;
    }

    create_root(|disposer| {
        let root = disposer.root_id();
        // A previous attempt that panicked in `create` left a root behind.
        let stale = slot.disposer.lock().replace(disposer);
        if let Some(stale) = stale {
            stale.dispose();
        }

        let value = create();
        *slot.value.lock() = Some(value.clone());
        tracing::debug!(%root, "created scoped root");
        (value, root)
    })
}
