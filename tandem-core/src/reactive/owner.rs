//! Ownership and Roots
//!
//! Every computation runs under an [`Owner`]. Anything created while an
//! owner is current (nested computations, cleanup callbacks) belongs to it
//! and is released when the owner is cleared or disposed.
//!
//! A root is an owner with no parent. [`create_root`] hands out a
//! [`Disposer`] that tears the whole tree down, exactly once.

use std::cell::RefCell;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::context::ReactiveContext;
use super::runtime::Reactive;

/// A callback run when its owner is cleared or disposed.
pub type Cleanup = Box<dyn FnOnce() + Send>;

/// Identifies a reactive root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RootId(u64);

impl RootId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for RootId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "root#{}", self.0)
    }
}

thread_local! {
    static CURRENT_OWNER: RefCell<Option<Arc<Owner>>> = const { RefCell::new(None) };
}

pub(crate) struct Owner {
    root: Option<RootId>,
    disposed: AtomicBool,
    owned: Mutex<Vec<Arc<dyn Reactive>>>,
    cleanups: Mutex<Vec<Cleanup>>,
}

impl Owner {
    fn with_root(root: Option<RootId>) -> Arc<Self> {
        Arc::new(Self {
            root,
            disposed: AtomicBool::new(false),
            owned: Mutex::new(Vec::new()),
            cleanups: Mutex::new(Vec::new()),
        })
    }

    /// A fresh root owner.
    pub(crate) fn new_root() -> Arc<Self> {
        Self::with_root(Some(RootId::new()))
    }

    /// An owner for a computation created under the current owner.
    pub(crate) fn child_of_current() -> Arc<Self> {
        Self::with_root(Self::current().and_then(|owner| owner.root))
    }

    pub(crate) fn current() -> Option<Arc<Owner>> {
        CURRENT_OWNER.with(|current| current.borrow().clone())
    }

    pub(crate) fn root_id(&self) -> Option<RootId> {
        self.root
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Run `f` with this owner current, restoring the previous one after.
    pub(crate) fn run_in<R>(self: &Arc<Self>, f: impl FnOnce() -> R) -> R {
        let _guard = OwnerGuard::enter(Arc::clone(self));
        f()
    }

    /// Take ownership of a computation.
    pub(crate) fn adopt(&self, node: Arc<dyn Reactive>) {
        if self.is_disposed() {
            node.dispose();
            return;
        }
        self.owned.lock().push(node);
    }

    pub(crate) fn add_cleanup(&self, cleanup: Cleanup) {
        if self.is_disposed() {
            run_cleanup(cleanup);
            return;
        }
        self.cleanups.lock().push(cleanup);
    }

    /// Release everything owned so far but stay usable.
    ///
    /// Owned computations are disposed, then cleanups run, both in reverse
    /// registration order.
    pub(crate) fn clear(&self) {
        let owned = std::mem::take(&mut *self.owned.lock());
        for node in owned.into_iter().rev() {
            node.dispose();
        }

        let cleanups = std::mem::take(&mut *self.cleanups.lock());
        for cleanup in cleanups.into_iter().rev() {
            run_cleanup(cleanup);
        }
    }

    /// Clear and refuse further registrations. Returns `false` if the owner
    /// was already disposed.
    pub(crate) fn dispose(&self) -> bool {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.clear();
        true
    }
}

impl Drop for Owner {
    /// An owner nobody can reach any more releases what it owns.
    fn drop(&mut self) {
        if !self.disposed.swap(true, Ordering::SeqCst) {
            self.clear();
        }
    }
}

fn run_cleanup(cleanup: Cleanup) {
    if catch_unwind(AssertUnwindSafe(cleanup)).is_err() {
        tracing::error!("cleanup callback panicked");
    }
}

struct OwnerGuard {
    previous: Option<Arc<Owner>>,
}

impl OwnerGuard {
    fn enter(owner: Arc<Owner>) -> Self {
        let previous = CURRENT_OWNER.with(|current| current.replace(Some(owner)));
        Self { previous }
    }
}

impl Drop for OwnerGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT_OWNER.with(|current| {
            current.replace(previous);
        });
    }
}

/// Handle that disposes a reactive root.
///
/// Cloning shares the root. Disposing more than once is a no-op. Dropping
/// the last clone disposes the root as well.
#[derive(Clone)]
pub struct Disposer {
    id: RootId,
    owner: Arc<Owner>,
}

impl Disposer {
    pub fn root_id(&self) -> RootId {
        self.id
    }

    /// Dispose every computation and cleanup owned by the root.
    pub fn dispose(&self) {
        if self.owner.dispose() {
            tracing::trace!(root = %self.id, "disposed reactive root");
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.owner.is_disposed()
    }
}

impl fmt::Debug for Disposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disposer")
            .field("root", &self.id)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Create an isolated root and run `f` inside it.
///
/// The root is not attached to the current owner and reads inside `f` are
/// untracked. The disposer is handed to `f` before anything else runs, so it
/// exists even if `f` panics.
pub fn create_root<R>(f: impl FnOnce(Disposer) -> R) -> R {
    let owner = Owner::new_root();
    let disposer = Disposer {
        id: owner.root.unwrap_or_else(RootId::new),
        owner: Arc::clone(&owner),
    };
    tracing::trace!(root = %disposer.id, "created reactive root");

    let _untracked = ReactiveContext::untracked();
    owner.run_in(|| f(disposer))
}

/// Register `f` to run when the current owner is cleared or disposed.
///
/// Inside an effect or memo this runs before the next re-run. With no owner
/// the callback can never run and is dropped.
pub fn on_cleanup(f: impl FnOnce() + Send + 'static) {
    match Owner::current() {
        Some(owner) => owner.add_cleanup(Box::new(f)),
        None => tracing::warn!("cleanup registered outside any owner will never run"),
    }
}
