//! Shared machinery for memos, effects and reactions.
//!
//! A [`Computation`] owns the bookkeeping every tracked run needs: its
//! subscriber id, the sources it read last time, and a child [`Owner`] for
//! anything created while it runs.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::context::{Dependencies, ReactiveContext};
use super::owner::{Owner, RootId};
use super::runtime::{Kind, Reactive, Runtime};
use super::subscriber::SubscriberId;

pub(crate) struct Computation {
    id: SubscriberId,
    owner: Arc<Owner>,
    dependencies: Mutex<Dependencies>,
    disposed: AtomicBool,
    run_count: AtomicUsize,
}

impl Computation {
    pub(crate) fn new() -> Self {
        Self {
            id: SubscriberId::new(),
            owner: Owner::child_of_current(),
            dependencies: Mutex::new(Dependencies::new()),
            disposed: AtomicBool::new(false),
            run_count: AtomicUsize::new(0),
        }
    }

    pub(crate) fn id(&self) -> SubscriberId {
        self.id
    }

    pub(crate) fn root_id(&self) -> Option<RootId> {
        self.owner.root_id()
    }

    /// Hand a freshly built node to the current owner.
    ///
    /// Without an owner, effects and computeds are kept alive detached since
    /// nothing reads them. Memos and reactions live as long as their handles.
    pub(crate) fn attach(node: Arc<dyn Reactive>) {
        match Owner::current() {
            Some(owner) => owner.adopt(node),
            None if matches!(node.kind(), Kind::Effect | Kind::Computed) => {
                Runtime::retain_detached(node)
            }
            None => {}
        }
    }

    /// Run `f` as a tracked pass of this computation.
    ///
    /// Previous subscriptions and owned children are released first, so the
    /// dependency set afterwards is exactly what `f` read this time.
    pub(crate) fn run<R>(&self, observer: Weak<dyn Reactive>, f: impl FnOnce() -> R) -> R {
        self.release_dependencies();
        self.owner.clear();

        let ctx = ReactiveContext::enter(self.id, observer);
        let value = self.owner.run_in(f);
        let dependencies = ctx.finish();

        *self.dependencies.lock() = dependencies;
        self.run_count.fetch_add(1, Ordering::SeqCst);
        value
    }

    /// Unsubscribe from everything read during the last run.
    pub(crate) fn release_dependencies(&self) {
        let dependencies = std::mem::take(&mut *self.dependencies.lock());
        for source in dependencies {
            source.unsubscribe(self.id);
        }
    }

    /// Returns `false` if already disposed.
    pub(crate) fn dispose(&self) -> bool {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.release_dependencies();
        self.owner.dispose();
        Runtime::release_detached(self.id);
        true
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub(crate) fn run_count(&self) -> usize {
        self.run_count.load(Ordering::SeqCst)
    }

    pub(crate) fn dependency_count(&self) -> usize {
        self.dependencies.lock().len()
    }
}
