//! Reactions
//!
//! A [`Reaction`] separates tracking from re-running. The caller runs code
//! through [`Reaction::track`]; the first change to anything read during
//! that call fires the invalidation callback, once. Nothing re-runs by
//! itself: the owner of the reaction decides when to call `track` again,
//! and that call collects a fresh dependency set.
//!
//! This is the shape a render-callback host needs. The invalidation
//! callback requests a re-render, and the re-render tracks again.

use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use super::computation::Computation;
use super::runtime::{Kind, Reactive};
use super::subscriber::SubscriberId;

type InvalidateFn = Box<dyn Fn() + Send + Sync>;

/// A tracked computation with a caller-supplied invalidation callback.
pub struct Reaction {
    inner: Arc<ReactionInner>,
}

struct ReactionInner {
    computation: Computation,
    on_invalidate: InvalidateFn,
    /// Set by `track`, cleared when the callback fires.
    armed: AtomicBool,
    invalidations: AtomicUsize,
    this: Weak<ReactionInner>,
}

impl Reaction {
    pub fn new<F>(on_invalidate: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let inner = Arc::new_cyclic(|this| ReactionInner {
            computation: Computation::new(),
            on_invalidate: Box::new(on_invalidate),
            armed: AtomicBool::new(false),
            invalidations: AtomicUsize::new(0),
            this: this.clone(),
        });
        Computation::attach(inner.clone());

        Self { inner }
    }

    /// Run `f`, recording what it reads as this reaction's dependencies.
    ///
    /// Dependencies from the previous call are dropped first.
    pub fn track<R>(&self, f: impl FnOnce() -> R) -> R {
        if self.inner.computation.is_disposed() {
            return f();
        }

        self.inner.armed.store(true, Ordering::SeqCst);
        let observer: Weak<dyn Reactive> = self.inner.this.clone();
        self.inner.computation.run(observer, f)
    }

    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.computation.id()
    }

    /// How many times the invalidation callback has fired.
    pub fn invalidation_count(&self) -> usize {
        self.inner.invalidations.load(Ordering::SeqCst)
    }

    pub fn dependency_count(&self) -> usize {
        self.inner.computation.dependency_count()
    }

    pub fn dispose(&self) {
        self.inner.computation.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.computation.is_disposed()
    }
}

impl Reactive for ReactionInner {
    fn subscriber_id(&self) -> SubscriberId {
        self.computation.id()
    }

    fn kind(&self) -> Kind {
        Kind::Reaction
    }

    fn mark_dirty(&self) {}

    fn schedule(&self) {
        if self.computation.is_disposed() || !self.armed.swap(false, Ordering::SeqCst) {
            return;
        }

        self.computation.release_dependencies();
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        (self.on_invalidate)();
    }

    fn dispose(&self) {
        self.computation.dispose();
    }
}

impl Clone for Reaction {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Debug for Reaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reaction")
            .field("id", &self.subscriber_id())
            .field("invalidations", &self.invalidation_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
