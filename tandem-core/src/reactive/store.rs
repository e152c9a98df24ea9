//! Stores
//!
//! Stores hold structured state. [`Store`] is written by replacing or
//! updating the whole value; [`Mutable`] hands out a write guard so state can
//! be changed in place, and notifies once when the guard is released.
//!
//! Both track the value as a whole: reading any part of it subscribes to
//! every later write.

use std::fmt::Debug;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::{RwLock, RwLockWriteGuard};

use super::memo::Memo;
use super::source::{Name, SourceNode};
use super::subscriber::SourceId;

/// Options accepted by [`Store::with_options`] and [`Mutable::with_options`].
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    /// Debug name, reported in trace output.
    pub name: Option<Name>,
}

impl StoreOptions {
    pub fn named(name: impl Into<Name>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }
}

/// Reactive state updated as a whole.
pub struct Store<T>
where
    T: Send + Sync + 'static,
{
    node: Arc<SourceNode>,
    value: Arc<RwLock<T>>,
}

impl<T> Store<T>
where
    T: Send + Sync + 'static,
{
    pub fn new(value: T) -> Self {
        Self::with_options(value, StoreOptions::default())
    }

    pub fn with_options(value: T, options: StoreOptions) -> Self {
        Self {
            node: SourceNode::new(options.name),
            value: Arc::new(RwLock::new(value)),
        }
    }

    pub fn id(&self) -> SourceId {
        self.node.id()
    }

    /// Read the state by reference. Tracked.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.node.track();
        f(&*self.value.read())
    }

    /// Replace the state and notify.
    pub fn set(&self, value: T) {
        *self.value.write() = value;
        self.node.notify();
    }

    /// Change the state in place and notify.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        f(&mut *self.value.write());
        self.node.notify();
    }

    /// Derive a cached projection of the state.
    ///
    /// The projection recomputes on every write but only notifies its own
    /// readers when the projected value changes.
    pub fn select<R, F>(&self, project: F) -> Memo<R>
    where
        R: Clone + Send + Sync + PartialEq + 'static,
        F: Fn(&T) -> R + Send + 'static,
    {
        let store = self.clone();
        Memo::new(move || store.with(&project))
    }

    pub fn subscriber_count(&self) -> usize {
        self.node.subscriber_count()
    }
}

impl<T> Store<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Clone the current state. Tracked.
    pub fn get(&self) -> T {
        self.with(T::clone)
    }
}

impl<T> Clone for Store<T>
where
    T: Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            node: Arc::clone(&self.node),
            value: Arc::clone(&self.value),
        }
    }
}

impl<T> Debug for Store<T>
where
    T: Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("id", &self.id())
            .field("name", &self.node.name())
            .field("value", &*self.value.read())
            .finish()
    }
}

/// Reactive state mutated in place through a guard.
pub struct Mutable<T>
where
    T: Send + Sync + 'static,
{
    node: Arc<SourceNode>,
    value: Arc<RwLock<T>>,
}

impl<T> Mutable<T>
where
    T: Send + Sync + 'static,
{
    pub fn new(value: T) -> Self {
        Self::with_options(value, StoreOptions::default())
    }

    pub fn with_options(value: T, options: StoreOptions) -> Self {
        Self {
            node: SourceNode::new(options.name),
            value: Arc::new(RwLock::new(value)),
        }
    }

    pub fn id(&self) -> SourceId {
        self.node.id()
    }

    /// Read the state by reference. Tracked.
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.node.track();
        f(&*self.value.read())
    }

    /// Borrow the state for writing.
    ///
    /// Subscribers are notified once, after the guard is dropped and the
    /// lock released. Do not read the same state while holding the guard.
    pub fn write(&self) -> MutableGuard<'_, T> {
        MutableGuard {
            guard: Some(self.value.write()),
            node: &self.node,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.node.subscriber_count()
    }
}

impl<T> Mutable<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Clone the current state. Tracked.
    pub fn get(&self) -> T {
        self.read(T::clone)
    }
}

impl<T> Clone for Mutable<T>
where
    T: Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            node: Arc::clone(&self.node),
            value: Arc::clone(&self.value),
        }
    }
}

impl<T> Debug for Mutable<T>
where
    T: Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mutable")
            .field("id", &self.id())
            .field("name", &self.node.name())
            .field("value", &*self.value.read())
            .finish()
    }
}

/// Write access to a [`Mutable`]. Notifies on drop.
pub struct MutableGuard<'a, T> {
    guard: Option<RwLockWriteGuard<'a, T>>,
    node: &'a Arc<SourceNode>,
}

impl<T> Deref for MutableGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        match &self.guard {
            Some(guard) => &**guard,
            None => unreachable!("guard is only taken in drop"),
        }
    }
}

impl<T> DerefMut for MutableGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        match &mut self.guard {
            Some(guard) => &mut **guard,
            None => unreachable!("guard is only taken in drop"),
        }
    }
}

impl<T> Drop for MutableGuard<'_, T> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.node.notify();
    }
}
