//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a reactive context (memo/effect), the
//!    signal registers that context as a subscriber.
//!
//! 2. When a signal's value changes, all subscribers are marked and the
//!    eager ones re-run before `set` returns.
//!
//! 3. Subscriptions are rebuilt on every run of a computation, so a
//!    computation that stops reading a signal stops being notified by it.
//!
//! # Thread Safety
//!
//! The value is protected by a RwLock and the handle is `Send + Sync`.
//! Propagation runs on the writing thread.

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::RwLock;

use super::source::{Equals, Name, SourceNode};
use super::subscriber::SourceId;

/// Options accepted by [`Signal::with_options`].
pub struct SignalOptions<T> {
    /// Debug name, reported in trace output.
    pub name: Option<Name>,
    /// When set and it reports equal, a write is skipped entirely.
    pub equals: Option<Equals<T>>,
}

impl<T> SignalOptions<T> {
    pub fn named(name: impl Into<Name>) -> Self {
        Self {
            name: Some(name.into()),
            equals: None,
        }
    }

    pub fn with_equals(mut self, equals: impl Fn(&T, &T) -> bool + Send + Sync + 'static) -> Self {
        self.equals = Some(Arc::new(equals));
        self
    }
}

impl<T: PartialEq + 'static> SignalOptions<T> {
    /// Skip writes of a value equal to the current one.
    pub fn with_partial_eq(self) -> Self {
        self.with_equals(|a: &T, b: &T| a == b)
    }
}

impl<T> Default for SignalOptions<T> {
    fn default() -> Self {
        Self {
            name: None,
            equals: None,
        }
    }
}

/// A reactive signal holding a value of type T.
///
/// # Example
///
/// ```rust,ignore
/// let count = Signal::new(0);
///
/// // Read the value
/// let value = count.get();
///
/// // Update the value (notifies subscribers)
/// count.set(5);
/// ```
pub struct Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    node: Arc<SourceNode>,
    value: Arc<RwLock<T>>,
    equals: Option<Equals<T>>,
}

impl<T> Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new signal with the given initial value.
    ///
    /// Every write notifies; see [`SignalOptions`] for equality.
    pub fn new(value: T) -> Self {
        Self::with_options(value, SignalOptions::default())
    }

    pub fn with_options(value: T, options: SignalOptions<T>) -> Self {
        Self {
            node: SourceNode::new(options.name),
            value: Arc::new(RwLock::new(value)),
            equals: options.equals,
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> SourceId {
        self.node.id()
    }

    /// Get the current value.
    ///
    /// If called within a reactive context, this also registers the
    /// current computation as a subscriber.
    pub fn get(&self) -> T {
        self.node.track();
        self.value.read().clone()
    }

    /// Read the value by reference, tracking like [`Signal::get`].
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.node.track();
        f(&*self.value.read())
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.value.read().clone()
    }

    /// Set a new value and notify subscribers.
    ///
    /// Dependent effects have re-run by the time this returns, unless a
    /// batch is open.
    pub fn set(&self, value: T) {
        {
            let mut guard = self.value.write();
            if let Some(equals) = &self.equals {
                if equals(&*guard, &value) {
                    return;
                }
            }
            *guard = value;
        }

        self.node.notify();
    }

    /// Update the value using a function.
    ///
    /// This is useful for updates that depend on the current value.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let new_value = {
            let guard = self.value.read();
            f(&*guard)
        };
        self.set(new_value);
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.node.subscriber_count()
    }
}

impl<T> Clone for Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            node: Arc::clone(&self.node),
            value: Arc::clone(&self.value),
            equals: self.equals.clone(),
        }
    }
}

impl<T> PartialEq for Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Handles are equal when they share the same underlying signal.
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }
}

impl<T> Debug for Signal<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id())
            .field("name", &self.node.name())
            .field("value", &self.get_untracked())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
