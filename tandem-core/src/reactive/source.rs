//! Readable sources.
//!
//! A [`SourceNode`] is the subscriber set shared by everything that can be
//! read reactively: signals, stores and memos. It owns no value; the typed
//! wrappers keep the value and call into the node to track reads and to
//! propagate writes.

use std::borrow::Cow;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::context::ReactiveContext;
use super::runtime::{Reactive, Runtime};
use super::subscriber::{SourceId, SubscriberId};

/// Optional debug name carried by sources and computations.
pub type Name = Cow<'static, str>;

/// Custom equality used to skip notifications for unchanged values.
pub type Equals<T> = Arc<dyn Fn(&T, &T) -> bool + Send + Sync>;

pub(crate) struct SourceNode {
    id: SourceId,
    name: Option<Name>,
    /// Subscribers in subscription order. Weak so a source never keeps a
    /// disposed computation alive.
    subscribers: Mutex<IndexMap<SubscriberId, Weak<dyn Reactive>>>,
}

impl SourceNode {
    pub(crate) fn new(name: Option<Name>) -> Arc<Self> {
        Arc::new(Self {
            id: SourceId::new(),
            name,
            subscribers: Mutex::new(IndexMap::new()),
        })
    }

    pub(crate) fn id(&self) -> SourceId {
        self.id
    }

    pub(crate) fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Register a read with the running computation, if any.
    pub(crate) fn track(self: &Arc<Self>) {
        ReactiveContext::track(self);
    }

    pub(crate) fn subscribe(&self, id: SubscriberId, observer: Weak<dyn Reactive>) {
        self.subscribers.lock().insert(id, observer);
    }

    pub(crate) fn unsubscribe(&self, id: SubscriberId) {
        self.subscribers.lock().shift_remove(&id);
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Mark every live subscriber dirty and queue the eager ones.
    ///
    /// Does not flush; callers decide when propagation runs.
    pub(crate) fn mark_subscribers(&self) {
        let live: Vec<Arc<dyn Reactive>> = {
            let mut subscribers = self.subscribers.lock();
            subscribers.retain(|_, observer| observer.strong_count() > 0);
            subscribers.values().filter_map(Weak::upgrade).collect()
        };

        tracing::trace!(
            source = %self.id,
            name = self.name(),
            subscribers = live.len(),
            "source changed"
        );

        for reactive in live {
            reactive.mark_dirty();
            if reactive.is_eager() {
                Runtime::enqueue(reactive);
            }
        }
    }

    /// Propagate a write: mark subscribers, then flush unless batching.
    pub(crate) fn notify(&self) {
        self.mark_subscribers();
        Runtime::flush();
    }
}

impl std::fmt::Debug for SourceNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceNode")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
