//! External stores
//!
//! An [`ExternalStore`] is state that lives outside the host. Components
//! subscribe to it with [`use_sync_external_store`](super::use_sync_external_store)
//! and re-render when its version changes.

/// Callback a store invokes after it changes.
pub type Notify = std::sync::Arc<dyn Fn() + Send + Sync>;

/// Undo a subscription.
pub type Unsubscribe = Box<dyn FnOnce() + Send>;

pub trait ExternalStore: Send + Sync {
    /// Register `notify`; the returned callback removes it again.
    fn subscribe(&self, notify: Notify) -> Unsubscribe;

    /// A version number that changes whenever the store does.
    fn snapshot(&self) -> u64;
}
