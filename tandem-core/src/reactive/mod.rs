//! Reactive Primitives
//!
//! This module implements the fine-grained engine the bridge delegates to:
//! signals, stores, memos, effects and reactions, plus the ownership tree
//! that disposes them.
//!
//! # Concepts
//!
//! ## Signals and Stores
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! within a tracking context (such as a memo or effect), the signal
//! automatically registers that context as a dependent. When the value
//! changes, all dependents are notified. Stores do the same for structured
//! state that is updated in place.
//!
//! ## Memos
//!
//! A Memo is a derived value that caches its result. It computes on first
//! read and re-evaluates only when one of its dependencies changes.
//! Dependents of a memo are notified only if the new value differs.
//!
//! ## Effects and Reactions
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change. A Reaction tracks a caller-driven run and reports the
//! first change through a callback instead of re-running itself.
//!
//! ## Roots
//!
//! Computations belong to the owner that was current when they were created.
//! [`create_root`] starts a fresh ownership tree and returns a [`Disposer`]
//! for it.
//!
//! # Implementation Notes
//!
//! The reactive system uses a thread-local tracking context to automatically
//! detect dependencies. When a source is read, we check if there is an active
//! tracking context and, if so, register the dependency. Propagation is
//! synchronous and runs on the writing thread.

mod computation;
mod context;
mod effect;
mod memo;
mod owner;
mod reaction;
mod runtime;
mod signal;
mod source;
mod store;
mod subscriber;

pub use context::ReactiveContext;
pub use effect::Effect;
pub use memo::{Memo, MemoOptions, MemoState};
pub use owner::{create_root, on_cleanup, Cleanup, Disposer, RootId};
pub use reaction::Reaction;
pub use runtime::{batch, untrack, Kind, Reactive, Runtime};
pub use signal::{Signal, SignalOptions};
pub use source::{Equals, Name};
pub use store::{Mutable, MutableGuard, Store, StoreOptions};
pub use subscriber::{SourceId, SubscriberId};
