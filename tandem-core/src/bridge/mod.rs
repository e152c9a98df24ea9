//! Bridge
//!
//! Lets component code and reactive engine code share one set of
//! primitives. The same call, `signal(0)` or `effect(..)`, does the right
//! thing in either position:
//!
//! - inside a tracked scope (the body of an effect, computed or memo) it
//!   is the engine's own constructor, owned by the running computation;
//! - while a component renders it is created once per instance, inside a
//!   scoped root that the instance disposes at unmount;
//! - anywhere else it falls back to the engine's constructor.
//!
//! [`use_observer`] and [`observed`] go the other way: they let a component
//! render from engine state and re-render when that state changes.
//!
//! # Example
//!
//! ```rust,ignore
//! use tandem_core::bridge::{effect, observed, signal};
//! use tandem_core::host::Host;
//!
//! let counter = observed(|_: &()| {
//!     let count = signal(0);
//!     effect({
//!         let count = count.clone();
//!         move || println!("count is {}", count.get())
//!     });
//!     Some(move || count.get())
//! });
//!
//! let host = Host::new();
//! let mounted = host.mount(move || counter(&()))?;
//! ```

mod dispatch;
mod mode;
mod observer;
mod primitives;
mod scope;

pub use dispatch::Placement;
pub use mode::{is_tracked, nest, nest0, TrackedScope};
pub use observer::{observed, use_observer, ForceUpdate};
pub use primitives::{
    batch, cleanup, computed, computed_with, effect, effect_with, memo, memo_with_options,
    mutable, signal, signal_with_options, store, untrack,
};
pub use scope::{scoped, scoped_with_root};

// Engine-style names, so code written against the engine can switch over
// by changing its imports.
pub use primitives::{
    cleanup as on_cleanup, computed as create_computed, effect as create_effect,
    memo as create_memo, mutable as create_mutable, signal as create_signal,
    store as create_store,
};
