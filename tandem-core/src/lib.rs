//! Tandem Core
//!
//! This crate lets a render-callback component model and a fine-grained
//! reactive engine share state inside one component's lifetime.
//! It implements:
//!
//! - A fine-grained reactive engine (signals, stores, memos, effects,
//!   reactions, ownership roots)
//! - A minimal component host with hooks
//! - The bridge: primitives that work both inside tracked engine callbacks
//!   and in component render bodies, plus a render-tracking adapter
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Core reactive primitives and dependency tracking
//! - `host`: Component instances, hooks and the render queue
//! - `bridge`: Mode dispatch, scoped roots and render tracking
//!
//! # Example
//!
//! ```rust,ignore
//! use tandem_core::bridge::{memo, signal, use_observer};
//! use tandem_core::host::Host;
//!
//! let host = Host::new();
//! let mounted = host.mount(|| {
//!     // Created on the first render, reused afterwards.
//!     let count = signal(0);
//!     let doubled = memo({
//!         let count = count.clone();
//!         move || count.get() * 2
//!     });
//!     (count, use_observer(|| doubled.get()))
//! })?;
//!
//! let (count, _) = mounted.output().unwrap();
//! count.set(5);
//! host.flush();
//! assert_eq!(mounted.output().unwrap().1, 10);
//! ```

pub mod bridge;
pub mod host;
pub mod reactive;

mod error;

pub use bridge::{
    cleanup, computed, effect, memo, mutable, observed, signal, store, use_observer,
};
pub use error::{Error, Result};
