//! Tracked mode
//!
//! The mode flag answers one question for a bridged primitive: is the caller
//! already running inside a callback owned by the reactive engine? If so,
//! the primitive is created natively and owned by whatever is running. If
//! not, it has to be tied to the rendering component.
//!
//! The flag is call-scoped. [`TrackedScope`] sets it and restores the value
//! found on entry when dropped, so nested scopes compose and an unwinding
//! panic cannot leave it set.

use std::cell::Cell;

thread_local! {
    static TRACKED: Cell<bool> = const { Cell::new(false) };
}

/// Whether the current call stack is inside a tracked scope.
pub fn is_tracked() -> bool {
    TRACKED.with(Cell::get)
}

/// Guard that marks the current call stack as tracked.
#[must_use = "the scope ends when the guard is dropped"]
pub struct TrackedScope {
    previous: bool,
}

impl TrackedScope {
    pub fn enter() -> Self {
        let previous = TRACKED.with(|tracked| tracked.replace(true));
        Self { previous }
    }
}

impl Drop for TrackedScope {
    fn drop(&mut self) {
        TRACKED.with(|tracked| tracked.set(self.previous));
    }
}

/// Wrap a one-argument callback so it always runs in tracked mode.
pub fn nest<A, R>(mut f: impl FnMut(A) -> R) -> impl FnMut(A) -> R {
    move |arg| {
        let _scope = TrackedScope::enter();
        f(arg)
    }
}

/// Wrap a zero-argument callback so it always runs in tracked mode.
pub fn nest0<R>(mut f: impl FnMut() -> R) -> impl FnMut() -> R {
    move || {
        let _scope = TrackedScope::enter();
        f()
    }
}
