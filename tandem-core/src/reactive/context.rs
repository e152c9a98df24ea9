//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a source is read,
//! we can register the current computation as a dependent.
//!
//! # Implementation
//!
//! We use a thread-local stack to track the currently executing computation.
//! When entering a reactive context (e.g., running a memo or effect), we push
//! a frame onto the stack. When the computation completes, we pop it and hand
//! the collected sources back to the computation. If it panics instead, the
//! frame unsubscribes from everything it collected.
//!
//! Frames without an observer are "untracked": reads inside them register
//! nothing. Roots and [`untrack`](super::untrack) push such frames.

use std::cell::RefCell;
use std::sync::{Arc, Weak};

use smallvec::SmallVec;

use super::runtime::Reactive;
use super::source::SourceNode;
use super::SubscriberId;

/// Sources read during one run of a computation.
pub(crate) type Dependencies = SmallVec<[Arc<SourceNode>; 4]>;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the reactive context stack.
struct ContextEntry {
    /// The computation collecting dependencies, if this frame tracks.
    observer: Option<(SubscriberId, Weak<dyn Reactive>)>,
    /// Sources read during this frame, deduplicated by identity.
    dependencies: Dependencies,
}

/// Guard that pops the context when dropped.
///
/// This ensures the context stack is properly maintained even if
/// the computation panics.
pub struct ReactiveContext {
    subscriber_id: Option<SubscriberId>,
    popped: bool,
}

impl ReactiveContext {
    /// Enter a tracking frame for the given observer.
    pub(crate) fn enter(subscriber_id: SubscriberId, observer: Weak<dyn Reactive>) -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                observer: Some((subscriber_id, observer)),
                dependencies: SmallVec::new(),
            });
        });

        Self {
            subscriber_id: Some(subscriber_id),
            popped: false,
        }
    }

    /// Enter a frame in which reads are not tracked.
    pub fn untracked() -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                observer: None,
                dependencies: SmallVec::new(),
            });
        });

        Self {
            subscriber_id: None,
            popped: false,
        }
    }

    /// Check if reads are currently being tracked.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .is_some_and(|entry| entry.observer.is_some())
        })
    }

    /// Get the current subscriber ID, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .and_then(|entry| entry.observer.as_ref().map(|(id, _)| *id))
        })
    }

    /// Record a read of `source` in the innermost frame.
    ///
    /// Subscribes the observing computation to the source the first time it
    /// is read within the frame.
    pub(crate) fn track(source: &Arc<SourceNode>) {
        CONTEXT_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            let Some(entry) = stack.last_mut() else {
                return;
            };
            let Some((id, observer)) = entry.observer.as_ref() else {
                return;
            };
            if entry.dependencies.iter().any(|dep| Arc::ptr_eq(dep, source)) {
                return;
            }
            source.subscribe(*id, observer.clone());
            entry.dependencies.push(Arc::clone(source));
        });
    }

    /// Number of sources read so far in the innermost frame.
    pub fn dependency_count() -> usize {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .map(|entry| entry.dependencies.len())
                .unwrap_or_default()
        })
    }

    /// Exit the frame, returning the sources it collected.
    pub(crate) fn finish(mut self) -> Dependencies {
        self.popped = true;
        self.pop().unwrap_or_default()
    }

    fn pop(&self) -> Option<Dependencies> {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop()?;

            // Catch mismatched enter/exit pairs early.
            debug_assert_eq!(
                popped.observer.as_ref().map(|(id, _)| *id),
                self.subscriber_id,
                "ReactiveContext mismatch"
            );

            Some(popped.dependencies)
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        if self.popped {
            return;
        }
        // The run unwound before handing its sources back, so nothing else
        // will ever release the subscriptions made during it.
        let dependencies = self.pop().unwrap_or_default();
        if let Some(id) = self.subscriber_id {
            for source in dependencies {
                source.unsubscribe(id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Signal;

    #[test]
    fn untracked_frame_is_not_active() {
        assert!(!ReactiveContext::is_active());

        {
            let _ctx = ReactiveContext::untracked();
            assert!(!ReactiveContext::is_active());
            assert!(ReactiveContext::current_subscriber().is_none());
        }

        assert!(!ReactiveContext::is_active());
    }

    #[test]
    fn reads_outside_any_frame_are_ignored() {
        let signal = Signal::new(1);
        assert_eq!(signal.get(), 1);
        assert_eq!(signal.subscriber_count(), 0);
        assert_eq!(ReactiveContext::dependency_count(), 0);
    }

    #[test]
    fn frame_is_popped_on_panic() {
        let result = std::panic::catch_unwind(|| {
            let _ctx = ReactiveContext::untracked();
            panic!("boom");
        });

        assert!(result.is_err());
        CONTEXT_STACK.with(|stack| assert!(stack.borrow().is_empty()));
    }
}
