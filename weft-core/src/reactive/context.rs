//! Tracking context.
//!
//! The tracking context records which watcher is currently evaluating.
//! This enables automatic dependency discovery: when a reactive field is
//! read, its dependency registry can register the current watcher as a
//! subscriber without the reader and the field knowing about each other.
//!
//! # Implementation
//!
//! A thread-local slot holds the active watcher. Entering a scope swaps the
//! watcher in and returns a guard; dropping the guard restores whatever was
//! active before. Evaluation is synchronous and never yields control, so
//! within one thread the slot is unambiguous for the whole of an
//! evaluation.

use std::cell::RefCell;
use std::sync::{Arc, Weak};

use super::watcher::Watcher;

thread_local! {
    static ACTIVE: RefCell<Option<Weak<Watcher>>> = RefCell::new(None);
}

/// Guard marking "this watcher is currently evaluating".
///
/// Restores the previously active watcher when dropped, even if the
/// evaluation panics.
pub struct TrackingScope {
    previous: Option<Weak<Watcher>>,
}

impl TrackingScope {
    /// Enter a tracking scope for the given watcher.
    ///
    /// While the returned guard is alive, any reactive field read on this
    /// thread registers its dependency registry with that watcher.
    pub fn enter(watcher: Weak<Watcher>) -> Self {
        let previous = ACTIVE.with(|active| active.borrow_mut().replace(watcher));
        Self { previous }
    }

    /// Check whether a watcher is currently evaluating on this thread.
    pub fn is_active() -> bool {
        ACTIVE.with(|active| active.borrow().is_some())
    }

    /// Get the currently evaluating watcher, if any.
    pub fn current() -> Option<Arc<Watcher>> {
        ACTIVE.with(|active| active.borrow().as_ref().and_then(Weak::upgrade))
    }
}

impl Drop for TrackingScope {
    fn drop(&mut self) {
        ACTIVE.with(|active| {
            *active.borrow_mut() = self.previous.take();
        });
    }
}
