//! Dependency registry.
//!
//! Every reactive field owns one `Dep`: the ordered set of watchers that
//! read the field during their most recent evaluation. A write to the field
//! notifies the registry, which re-runs each subscriber synchronously, in
//! subscription order.
//!
//! The registry deliberately does not deduplicate: `Watcher::add_dep` is
//! the half of the protocol responsible for idempotent registration, keyed
//! by registry id.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use smallvec::SmallVec;
use tracing::trace;

use super::context::TrackingScope;
use super::watcher::Watcher;

/// Counter for generating unique registry ids.
static DEP_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_dep_id() -> u64 {
    DEP_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Most fields have a handful of subscribers; keep them inline.
type SubscriberList = SmallVec<[Weak<Watcher>; 4]>;

/// The subscriber registry for one reactive field.
pub struct Dep {
    /// Unique identifier, assigned at creation, monotonically increasing.
    id: u64,

    /// Subscribers in subscription order. Weak, so a registry never keeps
    /// a dropped watcher alive.
    subs: RwLock<SubscriberList>,

    /// Self-handle, so `depend` can hand the watcher an owned reference.
    this: Weak<Dep>,
}

impl Dep {
    /// Create a new registry.
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            id: next_dep_id(),
            subs: RwLock::new(SmallVec::new()),
            this: this.clone(),
        })
    }

    /// The registry's unique id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Append a subscriber. Deduplication is the caller's responsibility.
    pub fn add_sub(&self, sub: Weak<Watcher>) {
        self.subs
            .write()
            .expect("subscriber lock poisoned")
            .push(sub);
    }

    /// Remove a subscriber by identity. No-op if it is not registered.
    pub fn remove_sub(&self, sub: &Weak<Watcher>) {
        self.subs
            .write()
            .expect("subscriber lock poisoned")
            .retain(|existing| !existing.ptr_eq(sub));
    }

    /// Register the currently evaluating watcher, if any, as a subscriber.
    ///
    /// Invoked from a field's read accessor. The registry delegates to the
    /// watcher rather than inserting directly, so dedup bookkeeping lives
    /// in one place.
    pub fn depend(&self) {
        if let Some(watcher) = TrackingScope::current() {
            if let Some(dep) = self.this.upgrade() {
                watcher.add_dep(&dep);
            }
        }
    }

    /// Re-run every live subscriber, in subscription order.
    ///
    /// The list is snapshotted first so subscribers are free to read fields
    /// (and therefore re-register) while the notification is in flight.
    pub fn notify(&self) {
        let subs: SubscriberList = self
            .subs
            .read()
            .expect("subscriber lock poisoned")
            .clone();

        trace!(dep = self.id, subscribers = subs.len(), "notifying subscribers");

        for sub in subs {
            if let Some(watcher) = sub.upgrade() {
                watcher.update();
            }
        }
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subs
            .read()
            .expect("subscriber lock poisoned")
            .iter()
            .filter(|sub| sub.strong_count() > 0)
            .count()
    }
}

impl std::fmt::Debug for Dep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dep")
            .field("id", &self.id)
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::store::observe;
    use serde_json::json;
    use std::sync::atomic::AtomicI32;
    use std::sync::Mutex;

    #[test]
    fn dep_ids_are_unique() {
        let d1 = Dep::new();
        let d2 = Dep::new();
        let d3 = Dep::new();

        assert_ne!(d1.id(), d2.id());
        assert_ne!(d2.id(), d3.id());
        assert_ne!(d1.id(), d3.id());
    }

    #[test]
    fn depend_outside_a_scope_is_a_noop() {
        let dep = Dep::new();
        dep.depend();
        assert_eq!(dep.subscriber_count(), 0);
    }

    #[test]
    fn notify_runs_subscribers_in_subscription_order() {
        let store = observe(json!({"n": 0})).expect("object data");
        let order = Arc::new(Mutex::new(Vec::new()));

        let first = {
            let order = order.clone();
            Watcher::new(Arc::clone(&store), "n", move |_, _| {
                order.lock().expect("order lock").push("first");
            })
            .expect("valid expression")
        };
        let second = {
            let order = order.clone();
            Watcher::new(Arc::clone(&store), "n", move |_, _| {
                order.lock().expect("order lock").push("second");
            })
            .expect("valid expression")
        };

        store.set("n", json!(1));

        assert_eq!(*order.lock().expect("order lock"), vec!["first", "second"]);
        drop((first, second));
    }

    #[test]
    fn removed_subscriber_is_not_notified() {
        let store = observe(json!({"n": 0})).expect("object data");
        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();

        let watcher = Watcher::new(Arc::clone(&store), "n", move |_, _| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        })
        .expect("valid expression");

        store.set("n", json!(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let field = store.field("n").expect("observed field");
        field.dep().remove_sub(&Arc::downgrade(&watcher));

        store.set("n", json!(2));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropped_watcher_falls_out_of_the_registry() {
        let store = observe(json!({"n": 0})).expect("object data");
        let watcher =
            Watcher::new(Arc::clone(&store), "n", |_, _| {}).expect("valid expression");

        let field = store.field("n").expect("observed field");
        assert_eq!(field.subscriber_count(), 1);

        drop(watcher);
        assert_eq!(field.subscriber_count(), 0);

        // Notifying with only dead subscribers left must not fall over.
        store.set("n", json!(1));
    }
}
