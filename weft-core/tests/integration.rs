//! Integration tests for the reactive engine.
//!
//! These exercise the full triad (store, registries, watchers) plus the
//! view-model facade, through the public API only.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::json;
use weft_core::{observe, ViewModel, Watcher};

/// The canonical counter scenario: equal writes are suppressed on both
/// sides of a change.
#[test]
fn counter_scenario() {
    let vm = ViewModel::new(json!({"count": 1}));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();

    let _watcher = vm
        .watch("count", move |new, old| {
            seen_clone
                .lock()
                .expect("seen lock")
                .push((new.cloned(), old.cloned()));
        })
        .expect("valid expression");

    vm.set("count", json!(1));
    assert!(seen.lock().expect("seen lock").is_empty());

    vm.set("count", json!(2));
    assert_eq!(
        *seen.lock().expect("seen lock"),
        vec![(Some(json!(2)), Some(json!(1)))]
    );

    vm.set("count", json!(2));
    assert_eq!(seen.lock().expect("seen lock").len(), 1);
}

/// Two watchers on the same path both fire, once each, in subscription
/// order, with the same (new, old) pair.
#[test]
fn two_watchers_on_one_path_both_fire_in_order() {
    let vm = ViewModel::new(json!({"user": {"name": "A"}}));
    let log = Arc::new(Mutex::new(Vec::new()));

    for tag in ["first", "second"] {
        let log_clone = log.clone();
        vm.watch("user.name", move |new, old| {
            log_clone
                .lock()
                .expect("log lock")
                .push((tag, new.cloned(), old.cloned()));
        })
        .expect("valid expression");
    }

    vm.store()
        .child("user")
        .expect("nested store")
        .set("name", json!("B"));

    assert_eq!(
        *log.lock().expect("log lock"),
        vec![
            ("first", Some(json!("B")), Some(json!("A"))),
            ("second", Some(json!("B")), Some(json!("A"))),
        ]
    );
}

/// N writes produce N notification rounds; nothing is coalesced.
#[test]
fn each_write_produces_its_own_notification_round() {
    let store = observe(json!({"n": 0})).expect("object data");
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();

    let _watcher = Watcher::new(Arc::clone(&store), "n", move |new, _| {
        seen_clone.lock().expect("seen lock").push(new.cloned());
    })
    .expect("valid expression");

    store.set("n", json!(1));
    store.set("n", json!(2));
    store.set("n", json!(3));

    assert_eq!(
        *seen.lock().expect("seen lock"),
        vec![Some(json!(1)), Some(json!(2)), Some(json!(3))]
    );
}

/// A callback that writes another reactive field triggers the dependent
/// watcher on the same call stack.
#[test]
fn cascaded_write_from_callback_runs_synchronously() {
    let store = observe(json!({"a": 0, "b": 0})).expect("object data");
    let seen_b = Arc::new(Mutex::new(Vec::new()));

    let cascade_store = Arc::clone(&store);
    let _forwarder = Watcher::new(Arc::clone(&store), "a", move |new, _| {
        let doubled = new.and_then(|v| v.as_i64()).map(|n| n * 2);
        cascade_store.set("b", json!(doubled));
    })
    .expect("valid expression");

    let seen_clone = seen_b.clone();
    let _recorder = Watcher::new(Arc::clone(&store), "b", move |new, _| {
        seen_clone.lock().expect("seen lock").push(new.cloned());
    })
    .expect("valid expression");

    store.set("a", json!(3));
    assert_eq!(*seen_b.lock().expect("seen lock"), vec![Some(json!(6))]);
}

/// A callback that writes two fields read by one unit runs that unit once
/// per write: one external write, two re-evaluations, two callbacks.
#[test]
fn one_external_write_can_run_a_unit_once_per_cascaded_field() {
    let store = observe(json!({"trigger": 0, "a": 1, "b": 2})).expect("object data");
    let evals = Arc::new(AtomicI32::new(0));
    let sum_calls = Arc::new(AtomicI32::new(0));

    let evals_clone = evals.clone();
    let getter_store = Arc::clone(&store);
    let sum_calls_clone = sum_calls.clone();
    let _sum = Watcher::with_getter(
        Arc::clone(&store),
        move || {
            evals_clone.fetch_add(1, Ordering::SeqCst);
            let a = getter_store.get("a")?.as_i64()?;
            let b = getter_store.get("b")?.as_i64()?;
            Some(json!(a + b))
        },
        move |_, _| {
            sum_calls_clone.fetch_add(1, Ordering::SeqCst);
        },
    );
    assert_eq!(evals.load(Ordering::SeqCst), 1);

    let writer_store = Arc::clone(&store);
    let _writer = Watcher::new(Arc::clone(&store), "trigger", move |_, _| {
        writer_store.set("a", json!(10));
        writer_store.set("b", json!(20));
    })
    .expect("valid expression");

    store.set("trigger", json!(1));

    assert_eq!(evals.load(Ordering::SeqCst), 3);
    assert_eq!(sum_calls.load(Ordering::SeqCst), 2);
}

/// Replacing a subtree re-observes it: a path watcher over the old shape
/// picks up the new shape, and the new fields notify independently.
#[test]
fn replaced_subtree_becomes_trackable() {
    let store = observe(json!({"child": {"x": 1}})).expect("object data");
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();

    let _watcher = Watcher::new(Arc::clone(&store), "child.d", move |new, old| {
        seen_clone
            .lock()
            .expect("seen lock")
            .push((new.cloned(), old.cloned()));
    })
    .expect("valid expression");

    store.set("child", json!({"d": 1}));
    assert_eq!(
        *seen.lock().expect("seen lock"),
        vec![(Some(json!(1)), None)]
    );

    store
        .child("child")
        .expect("replacement observed")
        .set("d", json!(2));
    assert_eq!(
        seen.lock().expect("seen lock").last(),
        Some(&(Some(json!(2)), Some(json!(1))))
    );
}

/// A panicking callback propagates and aborts the rest of that
/// notification round; later subscribers are never reached.
#[test]
fn callback_panic_aborts_remaining_subscribers() {
    let store = observe(json!({"n": 0})).expect("object data");
    let later_calls = Arc::new(AtomicI32::new(0));

    let _panicking = Watcher::new(Arc::clone(&store), "n", |_, _| {
        panic!("callback failure");
    })
    .expect("valid expression");

    let later_clone = later_calls.clone();
    let _recording = Watcher::new(Arc::clone(&store), "n", move |_, _| {
        later_clone.fetch_add(1, Ordering::SeqCst);
    })
    .expect("valid expression");

    let result = catch_unwind(AssertUnwindSafe(|| store.set("n", json!(1))));
    assert!(result.is_err());
    assert_eq!(later_calls.load(Ordering::SeqCst), 0);
}

/// Reads that happen inside a computed getter still register with the
/// evaluating watcher: a getter-based watcher over a computed property
/// re-runs when the data underneath the computed changes.
#[test]
fn computed_reads_track_through_to_watchers() {
    let vm = Arc::new(
        ViewModel::new(json!({"price": 2, "qty": 3})).computed("total", |vm| {
            let price = vm.get("price")?.as_i64()?;
            let qty = vm.get("qty")?.as_i64()?;
            Some(json!(price * qty))
        }),
    );

    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();
    let getter_vm = Arc::clone(&vm);
    let _watcher = Watcher::with_getter(
        Arc::clone(vm.store()),
        move || getter_vm.get("total"),
        move |new, _| {
            seen_clone.lock().expect("seen lock").push(new.cloned());
        },
    );

    vm.set("price", json!(5));
    assert_eq!(*seen.lock().expect("seen lock"), vec![Some(json!(15))]);
}
