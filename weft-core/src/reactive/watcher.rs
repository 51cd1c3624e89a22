//! Tracking unit.
//!
//! A [`Watcher`] represents one computation over the reactive store: a
//! template binding or an explicit watch. It evaluates an expression inside
//! a tracking scope, which causes every field it reads to register the
//! watcher with that field's dependency registry. On notification it
//! re-evaluates, and invokes its callback only when the result actually
//! changed.
//!
//! # Dependency reconciliation
//!
//! Every evaluation re-declares the watcher's full dependency set as a
//! side effect of running. Two id sets are kept: the registries subscribed
//! after the previous evaluation, and the ones collected by the current
//! one. Registries the latest evaluation no longer read get `remove_sub`
//! afterwards, so a conditional expression that stops reading a field
//! stops being notified by it. Registration stays idempotent within one
//! evaluation even when an expression reads the same field several times.

use std::collections::HashSet;
use std::sync::{Arc, RwLock, Weak};

use serde_json::Value;
use tracing::{debug, trace};

use crate::error::ExpressionError;

use super::context::TrackingScope;
use super::dep::Dep;
use super::store::Store;

/// Change callback, invoked with `(new, old)` when a re-evaluation
/// produces a different value. `None` means the expression resolved to
/// nothing.
type Callback = Box<dyn Fn(Option<&Value>, Option<&Value>) + Send + Sync>;

/// Evaluation strategy for a watcher.
enum Evaluator {
    /// A parsed dotted key path, resolved against the store.
    Path(Vec<String>),
    /// A caller-supplied getter.
    Getter(Box<dyn Fn() -> Option<Value> + Send + Sync>),
}

#[derive(Default)]
struct DepSet {
    /// Registries subscribed after the previous evaluation.
    ids: HashSet<u64>,
    deps: Vec<Arc<Dep>>,
    /// Registries touched by the evaluation currently in flight.
    new_ids: HashSet<u64>,
    new_deps: Vec<Arc<Dep>>,
}

/// One computation over the reactive store.
pub struct Watcher {
    store: Arc<Store>,
    evaluator: Evaluator,
    callback: Callback,

    /// Result of the most recent evaluation.
    value: RwLock<Option<Value>>,

    /// Dependency bookkeeping; see the module docs.
    deps: RwLock<DepSet>,

    /// Self-handle passed to registries on subscription.
    this: Weak<Watcher>,
}

impl Watcher {
    /// Create a watcher over a dotted-path expression.
    ///
    /// The expression is parsed up front; anything outside identifier/dot
    /// syntax is rejected here instead of producing a unit that can never
    /// evaluate. Construction evaluates once to seed the cached value and
    /// establish the initial dependency set.
    pub fn new<F>(
        store: Arc<Store>,
        expression: &str,
        callback: F,
    ) -> Result<Arc<Self>, ExpressionError>
    where
        F: Fn(Option<&Value>, Option<&Value>) + Send + Sync + 'static,
    {
        let segments = parse_path(expression)?;
        Ok(Self::build(
            store,
            Evaluator::Path(segments),
            Box::new(callback),
        ))
    }

    /// Create a watcher over a getter function.
    pub fn with_getter<G, F>(store: Arc<Store>, getter: G, callback: F) -> Arc<Self>
    where
        G: Fn() -> Option<Value> + Send + Sync + 'static,
        F: Fn(Option<&Value>, Option<&Value>) + Send + Sync + 'static,
    {
        Self::build(store, Evaluator::Getter(Box::new(getter)), Box::new(callback))
    }

    fn build(store: Arc<Store>, evaluator: Evaluator, callback: Callback) -> Arc<Self> {
        let watcher = Arc::new_cyclic(|this| Self {
            store,
            evaluator,
            callback,
            value: RwLock::new(None),
            deps: RwLock::new(DepSet::default()),
            this: this.clone(),
        });

        let initial = watcher.get();
        *watcher.value.write().expect("value lock poisoned") = initial;
        watcher
    }

    /// Result of the most recent evaluation.
    pub fn value(&self) -> Option<Value> {
        self.value.read().expect("value lock poisoned").clone()
    }

    /// Evaluate inside a tracking scope.
    ///
    /// This is the single path by which dependency discovery happens:
    /// every field read during the evaluation registers its registry with
    /// this watcher. Afterwards, registries the evaluation did not touch
    /// are unsubscribed.
    pub fn get(&self) -> Option<Value> {
        let scope = TrackingScope::enter(self.this.clone());
        let value = match &self.evaluator {
            Evaluator::Path(segments) => resolve_path(&self.store, segments),
            Evaluator::Getter(getter) => getter(),
        };
        drop(scope);

        self.reconcile_deps();
        value
    }

    /// Record a dependency on `dep`, subscribing if this watcher is not
    /// already subscribed. Idempotent within one evaluation.
    pub fn add_dep(&self, dep: &Arc<Dep>) {
        let mut tracked = self.deps.write().expect("deps lock poisoned");
        if tracked.new_ids.insert(dep.id()) {
            tracked.new_deps.push(Arc::clone(dep));
            if !tracked.ids.contains(&dep.id()) {
                dep.add_sub(self.this.clone());
            }
        }
    }

    /// Swap in the freshly collected dependency set and unsubscribe from
    /// registries the latest evaluation did not touch.
    fn reconcile_deps(&self) {
        let mut tracked = self.deps.write().expect("deps lock poisoned");
        let tracked = &mut *tracked;

        for dep in &tracked.deps {
            if !tracked.new_ids.contains(&dep.id()) {
                dep.remove_sub(&self.this);
            }
        }

        std::mem::swap(&mut tracked.ids, &mut tracked.new_ids);
        std::mem::swap(&mut tracked.deps, &mut tracked.new_deps);
        tracked.new_ids.clear();
        tracked.new_deps.clear();
    }

    /// Notification entry point, invoked by a registry's `notify`.
    pub fn update(&self) {
        self.run();
    }

    /// Re-evaluate and invoke the callback if the value changed.
    pub fn run(&self) {
        let new_value = self.get();
        let old_value = self.value.read().expect("value lock poisoned").clone();

        if new_value != old_value {
            *self.value.write().expect("value lock poisoned") = new_value.clone();
            trace!("watcher value changed");
            (self.callback)(new_value.as_ref(), old_value.as_ref());
        }
    }

    /// Number of registries this watcher is currently subscribed to.
    pub fn dep_count(&self) -> usize {
        self.deps.read().expect("deps lock poisoned").ids.len()
    }
}

impl std::fmt::Debug for Watcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watcher")
            .field("value", &self.value())
            .field("dep_count", &self.dep_count())
            .finish()
    }
}

/// Parse a dotted key path, trimming surrounding whitespace.
///
/// Accepted characters are ASCII alphanumerics, `_`, `$` and the `.`
/// separator; every segment must be non-empty.
fn parse_path(expression: &str) -> Result<Vec<String>, ExpressionError> {
    let trimmed = expression.trim();

    if trimmed.is_empty() {
        debug!(expression, "rejected empty watch expression");
        return Err(ExpressionError::Empty);
    }

    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '.')
    {
        debug!(expression, "rejected watch expression with invalid character");
        return Err(ExpressionError::InvalidCharacter(trimmed.to_string()));
    }

    let segments: Vec<String> = trimmed.split('.').map(str::to_owned).collect();
    if segments.iter().any(String::is_empty) {
        debug!(expression, "rejected watch expression with empty segment");
        return Err(ExpressionError::EmptySegment(trimmed.to_string()));
    }

    Ok(segments)
}

/// Resolve a parsed path against the store, left to right.
///
/// A missing key yields `None` for the whole expression. A non-object
/// intermediate also yields `None`, but the read still registers the
/// intermediate field's registry: the expression did read it, and must be
/// re-evaluated when it changes.
fn resolve_path(store: &Arc<Store>, segments: &[String]) -> Option<Value> {
    let (last, walk) = segments.split_last()?;

    let mut current = Arc::clone(store);
    for segment in walk {
        let child = current.field(segment)?.branch();
        current = child?;
    }

    current.field(last).map(|field| field.get())
}
