//! View-model facade.
//!
//! A thin boundary layer over the reactive core: a data proxy mirroring
//! the root store's top-level keys, the computed-property facade, and the
//! explicit watch API. No tracking logic lives here.

use std::sync::{Arc, RwLock};

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::error::ExpressionError;
use crate::reactive::{observe, Store, Watcher};

type ComputedGetter = Box<dyn Fn(&ViewModel) -> Option<Value> + Send + Sync>;

/// A view-model: an observed data object plus the accessors a view layer
/// binds against.
///
/// Watchers created through [`watch`](ViewModel::watch) live exactly as
/// long as the view-model that created them.
pub struct ViewModel {
    data: Arc<Store>,
    computed: IndexMap<String, ComputedGetter>,
    watchers: RwLock<Vec<Arc<Watcher>>>,
}

impl ViewModel {
    /// Build a view-model over a data object.
    ///
    /// Non-object data yields an empty (but valid) model, mirroring the
    /// engine's rule that only objects are observable.
    pub fn new(data: Value) -> Self {
        let data = observe(data).unwrap_or_else(Store::empty);
        Self {
            data,
            computed: IndexMap::new(),
            watchers: RwLock::new(Vec::new()),
        }
    }

    /// Build a view-model from any serializable value.
    pub fn from_data<T: Serialize>(data: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::to_value(data)?))
    }

    /// Register a computed property.
    ///
    /// The getter runs on every read of `name`; nothing caches or
    /// invalidates it. Computed keys shadow same-named data keys, and
    /// writes to them are ignored.
    pub fn computed<F>(mut self, name: impl Into<String>, getter: F) -> Self
    where
        F: Fn(&ViewModel) -> Option<Value> + Send + Sync + 'static,
    {
        self.computed.insert(name.into(), Box::new(getter));
        self
    }

    /// The observed root store.
    pub fn store(&self) -> &Arc<Store> {
        &self.data
    }

    /// Read a top-level key: computed first, then the data proxy.
    pub fn get(&self, key: &str) -> Option<Value> {
        if let Some(getter) = self.computed.get(key) {
            return getter(self);
        }
        self.data.get(key)
    }

    /// Write a top-level data key, delegating to the underlying field.
    ///
    /// Returns `false` for computed keys (their setter is a no-op) and for
    /// keys that were not present at observation time.
    pub fn set(&self, key: &str, value: Value) -> bool {
        if self.computed.contains_key(key) {
            return false;
        }
        self.data.set(key, value)
    }

    /// Watch a dotted-path expression. The callback receives `(new, old)`
    /// whenever the expression's value changes.
    pub fn watch<F>(&self, expression: &str, callback: F) -> Result<Arc<Watcher>, ExpressionError>
    where
        F: Fn(Option<&Value>, Option<&Value>) + Send + Sync + 'static,
    {
        let watcher = Watcher::new(Arc::clone(&self.data), expression, callback)?;
        self.watchers
            .write()
            .expect("watchers lock poisoned")
            .push(Arc::clone(&watcher));
        Ok(watcher)
    }
}

impl std::fmt::Debug for ViewModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewModel")
            .field("data", &self.data)
            .field("computed", &self.computed.keys().collect::<Vec<_>>())
            .field(
                "watchers",
                &self.watchers.read().expect("watchers lock poisoned").len(),
            )
            .finish()
    }
}
