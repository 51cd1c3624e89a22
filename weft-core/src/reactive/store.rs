//! Reactive store.
//!
//! [`observe`] walks a JSON object and wraps every key in a reactive
//! field: a slot holding the current value plus one dependency registry,
//! created at first observation and kept for the field's whole lifetime.
//! Reads register the currently evaluating watcher; writes suppress
//! strictly-equal values, re-observe replaced objects so nested reactivity
//! survives replacement, and notify subscribers last.
//!
//! # Shape
//!
//! A [`Store`] is an insertion-ordered map of field name to [`Field`]. A
//! field whose value is itself an object holds a nested store in its slot,
//! so an observed tree mirrors the data tree. The field set is fixed when
//! the object is observed: keys added to the source data afterwards are
//! never made reactive.

use std::sync::{Arc, RwLock};

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::trace;

use super::dep::Dep;

/// Observe a value, returning a reactive store wrapping it.
///
/// Only objects are observable; any other value yields `None`. This is a
/// deliberate limitation, not an error.
pub fn observe(value: Value) -> Option<Arc<Store>> {
    match value {
        Value::Object(map) => Some(Store::from_object(map)),
        _ => None,
    }
}

/// An observed object: one reactive field per key.
pub struct Store {
    fields: IndexMap<String, Arc<Field>>,
}

impl Store {
    /// An observed object with no fields.
    pub fn empty() -> Arc<Self> {
        Arc::new(Self {
            fields: IndexMap::new(),
        })
    }

    fn from_object(map: Map<String, Value>) -> Arc<Self> {
        trace!(fields = map.len(), "observing object");

        let mut fields = IndexMap::with_capacity(map.len());
        for (key, value) in map {
            fields.insert(key, Arc::new(Field::new(value)));
        }
        Arc::new(Self { fields })
    }

    /// Look up a field by key.
    pub fn field(&self, key: &str) -> Option<&Arc<Field>> {
        self.fields.get(key)
    }

    /// Read a field's current value, registering a dependency if a watcher
    /// is evaluating. `None` if the key was not present at observation.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.fields.get(key).map(|field| field.get())
    }

    /// Write a field.
    ///
    /// Returns `false` if the key was not present at observation time;
    /// such writes are rejected rather than stored as untracked state.
    pub fn set(&self, key: &str, value: Value) -> bool {
        match self.fields.get(key) {
            Some(field) => {
                field.set(value);
                true
            }
            None => false,
        }
    }

    /// The nested store under `key`, if that field currently holds an
    /// object. Untracked structural access for external writers.
    pub fn child(&self, key: &str) -> Option<Arc<Store>> {
        self.fields.get(key).and_then(|field| field.child())
    }

    /// Field names, in observation order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Number of observed fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Rebuild a plain value from the current field contents, untracked.
    pub fn snapshot(&self) -> Value {
        let mut map = Map::new();
        for (key, field) in &self.fields {
            map.insert(key.clone(), field.get_untracked());
        }
        Value::Object(map)
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// One reactive field: the current value plus its dependency registry.
///
/// The registry is created exactly once, here, and survives every
/// overwrite of the value; only the slot contents are replaced.
pub struct Field {
    dep: Arc<Dep>,
    slot: RwLock<Slot>,
}

enum Slot {
    /// A non-object value.
    Leaf(Value),
    /// An object value, held in its observed form.
    Branch(Arc<Store>),
}

impl Slot {
    fn wrap(value: Value) -> Self {
        match value {
            Value::Object(map) => Slot::Branch(Store::from_object(map)),
            other => Slot::Leaf(other),
        }
    }
}

impl Field {
    fn new(value: Value) -> Self {
        Self {
            dep: Dep::new(),
            slot: RwLock::new(Slot::wrap(value)),
        }
    }

    /// Read accessor. Registers the currently evaluating watcher with this
    /// field's registry, then returns the current value (a snapshot for
    /// object-valued fields).
    pub fn get(&self) -> Value {
        self.dep.depend();
        self.get_untracked()
    }

    /// Read without dependency registration.
    pub fn get_untracked(&self) -> Value {
        match &*self.slot.read().expect("slot lock poisoned") {
            Slot::Leaf(value) => value.clone(),
            Slot::Branch(store) => store.snapshot(),
        }
    }

    /// The nested store, if this field currently holds an object.
    pub fn child(&self) -> Option<Arc<Store>> {
        match &*self.slot.read().expect("slot lock poisoned") {
            Slot::Branch(store) => Some(Arc::clone(store)),
            Slot::Leaf(_) => None,
        }
    }

    /// The nested store, registering a dependency on this field first.
    ///
    /// `None` when the current value is not an object; the read still
    /// counts for tracking, mirroring a nullish-intermediate path read.
    pub(crate) fn branch(&self) -> Option<Arc<Store>> {
        self.dep.depend();
        self.child()
    }

    /// Write accessor.
    ///
    /// A leaf write strictly equal to the current leaf is suppressed: no
    /// notification, no re-observation. Anything else replaces the slot,
    /// re-observing object values, and then notifies. An object write
    /// always notifies: a freshly built object is never the stored one.
    pub fn set(&self, value: Value) {
        {
            let mut slot = self.slot.write().expect("slot lock poisoned");
            if let Slot::Leaf(current) = &*slot {
                if *current == value {
                    return;
                }
            }
            *slot = Slot::wrap(value);
        }
        self.dep.notify();
    }

    pub(crate) fn dep(&self) -> &Arc<Dep> {
        &self.dep
    }

    /// Number of watchers currently subscribed to this field.
    pub fn subscriber_count(&self) -> usize {
        self.dep.subscriber_count()
    }
}

impl std::fmt::Debug for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Field")
            .field("dep", &self.dep.id())
            .field("value", &self.get_untracked())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
