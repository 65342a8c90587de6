//! Insertion-ordered map and set stores.
//!
//! Keys and members use SameValueZero equality, so `NaN` finds `NaN` and
//! `-0` finds `+0`. Removal keeps the remaining entries in insertion order.
//! Iteration helpers return snapshots, so callers may mutate the store while
//! walking the result.

use crate::observed::Marker;
use crate::value::Value;
use crate::weak::Identity;
use indexmap::{IndexMap, IndexSet};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Shared interior of a map store.
pub struct MapStore {
    entries: RefCell<IndexMap<Value, Value>>,
    marker: Marker,
}

/// A shared handle to an insertion-ordered map.
#[derive(Clone)]
pub struct MapRef(Rc<MapStore>);

impl Default for MapRef {
    fn default() -> Self {
        Self::new()
    }
}

impl MapRef {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self(Rc::new(MapStore {
            entries: RefCell::new(IndexMap::new()),
            marker: Marker::default(),
        }))
    }

    /// Creates a map from entries. Later duplicates overwrite earlier ones.
    pub fn from_entries<K, V, I>(entries: I) -> Self
    where
        K: Into<Value>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let map = Self::new();
        map.0
            .entries
            .borrow_mut()
            .extend(entries.into_iter().map(|(k, v)| (k.into(), v.into())));
        map
    }

    pub(crate) fn from_inner(inner: Rc<MapStore>) -> Self {
        Self(inner)
    }

    pub(crate) fn inner(&self) -> &Rc<MapStore> {
        &self.0
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &Value) -> Option<Value> {
        self.0.entries.borrow().get(key).cloned()
    }

    /// Returns true if `key` has an entry.
    pub fn has(&self, key: &Value) -> bool {
        self.0.entries.borrow().contains_key(key)
    }

    /// Stores `value` under `key`, returning the previous value.
    pub fn set(&self, key: Value, value: Value) -> Option<Value> {
        self.0.entries.borrow_mut().insert(key, value)
    }

    /// Removes the entry under `key`, returning its value.
    pub fn delete(&self, key: &Value) -> Option<Value> {
        self.0.entries.borrow_mut().shift_remove(key)
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.0.entries.borrow_mut().clear();
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.0.entries.borrow().len()
    }

    /// Returns true if the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a snapshot of the entries in insertion order.
    pub fn entries(&self) -> Vec<(Value, Value)> {
        self.0
            .entries
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Returns a snapshot of the keys in insertion order.
    pub fn keys(&self) -> Vec<Value> {
        self.0.entries.borrow().keys().cloned().collect()
    }

    /// Returns a snapshot of the values in insertion order.
    pub fn values(&self) -> Vec<Value> {
        self.0.entries.borrow().values().cloned().collect()
    }

    /// Calls `f(value, key)` for each entry of a snapshot.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&Value, &Value),
    {
        for (key, value) in self.entries() {
            f(&value, &key);
        }
    }

    /// Returns the identity marker slot.
    #[inline]
    pub fn marker(&self) -> &Marker {
        &self.0.marker
    }

    /// Returns the identity of this store.
    #[inline]
    pub fn identity(&self) -> Identity {
        Identity::of(&self.0)
    }

    /// Returns true if both handles refer to the same store.
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for MapRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.0.entries.borrow().iter()).finish()
    }
}

/// Shared interior of a set store.
pub struct SetStore {
    values: RefCell<IndexSet<Value>>,
    marker: Marker,
}

/// A shared handle to an insertion-ordered set.
#[derive(Clone)]
pub struct SetRef(Rc<SetStore>);

impl Default for SetRef {
    fn default() -> Self {
        Self::new()
    }
}

impl SetRef {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self(Rc::new(SetStore {
            values: RefCell::new(IndexSet::new()),
            marker: Marker::default(),
        }))
    }

    /// Creates a set from values.
    pub fn from_values<V, I>(values: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        let set = Self::new();
        set.0
            .values
            .borrow_mut()
            .extend(values.into_iter().map(Into::into));
        set
    }

    pub(crate) fn from_inner(inner: Rc<SetStore>) -> Self {
        Self(inner)
    }

    pub(crate) fn inner(&self) -> &Rc<SetStore> {
        &self.0
    }

    /// Returns true if `value` is a member.
    pub fn has(&self, value: &Value) -> bool {
        self.0.values.borrow().contains(value)
    }

    /// Adds `value`. Returns true if it was not already present.
    pub fn add(&self, value: Value) -> bool {
        self.0.values.borrow_mut().insert(value)
    }

    /// Removes `value`. Returns true if it was present.
    pub fn delete(&self, value: &Value) -> bool {
        self.0.values.borrow_mut().shift_remove(value)
    }

    /// Removes every member.
    pub fn clear(&self) {
        self.0.values.borrow_mut().clear();
    }

    /// Returns the number of members.
    pub fn len(&self) -> usize {
        self.0.values.borrow().len()
    }

    /// Returns true if the set has no members.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a snapshot of the members in insertion order.
    pub fn values(&self) -> Vec<Value> {
        self.0.values.borrow().iter().cloned().collect()
    }

    /// Returns a snapshot of `(value, value)` pairs, mirroring map entries.
    pub fn entries(&self) -> Vec<(Value, Value)> {
        self.0
            .values
            .borrow()
            .iter()
            .map(|v| (v.clone(), v.clone()))
            .collect()
    }

    /// Calls `f(value)` for each member of a snapshot.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&Value),
    {
        for value in self.values() {
            f(&value);
        }
    }

    /// Returns the identity marker slot.
    #[inline]
    pub fn marker(&self) -> &Marker {
        &self.0.marker
    }

    /// Returns the identity of this store.
    #[inline]
    pub fn identity(&self) -> Identity {
        Identity::of(&self.0)
    }

    /// Returns true if both handles refer to the same store.
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for SetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.values.borrow().iter()).finish()
    }
}
