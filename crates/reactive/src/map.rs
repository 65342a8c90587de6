//! Observable map wrappers.
//!
//! Four variants share one contract: `set` broadcasts `EventKey::Set` unless
//! the entry already holds the same value, `delete` broadcasts
//! `EventKey::Delete` only when an entry was removed, and reads pass
//! through. The recursive variants wrap what they store and keep identity
//! maps so lookups accept either a raw key or its wrapper.

use crate::node::{Node, Observable, State};
use crate::observe::observe;
use crate::options::ObserveOptions;
use hashbrown::HashMap;
use std::cell::RefCell;
use std::rc::Rc;
use vigil_core::{
    Detail, Error, EventKey, MapRef, ObservedKind, ObservedRef, Op, Result, Value, WeakMapRef,
    WeakTable, WeakValue,
};

fn entry(key: Value, value: Value) -> Detail {
    Detail::Entry { key, value }
}

fn require_identity(key: &Value) -> Result<()> {
    match key.identity() {
        Some(_) => Ok(()),
        None => Err(Error::invalid_weak_key(key.type_name())),
    }
}

pub(crate) struct MapState {
    target: MapRef,
}

impl State for MapState {
    const KIND: ObservedKind = ObservedKind::Map;

    fn target(&self) -> Value {
        Value::Map(self.target.clone())
    }
}

/// An observable insertion-ordered map.
///
/// # Example
///
/// ```rust
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use vigil_core::{listener, EventKey, Value};
/// use vigil_reactive::{Observable, ObservableMap};
///
/// let map = ObservableMap::new();
/// let count = Rc::new(RefCell::new(0));
/// let count_clone = count.clone();
/// map.on(EventKey::Set, listener(move |_| *count_clone.borrow_mut() += 1));
///
/// map.set("k", 1);
/// map.set("k", 1);
/// assert_eq!(*count.borrow(), 1);
/// assert_eq!(map.get(&Value::from("k")), Some(Value::from(1)));
/// ```
#[derive(Clone)]
pub struct ObservableMap(Rc<Node<MapState>>);

impl Default for ObservableMap {
    fn default() -> Self {
        Self::new()
    }
}

impl ObservableMap {
    /// Creates an empty observable map.
    pub fn new() -> Self {
        Self::wrap(MapRef::new(), None)
    }

    /// Wraps `target` without emitting for its existing entries.
    pub fn wrap(target: MapRef, parent: Option<&ObservedRef>) -> Self {
        Self(Node::create(MapState { target }, parent))
    }

    /// Wraps `target`. With `emit_on_construction`, the existing entries are
    /// removed and re-inserted through [`set`](Self::set).
    pub fn with_options(
        target: MapRef,
        options: &ObserveOptions,
        parent: Option<&ObservedRef>,
    ) -> Self {
        let map = Self::wrap(target.clone(), parent);
        if options.emit_on_construction {
            let entries = target.entries();
            target.clear();
            for (key, value) in entries {
                map.set(key, value);
            }
        }
        map
    }

    /// Creates an observable map holding `entries`.
    pub fn from_entries<K, V, I>(
        entries: I,
        options: &ObserveOptions,
        parent: Option<&ObservedRef>,
    ) -> Self
    where
        K: Into<Value>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::with_options(MapRef::from_entries(entries), options, parent)
    }

    /// Returns the wrapper held by `value`, if it is an observable map.
    pub fn from_value(value: &Value) -> Option<Self> {
        value.as_observed()?.downcast::<Node<MapState>>().map(Self)
    }

    /// Returns the underlying map.
    pub fn target(&self) -> MapRef {
        self.0.state.target.clone()
    }

    /// Stores `value` under `key`.
    pub fn set(&self, key: impl Into<Value>, value: impl Into<Value>) -> &Self {
        let key = key.into();
        let value = value.into();
        let target = &self.0.state.target;
        let unchanged = target
            .get(&key)
            .is_some_and(|current| current.strict_equals(&value));
        target.set(key.clone(), value.clone());
        if !unchanged {
            self.0.broadcast(EventKey::Set, Op::Set, entry(key, value));
        }
        self
    }

    /// Removes the entry under `key`. Returns true if one was removed.
    pub fn delete(&self, key: &Value) -> bool {
        match self.0.state.target.delete(key) {
            Some(value) => {
                self.0
                    .broadcast(EventKey::Delete, Op::Delete, entry(key.clone(), value));
                true
            }
            None => false,
        }
    }

    /// Removes every entry, broadcasting `EventKey::Clear` if there were any.
    pub fn clear(&self) {
        let target = &self.0.state.target;
        let empty = target.is_empty();
        target.clear();
        if !empty {
            self.0.broadcast(EventKey::Clear, Op::Clear, Detail::Cleared);
        }
    }

    pub fn get(&self, key: &Value) -> Option<Value> {
        self.0.state.target.get(key)
    }

    pub fn has(&self, key: &Value) -> bool {
        self.0.state.target.has(key)
    }

    pub fn len(&self) -> usize {
        self.0.state.target.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.state.target.is_empty()
    }

    pub fn entries(&self) -> Vec<(Value, Value)> {
        self.0.state.target.entries()
    }

    pub fn keys(&self) -> Vec<Value> {
        self.0.state.target.keys()
    }

    pub fn values(&self) -> Vec<Value> {
        self.0.state.target.values()
    }

    /// Calls `f(value, key)` for each entry of a snapshot.
    pub fn for_each<F>(&self, f: F)
    where
        F: FnMut(&Value, &Value),
    {
        self.0.state.target.for_each(f);
    }
}

impl Observable for ObservableMap {
    fn as_observed(&self) -> ObservedRef {
        self.0.observed()
    }
}

pub(crate) struct RecursiveMapState {
    target: MapRef,
    options: ObserveOptions,
    /// Unwrapped key -> key as stored.
    keys: RefCell<HashMap<Value, Value>>,
    /// Unwrapped key -> unwrapped stored value.
    values: RefCell<HashMap<Value, Value>>,
}

impl State for RecursiveMapState {
    const KIND: ObservedKind = ObservedKind::RecursiveMap;

    fn target(&self) -> Value {
        Value::Map(self.target.clone())
    }
}

/// An observable map that wraps its keys and values.
///
/// Nested wrappers report to this map's parent, or to this map when it has
/// none.
#[derive(Clone)]
pub struct RecursiveObservableMap(Rc<Node<RecursiveMapState>>);

impl Default for RecursiveObservableMap {
    fn default() -> Self {
        Self::wrap(MapRef::new(), &ObserveOptions::deep(), None)
    }
}

impl RecursiveObservableMap {
    /// Wraps `target`, replacing its entries by their wrapped forms.
    ///
    /// Construction is silent unless `emit_on_construction` is set, in which
    /// case every entry goes through [`set`](Self::set).
    pub fn wrap(target: MapRef, options: &ObserveOptions, parent: Option<&ObservedRef>) -> Self {
        let state = RecursiveMapState {
            target: target.clone(),
            options: options.nested(),
            keys: RefCell::new(HashMap::new()),
            values: RefCell::new(HashMap::new()),
        };
        let map = Self(Node::create(state, parent));

        let entries = target.entries();
        target.clear();
        for (key, value) in entries {
            if options.emit_on_construction {
                map.set(key, value);
            } else {
                map.install(key, value);
            }
        }
        map
    }

    /// Creates a recursive observable map holding `entries`.
    pub fn from_entries<K, V, I>(
        entries: I,
        options: &ObserveOptions,
        parent: Option<&ObservedRef>,
    ) -> Self
    where
        K: Into<Value>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::wrap(MapRef::from_entries(entries), options, parent)
    }

    /// Returns the wrapper held by `value`, if it is a recursive observable map.
    pub fn from_value(value: &Value) -> Option<Self> {
        value
            .as_observed()?
            .downcast::<Node<RecursiveMapState>>()
            .map(Self)
    }

    /// Returns the underlying map. It holds the wrapped keys and values.
    pub fn target(&self) -> MapRef {
        self.0.state.target.clone()
    }

    fn wrap_child(&self, value: &Value) -> Value {
        observe(value, &self.0.state.options, Some(&self.0.route()))
    }

    /// Stores an entry without emitting.
    fn install(&self, key: Value, value: Value) {
        let state = &self.0.state;
        let key = self.wrap_child(&key);
        let value = self.wrap_child(&value);
        let canonical = key.unwrapped();
        state.keys.borrow_mut().insert(canonical.clone(), key.clone());
        state.values.borrow_mut().insert(canonical, value.unwrapped());
        state.target.set(key, value);
    }

    /// Maps a raw or wrapped key to the key as stored.
    fn resolve(&self, key: &Value) -> Value {
        self.0
            .state
            .keys
            .borrow()
            .get(&key.unwrapped())
            .cloned()
            .unwrap_or_else(|| key.clone())
    }

    /// Stores `value` under `key`, both wrapped.
    ///
    /// Emits when the key is new or when the unwrapped value differs from the
    /// one stored; rewriting the same underlying value is silent.
    pub fn set(&self, key: impl Into<Value>, value: impl Into<Value>) -> &Self {
        let state = &self.0.state;
        let key = self.wrap_child(&key.into());
        let value = self.wrap_child(&value.into());
        let canonical = key.unwrapped();
        let unwrapped_value = value.unwrapped();

        let stored_key = state.keys.borrow().get(&canonical).cloned();
        let emit_key = match stored_key {
            Some(stored_key) => {
                let unchanged = state
                    .values
                    .borrow()
                    .get(&canonical)
                    .is_some_and(|previous| previous.strict_equals(&unwrapped_value));
                if unchanged {
                    return self;
                }
                state.values.borrow_mut().insert(canonical, unwrapped_value);
                state.target.set(stored_key.clone(), value.clone());
                stored_key
            }
            None => {
                state.keys.borrow_mut().insert(canonical.clone(), key.clone());
                state.values.borrow_mut().insert(canonical, unwrapped_value);
                state.target.set(key.clone(), value.clone());
                key
            }
        };
        self.0.broadcast(EventKey::Set, Op::Set, entry(emit_key, value));
        self
    }

    /// Returns the value stored under `key` or under its wrapper.
    pub fn get(&self, key: &Value) -> Option<Value> {
        self.0.state.target.get(&self.resolve(key))
    }

    /// Returns true if `key`, raw or wrapped, has an entry.
    pub fn has(&self, key: &Value) -> bool {
        self.0.state.target.has(key) || self.0.state.keys.borrow().contains_key(&key.unwrapped())
    }

    /// Removes the entry under `key`, raw or wrapped.
    pub fn delete(&self, key: &Value) -> bool {
        let state = &self.0.state;
        let stored_key = self.resolve(key);
        let canonical = key.unwrapped();
        state.keys.borrow_mut().remove(&canonical);
        state.values.borrow_mut().remove(&canonical);
        match state.target.delete(&stored_key) {
            Some(value) => {
                self.0
                    .broadcast(EventKey::Delete, Op::Delete, entry(stored_key, value));
                true
            }
            None => false,
        }
    }

    /// Removes every entry and forgets the identity maps.
    pub fn clear(&self) {
        let state = &self.0.state;
        let empty = state.target.is_empty();
        state.target.clear();
        state.keys.borrow_mut().clear();
        state.values.borrow_mut().clear();
        if !empty {
            self.0.broadcast(EventKey::Clear, Op::Clear, Detail::Cleared);
        }
    }

    pub fn len(&self) -> usize {
        self.0.state.target.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.state.target.is_empty()
    }

    pub fn entries(&self) -> Vec<(Value, Value)> {
        self.0.state.target.entries()
    }

    pub fn keys(&self) -> Vec<Value> {
        self.0.state.target.keys()
    }

    pub fn values(&self) -> Vec<Value> {
        self.0.state.target.values()
    }

    /// Calls `f(value, key)` for each entry of a snapshot.
    pub fn for_each<F>(&self, f: F)
    where
        F: FnMut(&Value, &Value),
    {
        self.0.state.target.for_each(f);
    }
}

impl Observable for RecursiveObservableMap {
    fn as_observed(&self) -> ObservedRef {
        self.0.observed()
    }
}

pub(crate) struct WeakMapState {
    target: WeakMapRef,
}

impl State for WeakMapState {
    const KIND: ObservedKind = ObservedKind::WeakMap;

    fn target(&self) -> Value {
        Value::WeakMap(self.target.clone())
    }
}

/// An observable weak map. Keys must be reference values.
#[derive(Clone)]
pub struct ObservableWeakMap(Rc<Node<WeakMapState>>);

impl Default for ObservableWeakMap {
    fn default() -> Self {
        Self::new()
    }
}

impl ObservableWeakMap {
    /// Creates an empty observable weak map.
    pub fn new() -> Self {
        Self::wrap(WeakMapRef::new(), None)
    }

    /// Wraps `target` as is.
    pub fn wrap(target: WeakMapRef, parent: Option<&ObservedRef>) -> Self {
        Self(Node::create(WeakMapState { target }, parent))
    }

    /// Creates an observable weak map holding `entries`.
    ///
    /// Fails on the first entry whose key is not a reference value.
    pub fn from_entries<I>(
        entries: I,
        options: &ObserveOptions,
        parent: Option<&ObservedRef>,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = (Value, Value)>,
    {
        if !options.emit_on_construction {
            return Ok(Self::wrap(WeakMapRef::from_entries(entries)?, parent));
        }
        let map = Self::wrap(WeakMapRef::new(), parent);
        for (key, value) in entries {
            map.set(key, value)?;
        }
        Ok(map)
    }

    /// Returns the wrapper held by `value`, if it is an observable weak map.
    pub fn from_value(value: &Value) -> Option<Self> {
        value
            .as_observed()?
            .downcast::<Node<WeakMapState>>()
            .map(Self)
    }

    /// Returns the underlying weak map.
    pub fn target(&self) -> WeakMapRef {
        self.0.state.target.clone()
    }

    /// Stores `value` under `key`.
    pub fn set(&self, key: impl Into<Value>, value: impl Into<Value>) -> Result<&Self> {
        let key = key.into();
        let value = value.into();
        let target = &self.0.state.target;
        let unchanged = target
            .get(&key)
            .is_some_and(|current| current.strict_equals(&value));
        target.set(&key, value.clone())?;
        if !unchanged {
            self.0.broadcast(EventKey::Set, Op::Set, entry(key, value));
        }
        Ok(self)
    }

    /// Removes the entry under `key`. Returns true if one was removed.
    pub fn delete(&self, key: &Value) -> bool {
        let target = &self.0.state.target;
        let value = target.get(key).unwrap_or_default();
        let removed = target.delete(key);
        if removed {
            self.0
                .broadcast(EventKey::Delete, Op::Delete, entry(key.clone(), value));
        }
        removed
    }

    pub fn get(&self, key: &Value) -> Option<Value> {
        self.0.state.target.get(key)
    }

    pub fn has(&self, key: &Value) -> bool {
        self.0.state.target.has(key)
    }

    /// Drops entries whose keys are dead. Returns the count.
    pub fn purge(&self) -> usize {
        self.0.state.target.purge()
    }
}

impl Observable for ObservableWeakMap {
    fn as_observed(&self) -> ObservedRef {
        self.0.observed()
    }
}

pub(crate) struct RecursiveWeakMapState {
    /// Keyed by the unwrapped key.
    target: WeakMapRef,
    options: ObserveOptions,
    /// Unwrapped key -> key as first given, for event payloads.
    keys: RefCell<WeakTable<WeakValue>>,
    /// Unwrapped key -> unwrapped stored value.
    values: RefCell<WeakTable<Value>>,
}

impl State for RecursiveWeakMapState {
    const KIND: ObservedKind = ObservedKind::RecursiveWeakMap;

    fn target(&self) -> Value {
        Value::WeakMap(self.target.clone())
    }
}

/// An observable weak map that wraps its values.
///
/// Entries are keyed by the unwrapped identity of the key, so a raw key and
/// its wrapper address the same entry.
#[derive(Clone)]
pub struct RecursiveObservableWeakMap(Rc<Node<RecursiveWeakMapState>>);

impl Default for RecursiveObservableWeakMap {
    fn default() -> Self {
        Self::wrap(WeakMapRef::new(), &ObserveOptions::deep(), None)
    }
}

impl RecursiveObservableWeakMap {
    /// Wraps `target`. Entries already in the store are kept as they are.
    pub fn wrap(
        target: WeakMapRef,
        options: &ObserveOptions,
        parent: Option<&ObservedRef>,
    ) -> Self {
        let state = RecursiveWeakMapState {
            target,
            options: options.nested(),
            keys: RefCell::new(WeakTable::new()),
            values: RefCell::new(WeakTable::new()),
        };
        Self(Node::create(state, parent))
    }

    /// Creates a recursive observable weak map holding `entries`.
    pub fn from_entries<I>(
        entries: I,
        options: &ObserveOptions,
        parent: Option<&ObservedRef>,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = (Value, Value)>,
    {
        let map = Self::wrap(WeakMapRef::new(), options, parent);
        for (key, value) in entries {
            if options.emit_on_construction {
                map.set(key, value)?;
            } else {
                map.install(key, value)?;
            }
        }
        Ok(map)
    }

    /// Returns the wrapper held by `value`, if it is a recursive observable
    /// weak map.
    pub fn from_value(value: &Value) -> Option<Self> {
        value
            .as_observed()?
            .downcast::<Node<RecursiveWeakMapState>>()
            .map(Self)
    }

    /// Returns the underlying weak map.
    pub fn target(&self) -> WeakMapRef {
        self.0.state.target.clone()
    }

    fn wrap_child(&self, value: &Value) -> Value {
        observe(value, &self.0.state.options, Some(&self.0.route()))
    }

    /// Records the key and value bookkeeping and stores the entry.
    fn store(&self, key: &Value, canonical: &Value, value: &Value) -> Result<()> {
        let state = &self.0.state;
        state.target.set(canonical, value.clone())?;
        let mut keys = state.keys.borrow_mut();
        if !keys.contains_key(canonical) {
            if let Some(weak) = key.downgrade() {
                keys.insert(canonical, weak)?;
            }
        }
        state.values.borrow_mut().insert(canonical, value.unwrapped())?;
        Ok(())
    }

    fn install(&self, key: Value, value: Value) -> Result<()> {
        require_identity(&key)?;
        let value = self.wrap_child(&value);
        self.store(&key, &key.unwrapped(), &value)
    }

    /// The key to report for `canonical`: the key first given, while alive.
    fn original_key(&self, canonical: &Value, fallback: &Value) -> Value {
        self.0
            .state
            .keys
            .borrow()
            .get(canonical)
            .and_then(WeakValue::upgrade)
            .unwrap_or_else(|| fallback.clone())
    }

    /// Stores the wrapped `value` under `key`.
    ///
    /// Fails if `key` is not a reference value.
    pub fn set(&self, key: impl Into<Value>, value: impl Into<Value>) -> Result<&Self> {
        let key = key.into();
        require_identity(&key)?;
        let value = self.wrap_child(&value.into());
        let canonical = key.unwrapped();

        let state = &self.0.state;
        let unchanged = state.target.has(&canonical)
            && state
                .values
                .borrow()
                .get(&canonical)
                .is_some_and(|previous| previous.strict_equals(&value.unwrapped()));
        if unchanged {
            return Ok(self);
        }

        self.store(&key, &canonical, &value)?;
        let key = self.original_key(&canonical, &key);
        self.0.broadcast(EventKey::Set, Op::Set, entry(key, value));
        Ok(self)
    }

    /// Returns the value stored under `key`, raw or wrapped.
    pub fn get(&self, key: &Value) -> Option<Value> {
        self.0.state.target.get(&key.unwrapped())
    }

    /// Returns true if `key`, raw or wrapped, has an entry.
    pub fn has(&self, key: &Value) -> bool {
        self.0.state.target.has(&key.unwrapped())
    }

    /// Removes the entry under `key`, raw or wrapped.
    pub fn delete(&self, key: &Value) -> bool {
        let state = &self.0.state;
        let canonical = key.unwrapped();
        let reported = self.original_key(&canonical, key);
        let value = state.target.get(&canonical).unwrap_or_default();
        state.keys.borrow_mut().remove(&canonical);
        state.values.borrow_mut().remove(&canonical);
        let removed = state.target.delete(&canonical);
        if removed {
            self.0
                .broadcast(EventKey::Delete, Op::Delete, entry(reported, value));
        }
        removed
    }

    /// Drops entries whose keys are dead, in the store and the identity
    /// maps. Returns the number of store entries dropped.
    pub fn purge(&self) -> usize {
        let state = &self.0.state;
        state.keys.borrow_mut().purge();
        state.values.borrow_mut().purge();
        state.target.purge()
    }
}

impl Observable for RecursiveObservableWeakMap {
    fn as_observed(&self) -> ObservedRef {
        self.0.observed()
    }
}
