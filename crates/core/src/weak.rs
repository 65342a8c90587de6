//! Identity-keyed weak associations.
//!
//! `WeakTable` maps reference values to data without keeping the keys alive.
//! Entries are keyed by allocation address (`Identity`) and carry a
//! `WeakValue` liveness handle. Holding the weak handle keeps the allocation
//! from being reused, so an identity can never be confused with a later
//! object at the same address.
//!
//! Reclamation is deterministic rather than collector-driven: dead entries
//! are invisible to lookups immediately, and are physically removed by
//! [`WeakTable::purge`], which also runs amortized during inserts.

use crate::collection::{MapRef, MapStore, SetRef, SetStore};
use crate::error::{Error, Result};
use crate::object::{ObjectRef, ObjectStore};
use crate::observed::{Marker, Observed, ObservedRef};
use crate::value::{FunctionRef, Value};
use hashbrown::HashMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Smallest table size that triggers an amortized purge.
const MIN_PURGE_THRESHOLD: usize = 16;

/// Allocation identity of a reference value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity(usize);

impl Identity {
    /// Returns the identity of a shared allocation.
    pub fn of<T: ?Sized>(rc: &Rc<T>) -> Self {
        Identity(Rc::as_ptr(rc) as *const () as usize)
    }

    fn of_weak<T: ?Sized>(weak: &Weak<T>) -> Self {
        Identity(Weak::as_ptr(weak) as *const () as usize)
    }

    /// Returns the raw address, for diagnostics only.
    #[inline]
    pub fn addr(&self) -> usize {
        self.0
    }
}

/// A non-owning handle to a reference value.
#[derive(Clone)]
pub enum WeakValue {
    Object(Weak<ObjectStore>),
    Map(Weak<MapStore>),
    Set(Weak<SetStore>),
    WeakMap(Weak<WeakMapStore>),
    WeakSet(Weak<WeakSetStore>),
    Function(Weak<dyn Fn(&Value, &[Value]) -> Value>),
    Observed(Weak<dyn Observed>),
}

impl WeakValue {
    /// Downgrades a reference value. Returns None for primitives.
    pub fn new(value: &Value) -> Option<Self> {
        Some(match value {
            Value::Object(o) => WeakValue::Object(Rc::downgrade(o.inner())),
            Value::Map(m) => WeakValue::Map(Rc::downgrade(m.inner())),
            Value::Set(s) => WeakValue::Set(Rc::downgrade(s.inner())),
            Value::WeakMap(m) => WeakValue::WeakMap(Rc::downgrade(&m.0)),
            Value::WeakSet(s) => WeakValue::WeakSet(Rc::downgrade(&s.0)),
            Value::Function(f) => WeakValue::Function(Rc::downgrade(f.inner())),
            Value::Observed(o) => WeakValue::Observed(Rc::downgrade(o.inner())),
            _ => return None,
        })
    }

    /// Recovers the value if it is still alive.
    pub fn upgrade(&self) -> Option<Value> {
        Some(match self {
            WeakValue::Object(w) => Value::Object(ObjectRef::from_inner(w.upgrade()?)),
            WeakValue::Map(w) => Value::Map(MapRef::from_inner(w.upgrade()?)),
            WeakValue::Set(w) => Value::Set(SetRef::from_inner(w.upgrade()?)),
            WeakValue::WeakMap(w) => Value::WeakMap(WeakMapRef(w.upgrade()?)),
            WeakValue::WeakSet(w) => Value::WeakSet(WeakSetRef(w.upgrade()?)),
            WeakValue::Function(w) => Value::Function(FunctionRef::from_inner(w.upgrade()?)),
            WeakValue::Observed(w) => Value::Observed(ObservedRef::from_inner(w.upgrade()?)),
        })
    }

    /// Returns true while the referenced value is alive.
    pub fn is_alive(&self) -> bool {
        match self {
            WeakValue::Object(w) => w.strong_count() > 0,
            WeakValue::Map(w) => w.strong_count() > 0,
            WeakValue::Set(w) => w.strong_count() > 0,
            WeakValue::WeakMap(w) => w.strong_count() > 0,
            WeakValue::WeakSet(w) => w.strong_count() > 0,
            WeakValue::Function(w) => w.strong_count() > 0,
            WeakValue::Observed(w) => w.strong_count() > 0,
        }
    }

    /// Returns the identity of the referenced allocation.
    pub fn identity(&self) -> Identity {
        match self {
            WeakValue::Object(w) => Identity::of_weak(w),
            WeakValue::Map(w) => Identity::of_weak(w),
            WeakValue::Set(w) => Identity::of_weak(w),
            WeakValue::WeakMap(w) => Identity::of_weak(w),
            WeakValue::WeakSet(w) => Identity::of_weak(w),
            WeakValue::Function(w) => Identity::of_weak(w),
            WeakValue::Observed(w) => Identity::of_weak(w),
        }
    }
}

impl fmt::Debug for WeakValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "WeakValue(#{:x}, alive={})",
            self.identity().addr(),
            self.is_alive()
        )
    }
}

/// An identity-keyed table that does not keep its keys alive.
pub struct WeakTable<V> {
    entries: HashMap<Identity, (WeakValue, V)>,
    purge_at: usize,
}

impl<V> Default for WeakTable<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> WeakTable<V> {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            purge_at: MIN_PURGE_THRESHOLD,
        }
    }

    /// Returns the value stored for `key` if the key is alive.
    pub fn get(&self, key: &Value) -> Option<&V> {
        let identity = key.identity()?;
        self.entries
            .get(&identity)
            .filter(|(weak, _)| weak.is_alive())
            .map(|(_, v)| v)
    }

    /// Returns a mutable reference to the value stored for `key`.
    pub fn get_mut(&mut self, key: &Value) -> Option<&mut V> {
        let identity = key.identity()?;
        self.entries
            .get_mut(&identity)
            .filter(|(weak, _)| weak.is_alive())
            .map(|(_, v)| v)
    }

    /// Returns true if `key` has a live entry.
    pub fn contains_key(&self, key: &Value) -> bool {
        self.get(key).is_some()
    }

    /// Inserts an entry, returning the previous value for the same key.
    ///
    /// Fails for keys without identity (primitives).
    pub fn insert(&mut self, key: &Value, value: V) -> Result<Option<V>> {
        let weak = key
            .downgrade()
            .ok_or_else(|| Error::invalid_weak_key(key.type_name()))?;
        if self.entries.len() >= self.purge_at {
            self.purge();
            self.purge_at = (self.entries.len() * 2).max(MIN_PURGE_THRESHOLD);
        }
        Ok(self
            .entries
            .insert(weak.identity(), (weak, value))
            .map(|(_, old)| old))
    }

    /// Removes the entry for `key`, returning its value if it was live.
    pub fn remove(&mut self, key: &Value) -> Option<V> {
        let identity = key.identity()?;
        match self.entries.remove(&identity) {
            Some((weak, v)) if weak.is_alive() => Some(v),
            _ => None,
        }
    }

    /// Physically removes entries whose keys are dead. Returns the count.
    pub fn purge(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, (weak, _)| weak.is_alive());
        before - self.entries.len()
    }

    /// Returns the number of live entries.
    pub fn len(&self) -> usize {
        self.entries.values().filter(|(w, _)| w.is_alive()).count()
    }

    /// Returns true if there are no live entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Shared interior of a weak map store.
pub struct WeakMapStore {
    table: RefCell<WeakTable<Value>>,
    marker: Marker,
}

/// A map store keyed weakly by reference identity.
#[derive(Clone)]
pub struct WeakMapRef(pub(crate) Rc<WeakMapStore>);

impl Default for WeakMapRef {
    fn default() -> Self {
        Self::new()
    }
}

impl WeakMapRef {
    /// Creates an empty weak map.
    pub fn new() -> Self {
        Self(Rc::new(WeakMapStore {
            table: RefCell::new(WeakTable::new()),
            marker: Marker::default(),
        }))
    }

    /// Creates a weak map from entries; fails on the first primitive key.
    pub fn from_entries<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (Value, Value)>,
    {
        let map = Self::new();
        for (key, value) in entries {
            map.set(&key, value)?;
        }
        Ok(map)
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &Value) -> Option<Value> {
        self.0.table.borrow().get(key).cloned()
    }

    /// Returns true if `key` has a live entry.
    pub fn has(&self, key: &Value) -> bool {
        self.0.table.borrow().contains_key(key)
    }

    /// Stores `value` under `key`.
    pub fn set(&self, key: &Value, value: Value) -> Result<()> {
        self.0.table.borrow_mut().insert(key, value)?;
        Ok(())
    }

    /// Removes the entry under `key`. Returns true if one was removed.
    pub fn delete(&self, key: &Value) -> bool {
        self.0.table.borrow_mut().remove(key).is_some()
    }

    /// Drops entries whose keys are dead. Returns the count.
    pub fn purge(&self) -> usize {
        self.0.table.borrow_mut().purge()
    }

    /// Returns the number of live entries.
    pub fn live_len(&self) -> usize {
        self.0.table.borrow().len()
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

/// Shared interior of a weak set store.
pub struct WeakSetStore {
    table: RefCell<WeakTable<()>>,
    marker: Marker,
}

/// A set store holding its members weakly.
#[derive(Clone)]
pub struct WeakSetRef(pub(crate) Rc<WeakSetStore>);

impl Default for WeakSetRef {
    fn default() -> Self {
        Self::new()
    }
}

impl WeakSetRef {
    /// Creates an empty weak set.
    pub fn new() -> Self {
        Self(Rc::new(WeakSetStore {
            table: RefCell::new(WeakTable::new()),
            marker: Marker::default(),
        }))
    }

    /// Creates a weak set from values; fails on the first primitive.
    pub fn from_values<I>(values: I) -> Result<Self>
    where
        I: IntoIterator<Item = Value>,
    {
        let set = Self::new();
        for value in values {
            set.add(&value)?;
        }
        Ok(set)
    }

    /// Returns true if `value` is a live member.
    pub fn has(&self, value: &Value) -> bool {
        self.0.table.borrow().contains_key(value)
    }

    /// Adds `value` to the set.
    pub fn add(&self, value: &Value) -> Result<()> {
        self.0.table.borrow_mut().insert(value, ())?;
        Ok(())
    }

    /// Removes `value`. Returns true if it was a member.
    pub fn delete(&self, value: &Value) -> bool {
        self.0.table.borrow_mut().remove(value).is_some()
    }

    /// Drops dead members. Returns the count.
    pub fn purge(&self) -> usize {
        self.0.table.borrow_mut().purge()
    }

    /// Returns the number of live members.
    pub fn live_len(&self) -> usize {
        self.0.table.borrow().len()
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weak_table_insert_get() {
        let mut table = WeakTable::new();
        let key = Value::from(ObjectRef::new());
        assert!(table.insert(&key, 1).unwrap().is_none());
        assert_eq!(table.get(&key), Some(&1));
        assert_eq!(table.insert(&key, 2).unwrap(), Some(1));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_weak_table_rejects_primitive() {
        let mut table = WeakTable::new();
        let err = table.insert(&Value::from(1), ()).unwrap_err();
        assert_eq!(err, Error::invalid_weak_key("number"));
        assert!(!table.contains_key(&Value::from(1)));
    }

    #[test]
    fn test_weak_table_does_not_keep_key_alive() {
        let mut table = WeakTable::new();
        {
            let key = Value::from(ObjectRef::new());
            table.insert(&key, "payload").unwrap();
            assert_eq!(table.len(), 1);
        }
        assert_eq!(table.len(), 0);
        assert_eq!(table.purge(), 1);
        assert!(table.is_empty());
    }

    #[test]
    fn test_weak_table_amortized_purge() {
        let mut table = WeakTable::new();
        for _ in 0..100 {
            let key = Value::from(ObjectRef::new());
            table.insert(&key, ()).unwrap();
        }
        // Dead keys are purged while inserting, so the raw table stays small.
        assert!(table.entries.len() <= MIN_PURGE_THRESHOLD + 1);
        assert!(table.is_empty());
    }

    #[test]
    fn test_weak_value_upgrade() {
        let obj = ObjectRef::new();
        let weak = WeakValue::new(&Value::from(obj.clone())).unwrap();
        assert!(weak.is_alive());
        assert_eq!(weak.upgrade(), Some(Value::from(obj.clone())));
        assert_eq!(weak.identity(), obj.identity());
        drop(obj);
        assert!(!weak.is_alive());
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_weak_map_store() {
        let map = WeakMapRef::new();
        let key = Value::from(ObjectRef::new());
        map.set(&key, Value::from(1)).unwrap();
        assert!(map.has(&key));
        assert_eq!(map.get(&key), Some(Value::from(1)));
        assert!(map.delete(&key));
        assert!(!map.delete(&key));
        assert!(map.set(&Value::from("k"), Value::Null).is_err());
    }

    #[test]
    fn test_weak_set_store() {
        let set = WeakSetRef::new();
        let member = Value::from(MapRef::new());
        set.add(&member).unwrap();
        assert!(set.has(&member));
        assert_eq!(set.live_len(), 1);
        drop(member);
        assert_eq!(set.live_len(), 0);
        assert_eq!(set.purge(), 1);
    }
}
