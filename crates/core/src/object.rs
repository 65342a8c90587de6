//! Object store with property descriptors and a prototype chain.
//!
//! `ObjectRef` is a shared handle to an `ObjectStore`. Own properties keep
//! insertion order. Reads walk the prototype chain; writes and deletes act on
//! own properties only, following the ordinary define/set/delete rules for
//! non-writable and non-configurable properties.

use crate::descriptor::{Property, PropertyDescriptor};
use crate::error::{Error, Result};
use crate::key::PropertyKey;
use crate::observed::Marker;
use crate::value::Value;
use crate::weak::Identity;
use indexmap::IndexMap;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Shared interior of an object.
pub struct ObjectStore {
    properties: RefCell<IndexMap<PropertyKey, Property>>,
    proto: Option<ObjectRef>,
    extensible: Cell<bool>,
    marker: Marker,
}

/// A shared handle to an object store.
#[derive(Clone)]
pub struct ObjectRef(Rc<ObjectStore>);

impl Default for ObjectRef {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectRef {
    /// Creates an empty object without a prototype.
    pub fn new() -> Self {
        Self::with_proto(None)
    }

    /// Creates an empty object with the given prototype.
    pub fn with_proto(proto: Option<ObjectRef>) -> Self {
        Self(Rc::new(ObjectStore {
            properties: RefCell::new(IndexMap::new()),
            proto,
            extensible: Cell::new(true),
            marker: Marker::default(),
        }))
    }

    /// Creates an object holding the given entries as ordinary data properties.
    pub fn from_entries<K, V, I>(entries: I) -> Self
    where
        K: Into<PropertyKey>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let obj = Self::new();
        {
            let mut props = obj.0.properties.borrow_mut();
            for (key, value) in entries {
                props.insert(key.into(), Property::data(value.into()));
            }
        }
        obj
    }

    pub(crate) fn from_inner(inner: Rc<ObjectStore>) -> Self {
        Self(inner)
    }

    pub(crate) fn inner(&self) -> &Rc<ObjectStore> {
        &self.0
    }

    /// Returns the prototype.
    pub fn proto(&self) -> Option<ObjectRef> {
        self.0.proto.clone()
    }

    /// Returns a copy of the own property under `key`.
    pub fn get_own_property(&self, key: &PropertyKey) -> Option<Property> {
        self.0.properties.borrow().get(key).cloned()
    }

    /// Returns true if `key` is an own property.
    pub fn has_own(&self, key: &PropertyKey) -> bool {
        self.0.properties.borrow().contains_key(key)
    }

    /// Returns true if `key` is found on this object or its prototype chain.
    pub fn has(&self, key: &PropertyKey) -> bool {
        self.lookup(key).is_some()
    }

    /// Returns own property keys in insertion order.
    pub fn own_keys(&self) -> Vec<PropertyKey> {
        self.0.properties.borrow().keys().cloned().collect()
    }

    /// Returns the number of own properties.
    pub fn len(&self) -> usize {
        self.0.properties.borrow().len()
    }

    /// Returns true if there are no own properties.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns every own key of every object on the prototype chain,
    /// excluding this object's own keys.
    pub fn prototype_keys(&self) -> Vec<PropertyKey> {
        let mut keys = Vec::new();
        let mut current = self.proto();
        while let Some(proto) = current {
            keys.extend(proto.own_keys());
            current = proto.proto();
        }
        keys
    }

    /// Finds `key` on this object or its prototype chain.
    pub fn lookup(&self, key: &PropertyKey) -> Option<Property> {
        if let Some(prop) = self.get_own_property(key) {
            return Some(prop);
        }
        let mut current = self.proto();
        while let Some(proto) = current {
            if let Some(prop) = proto.get_own_property(key) {
                return Some(prop);
            }
            current = proto.proto();
        }
        None
    }

    /// Reads `key`, invoking a getter with this object as receiver.
    pub fn get(&self, key: &PropertyKey) -> Value {
        self.get_with_receiver(key, &Value::Object(self.clone()))
    }

    /// Reads `key`, invoking a getter with `receiver` as `this`.
    pub fn get_with_receiver(&self, key: &PropertyKey, receiver: &Value) -> Value {
        match self.lookup(key) {
            Some(Property::Data { value, .. }) => value,
            Some(Property::Accessor { get: Some(getter), .. }) => getter.call(receiver, &[]),
            _ => Value::Undefined,
        }
    }

    /// Ordinary assignment: invokes an inherited or own setter, otherwise
    /// updates or creates an own data property.
    pub fn set(&self, key: impl Into<PropertyKey>, value: impl Into<Value>) -> Result<()> {
        let key = key.into();
        let value = value.into();
        match self.lookup(&key) {
            Some(Property::Accessor { set: Some(setter), .. }) => {
                setter.call(&Value::Object(self.clone()), &[value]);
                Ok(())
            }
            Some(Property::Accessor { set: None, .. }) => Err(Error::not_writable(key)),
            Some(Property::Data { writable: false, .. }) => Err(Error::not_writable(key)),
            _ => {
                let desc = if self.has_own(&key) {
                    PropertyDescriptor::value(value)
                } else {
                    PropertyDescriptor::data(value)
                };
                self.define_own_property(key, &desc)
            }
        }
    }

    /// Defines or updates an own property.
    pub fn define_own_property(&self, key: PropertyKey, desc: &PropertyDescriptor) -> Result<()> {
        let mut props = self.0.properties.borrow_mut();
        let Some(existing) = props.get_mut(&key) else {
            if !self.0.extensible.get() {
                return Err(Error::not_extensible(key));
            }
            props.insert(key, Property::from_descriptor(desc));
            return Ok(());
        };

        if !existing.is_configurable() {
            validate_non_configurable(&key, existing, desc)?;
        }

        let enumerable = desc.enumerable.unwrap_or(existing.is_enumerable());
        let configurable = desc.configurable.unwrap_or(existing.is_configurable());

        *existing = match (&*existing, desc.is_accessor(), desc.is_data()) {
            // Data -> accessor conversion.
            (Property::Data { .. }, true, _) => Property::Accessor {
                get: desc.get.clone(),
                set: desc.set.clone(),
                enumerable,
                configurable,
            },
            // Accessor -> data conversion.
            (Property::Accessor { .. }, false, true) => Property::Data {
                value: desc.value.clone().unwrap_or_default(),
                writable: desc.writable.unwrap_or(false),
                enumerable,
                configurable,
            },
            (Property::Data { value, writable, .. }, _, _) => Property::Data {
                value: desc.value.clone().unwrap_or_else(|| value.clone()),
                writable: desc.writable.unwrap_or(*writable),
                enumerable,
                configurable,
            },
            (Property::Accessor { get, set, .. }, _, _) => Property::Accessor {
                get: desc.get.clone().or_else(|| get.clone()),
                set: desc.set.clone().or_else(|| set.clone()),
                enumerable,
                configurable,
            },
        };
        Ok(())
    }

    /// Deletes an own property.
    ///
    /// Returns `Ok(true)` if a property was removed, `Ok(false)` if there was
    /// none, and an error if the property is non-configurable.
    pub fn delete(&self, key: &PropertyKey) -> Result<bool> {
        let mut props = self.0.properties.borrow_mut();
        match props.get(key) {
            None => Ok(false),
            Some(prop) if !prop.is_configurable() => Err(Error::not_configurable(key.clone())),
            Some(_) => {
                props.shift_remove(key);
                Ok(true)
            }
        }
    }

    /// Stops the object from accepting new properties.
    pub fn prevent_extensions(&self) {
        self.0.extensible.set(false);
    }

    /// Returns true if new properties can be added.
    pub fn is_extensible(&self) -> bool {
        self.0.extensible.get()
    }

    /// Makes every own property read-only and non-configurable, and stops
    /// the object from accepting new properties.
    pub fn freeze(&self) {
        self.prevent_extensions();
        for prop in self.0.properties.borrow_mut().values_mut() {
            match prop {
                Property::Data {
                    writable,
                    configurable,
                    ..
                } => {
                    *writable = false;
                    *configurable = false;
                }
                Property::Accessor { configurable, .. } => *configurable = false,
            }
        }
    }

    /// Returns the identity marker slot.
    #[inline]
    pub fn marker(&self) -> &Marker {
        &self.0.marker
    }

    /// Returns the identity of this object.
    #[inline]
    pub fn identity(&self) -> Identity {
        Identity::of(&self.0)
    }

    /// Returns true if both handles refer to the same object.
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

fn validate_non_configurable(
    key: &PropertyKey,
    existing: &Property,
    desc: &PropertyDescriptor,
) -> Result<()> {
    let refused = || Err(Error::not_configurable(key.clone()));
    if desc.configurable == Some(true) {
        return refused();
    }
    if desc.enumerable.is_some_and(|e| e != existing.is_enumerable()) {
        return refused();
    }
    match existing {
        Property::Data {
            value, writable, ..
        } => {
            if desc.is_accessor() {
                return refused();
            }
            if !*writable {
                if desc.writable == Some(true) {
                    return refused();
                }
                if desc.value.as_ref().is_some_and(|v| !v.strict_equals(value)) {
                    return Err(Error::not_writable(key.clone()));
                }
            }
        }
        Property::Accessor { get, set, .. } => {
            if desc.is_data() {
                return refused();
            }
            let get_differs = desc
                .get
                .as_ref()
                .is_some_and(|g| !get.as_ref().is_some_and(|cur| cur.ptr_eq(g)));
            let set_differs = desc
                .set
                .as_ref()
                .is_some_and(|s| !set.as_ref().is_some_and(|cur| cur.ptr_eq(s)));
            if get_differs || set_differs {
                return refused();
            }
        }
    }
    Ok(())
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.0
                    .properties
                    .borrow()
                    .iter()
                    .map(|(k, p)| (k.to_string(), p.value().cloned())),
            )
            .finish()
    }
}
