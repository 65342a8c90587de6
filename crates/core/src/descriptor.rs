//! Property descriptors.
//!
//! [`Property`] is what an object store holds for each key: a complete data
//! or accessor record. [`PropertyDescriptor`] is a partial update, where each
//! field is present only if the caller specified it.

use crate::value::{FunctionRef, Value};

/// A stored property.
#[derive(Clone, Debug)]
pub enum Property {
    /// Data property: has `value` and `writable`.
    Data {
        value: Value,
        writable: bool,
        enumerable: bool,
        configurable: bool,
    },
    /// Accessor property: has `get` and/or `set`.
    Accessor {
        get: Option<FunctionRef>,
        set: Option<FunctionRef>,
        enumerable: bool,
        configurable: bool,
    },
}

impl Property {
    /// Creates a writable, enumerable, configurable data property.
    pub fn data(value: Value) -> Self {
        Property::Data {
            value,
            writable: true,
            enumerable: true,
            configurable: true,
        }
    }

    /// Returns the value if this is a data property.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Property::Data { value, .. } => Some(value),
            Property::Accessor { .. } => None,
        }
    }

    /// Is this a data property with writable=true?
    pub fn is_writable(&self) -> bool {
        match self {
            Property::Data { writable, .. } => *writable,
            Property::Accessor { .. } => false,
        }
    }

    /// Is this property enumerable?
    pub fn is_enumerable(&self) -> bool {
        match self {
            Property::Data { enumerable, .. } | Property::Accessor { enumerable, .. } => {
                *enumerable
            }
        }
    }

    /// Is this property configurable?
    pub fn is_configurable(&self) -> bool {
        match self {
            Property::Data { configurable, .. } | Property::Accessor { configurable, .. } => {
                *configurable
            }
        }
    }

    /// Is this an accessor property?
    #[inline]
    pub fn is_accessor(&self) -> bool {
        matches!(self, Property::Accessor { .. })
    }

    /// Returns the getter of an accessor property.
    pub fn getter(&self) -> Option<&FunctionRef> {
        match self {
            Property::Accessor { get, .. } => get.as_ref(),
            Property::Data { .. } => None,
        }
    }

    /// Returns the setter of an accessor property.
    pub fn setter(&self) -> Option<&FunctionRef> {
        match self {
            Property::Accessor { set, .. } => set.as_ref(),
            Property::Data { .. } => None,
        }
    }

    /// Builds a new property from a partial descriptor; absent attributes
    /// default to false and an absent value to `Undefined`.
    pub fn from_descriptor(desc: &PropertyDescriptor) -> Self {
        let enumerable = desc.enumerable.unwrap_or(false);
        let configurable = desc.configurable.unwrap_or(false);
        if desc.is_accessor() {
            Property::Accessor {
                get: desc.get.clone(),
                set: desc.set.clone(),
                enumerable,
                configurable,
            }
        } else {
            Property::Data {
                value: desc.value.clone().unwrap_or_default(),
                writable: desc.writable.unwrap_or(false),
                enumerable,
                configurable,
            }
        }
    }

    /// Returns the complete descriptor of this property.
    pub fn to_descriptor(&self) -> PropertyDescriptor {
        match self {
            Property::Data {
                value,
                writable,
                enumerable,
                configurable,
            } => PropertyDescriptor {
                value: Some(value.clone()),
                writable: Some(*writable),
                get: None,
                set: None,
                enumerable: Some(*enumerable),
                configurable: Some(*configurable),
            },
            Property::Accessor {
                get,
                set,
                enumerable,
                configurable,
            } => PropertyDescriptor {
                value: None,
                writable: None,
                get: get.clone(),
                set: set.clone(),
                enumerable: Some(*enumerable),
                configurable: Some(*configurable),
            },
        }
    }
}

/// A partial property descriptor.
#[derive(Clone, Debug, Default)]
pub struct PropertyDescriptor {
    pub value: Option<Value>,
    pub writable: Option<bool>,
    pub get: Option<FunctionRef>,
    pub set: Option<FunctionRef>,
    pub enumerable: Option<bool>,
    pub configurable: Option<bool>,
}

impl PropertyDescriptor {
    /// A descriptor that only updates the value.
    pub fn value(value: impl Into<Value>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::default()
        }
    }

    /// A writable, enumerable, configurable data descriptor.
    pub fn data(value: impl Into<Value>) -> Self {
        Self {
            value: Some(value.into()),
            writable: Some(true),
            enumerable: Some(true),
            configurable: Some(true),
            ..Self::default()
        }
    }

    /// An accessor descriptor.
    pub fn accessor(get: Option<FunctionRef>, set: Option<FunctionRef>) -> Self {
        Self {
            get,
            set,
            ..Self::default()
        }
    }

    /// Sets the writable attribute.
    pub fn writable(mut self, writable: bool) -> Self {
        self.writable = Some(writable);
        self
    }

    /// Sets the enumerable attribute.
    pub fn enumerable(mut self, enumerable: bool) -> Self {
        self.enumerable = Some(enumerable);
        self
    }

    /// Sets the configurable attribute.
    pub fn configurable(mut self, configurable: bool) -> Self {
        self.configurable = Some(configurable);
        self
    }

    /// Does this descriptor specify a getter or setter?
    #[inline]
    pub fn is_accessor(&self) -> bool {
        self.get.is_some() || self.set.is_some()
    }

    /// Does this descriptor specify a value or writability?
    #[inline]
    pub fn is_data(&self) -> bool {
        self.value.is_some() || self.writable.is_some()
    }

    /// Returns true if applying this descriptor to `existing` would change
    /// nothing: every field it specifies matches the stored property.
    ///
    /// Values compare by strict equality, accessors by function identity.
    /// There is nothing to compare against for a missing property, so that
    /// case is never unchanged.
    pub fn is_unchanged(&self, existing: Option<&Property>) -> bool {
        let Some(existing) = existing else {
            return false;
        };

        let value_same = match &self.value {
            Some(v) => existing
                .value()
                .map_or(v.is_undefined(), |current| current.strict_equals(v)),
            None => true,
        };
        let writable_same = match self.writable {
            Some(w) => !existing.is_accessor() && existing.is_writable() == w,
            None => true,
        };
        let get_same = match &self.get {
            Some(g) => existing.getter().is_some_and(|current| current.ptr_eq(g)),
            None => true,
        };
        let set_same = match &self.set {
            Some(s) => existing.setter().is_some_and(|current| current.ptr_eq(s)),
            None => true,
        };
        let enumerable_same = self
            .enumerable
            .map_or(true, |e| existing.is_enumerable() == e);
        let configurable_same = self
            .configurable
            .map_or(true, |c| existing.is_configurable() == c);

        value_same
            && writable_same
            && get_same
            && set_same
            && enumerable_same
            && configurable_same
    }
}
