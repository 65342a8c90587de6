//! The single entry point for wrapping values.

use crate::map::{ObservableMap, ObservableWeakMap, RecursiveObservableMap};
use crate::node::Observable;
use crate::object::ObservableObject;
use crate::options::ObserveOptions;
use crate::set::{ObservableSet, ObservableWeakSet, RecursiveObservableSet};
use vigil_core::{ObservedRef, Value};

/// Returns the wrapper already associated with `value`: the value itself if
/// it is a wrapper, or the live wrapper recorded in a store's marker.
pub fn existing_wrapper(value: &Value) -> Option<ObservedRef> {
    match value {
        Value::Observed(wrapper) => Some(wrapper.clone()),
        other => other.marker()?.get(),
    }
}

/// Wraps `value` according to its kind.
///
/// An already-wrapped value (or a store with a live wrapper) is returned as
/// the existing wrapper, reparented to `parent` when one is given. Weak sets
/// and weak maps get their plain wrappers; sets and maps get the recursive
/// wrappers when `options.recursive` is set; objects get an
/// [`ObservableObject`]. Every other value is returned unchanged.
pub fn observe(value: &Value, options: &ObserveOptions, parent: Option<&ObservedRef>) -> Value {
    if let Some(wrapper) = existing_wrapper(value) {
        if let Some(parent) = parent {
            wrapper.set_parent(Some(parent));
        }
        return Value::Observed(wrapper);
    }

    match value {
        Value::WeakSet(set) => ObservableWeakSet::wrap(set.clone(), parent).to_value(),
        Value::Set(set) if options.recursive => {
            RecursiveObservableSet::wrap(set.clone(), options, parent).to_value()
        }
        Value::Set(set) => ObservableSet::wrap(set.clone(), parent).to_value(),
        Value::WeakMap(map) => ObservableWeakMap::wrap(map.clone(), parent).to_value(),
        Value::Map(map) if options.recursive => {
            RecursiveObservableMap::wrap(map.clone(), options, parent).to_value()
        }
        Value::Map(map) => ObservableMap::wrap(map.clone(), parent).to_value(),
        Value::Object(obj) => ObservableObject::new(obj.clone(), options, parent).to_value(),
        other => other.clone(),
    }
}

/// Wraps `value` with default options and no parent.
///
/// # Example
///
/// ```rust
/// use vigil_core::{MapRef, Value};
/// use vigil_reactive::{obs, ObservableMap};
///
/// let raw = Value::from(MapRef::new());
/// let wrapped = obs(raw.clone());
/// assert!(ObservableMap::from_value(&wrapped).is_some());
/// assert_eq!(obs(wrapped.clone()), wrapped);
/// assert_eq!(obs(raw), wrapped);
/// assert_eq!(obs(5), Value::from(5));
/// ```
pub fn obs(value: impl Into<Value>) -> Value {
    observe(&value.into(), &ObserveOptions::default(), None)
}
