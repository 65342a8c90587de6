//! Change events emitted by observable wrappers.

use crate::descriptor::PropertyDescriptor;
use crate::key::PropertyKey;
use crate::observed::ObservedRef;
use crate::value::Value;
use std::fmt;
use std::rc::Rc;

/// The key an event is delivered under.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventKey {
    /// Generic change event, fired for every mutation and propagated to the
    /// parent route.
    Change,
    /// A map entry was stored.
    Set,
    /// A set member was added.
    Add,
    /// A collection entry or member was removed.
    Delete,
    /// A collection was cleared.
    Clear,
    /// A property on an observable object changed.
    Property(PropertyKey),
}

impl EventKey {
    /// Creates a property event key.
    pub fn property(key: impl Into<PropertyKey>) -> Self {
        EventKey::Property(key.into())
    }
}

impl From<PropertyKey> for EventKey {
    fn from(key: PropertyKey) -> Self {
        EventKey::Property(key)
    }
}

impl From<&str> for EventKey {
    fn from(key: &str) -> Self {
        EventKey::Property(key.into())
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKey::Change => write!(f, "change"),
            EventKey::Set => write!(f, "set"),
            EventKey::Add => write!(f, "add"),
            EventKey::Delete => write!(f, "delete"),
            EventKey::Clear => write!(f, "clear"),
            EventKey::Property(key) => write!(f, "{}", key),
        }
    }
}

/// The mutation that produced an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    Set,
    Add,
    Delete,
    Clear,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Op::Set => "set",
            Op::Add => "add",
            Op::Delete => "delete",
            Op::Clear => "clear",
        };
        f.write_str(name)
    }
}

/// What changed.
#[derive(Clone, Debug)]
pub enum Detail {
    /// An object property was defined, assigned or deleted.
    Property {
        key: PropertyKey,
        value: Value,
        descriptor: Option<PropertyDescriptor>,
    },
    /// A map entry was stored or removed.
    Entry { key: Value, value: Value },
    /// A set member was added or removed.
    Item(Value),
    /// A collection was cleared.
    Cleared,
}

/// A change notification.
#[derive(Clone, Debug)]
pub struct Event {
    /// The key this event is delivered under.
    pub key: EventKey,
    /// The mutation kind.
    pub op: Op,
    /// The wrapper that changed.
    pub source: ObservedRef,
    /// What changed.
    pub detail: Detail,
}

impl Event {
    /// Creates an event.
    pub fn new(key: EventKey, op: Op, source: ObservedRef, detail: Detail) -> Self {
        Self {
            key,
            op,
            source,
            detail,
        }
    }

    /// Returns the same event re-addressed to another key.
    pub fn with_key(&self, key: EventKey) -> Self {
        Self {
            key,
            ..self.clone()
        }
    }

    /// Returns the value carried by the event: the new property value, the
    /// entry value, the set member, or `Undefined` for a clear.
    pub fn value(&self) -> Value {
        match &self.detail {
            Detail::Property { value, .. } => value.clone(),
            Detail::Entry { value, .. } => value.clone(),
            Detail::Item(value) => value.clone(),
            Detail::Cleared => Value::Undefined,
        }
    }

    /// Returns the property key for property events.
    pub fn property_key(&self) -> Option<&PropertyKey> {
        match &self.detail {
            Detail::Property { key, .. } => Some(key),
            _ => None,
        }
    }

    /// Returns the entry key for map events.
    pub fn entry_key(&self) -> Option<&Value> {
        match &self.detail {
            Detail::Entry { key, .. } => Some(key),
            _ => None,
        }
    }
}

/// Callback invoked on event delivery.
///
/// Listeners are compared by allocation: registering a clone of the same
/// `Rc` twice is a no-op.
pub type Listener = Rc<dyn Fn(&Event)>;

/// Creates a listener from a closure.
pub fn listener<F>(f: F) -> Listener
where
    F: Fn(&Event) + 'static,
{
    Rc::new(f)
}
