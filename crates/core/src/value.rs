//! Value type definitions.
//!
//! `Value` is the dynamic value flowing through stores and wrappers. Primitive
//! variants compare by content; reference variants (objects, collections,
//! functions, wrappers) compare and hash by identity.

use crate::collection::{MapRef, SetRef};
use crate::key::{PropertyKey, Symbol};
use crate::object::ObjectRef;
use crate::observed::{Marker, ObservedRef};
use crate::weak::{Identity, WeakMapRef, WeakSetRef, WeakValue};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// Native function signature: receiver (`this`) and arguments.
type NativeFn = dyn Fn(&Value, &[Value]) -> Value;

/// A callable value, compared by identity.
#[derive(Clone)]
pub struct FunctionRef(Rc<NativeFn>);

impl FunctionRef {
    /// Wraps a closure as a callable value.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Value + 'static,
    {
        Self(Rc::new(f))
    }

    /// Invokes the function with the given receiver and arguments.
    pub fn call(&self, this: &Value, args: &[Value]) -> Value {
        (self.0)(this, args)
    }

    /// Returns true if both handles refer to the same function.
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Returns the identity of this function.
    #[inline]
    pub fn identity(&self) -> Identity {
        Identity::of(&self.0)
    }

    pub(crate) fn from_inner(inner: Rc<NativeFn>) -> Self {
        Self(inner)
    }

    pub(crate) fn inner(&self) -> &Rc<NativeFn> {
        &self.0
    }
}

impl fmt::Debug for FunctionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[function#{:x}]", self.identity().addr())
    }
}

/// A dynamic value.
#[derive(Clone, Default)]
pub enum Value {
    /// Absent value
    #[default]
    Undefined,
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// 64-bit floating point number
    Number(f64),
    /// Immutable UTF-8 string
    String(Rc<str>),
    /// Unique symbol
    Symbol(Symbol),
    /// Object store
    Object(ObjectRef),
    /// Insertion-ordered map store
    Map(MapRef),
    /// Insertion-ordered set store
    Set(SetRef),
    /// Weak-keyed map store
    WeakMap(WeakMapRef),
    /// Weak set store
    WeakSet(WeakSetRef),
    /// Callable value
    Function(FunctionRef),
    /// Observable wrapper around one of the stores
    Observed(ObservedRef),
}

impl Value {
    /// Creates a string value.
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::String(Rc::from(s.as_ref()))
    }

    /// Returns the type name of this value.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Object(_) => "object",
            Value::Map(_) => "map",
            Value::Set(_) => "set",
            Value::WeakMap(_) => "weakmap",
            Value::WeakSet(_) => "weakset",
            Value::Function(_) => "function",
            Value::Observed(_) => "observed",
        }
    }

    /// Returns true if this value is Undefined.
    #[inline]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Returns true for values that can be wrapped by an observable:
    /// objects, the four collection kinds, and existing wrappers.
    pub fn is_structured(&self) -> bool {
        matches!(
            self,
            Value::Object(_)
                | Value::Map(_)
                | Value::Set(_)
                | Value::WeakMap(_)
                | Value::WeakSet(_)
                | Value::Observed(_)
        )
    }

    /// Returns true if this value is an observable wrapper.
    #[inline]
    pub fn is_observed(&self) -> bool {
        matches!(self, Value::Observed(_))
    }

    /// Returns the boolean if this is a Bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the number if this is a Number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the string slice if this is a String.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the object store if this is an Object.
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Returns the map store if this is a Map.
    pub fn as_map(&self) -> Option<&MapRef> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Returns the set store if this is a Set.
    pub fn as_set(&self) -> Option<&SetRef> {
        match self {
            Value::Set(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the function if this is a Function.
    pub fn as_function(&self) -> Option<&FunctionRef> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Returns the wrapper if this is an Observed value.
    pub fn as_observed(&self) -> Option<&ObservedRef> {
        match self {
            Value::Observed(o) => Some(o),
            _ => None,
        }
    }

    /// Returns the canonical unwrapped value.
    ///
    /// Wrappers yield the store they delegate to; every other value yields
    /// itself.
    pub fn unwrapped(&self) -> Value {
        match self {
            Value::Observed(o) => o.target(),
            other => other.clone(),
        }
    }

    /// Returns the identity marker slot of a store value.
    pub fn marker(&self) -> Option<&Marker> {
        match self {
            Value::Object(o) => Some(o.marker()),
            Value::Map(m) => Some(m.marker()),
            Value::Set(s) => Some(s.marker()),
            Value::WeakMap(m) => Some(m.marker()),
            Value::WeakSet(s) => Some(s.marker()),
            _ => None,
        }
    }

    /// Returns the identity of a reference value, or None for primitives.
    pub fn identity(&self) -> Option<Identity> {
        match self {
            Value::Object(o) => Some(o.identity()),
            Value::Map(m) => Some(m.identity()),
            Value::Set(s) => Some(s.identity()),
            Value::WeakMap(m) => Some(m.identity()),
            Value::WeakSet(s) => Some(s.identity()),
            Value::Function(f) => Some(f.identity()),
            Value::Observed(o) => Some(o.identity()),
            _ => None,
        }
    }

    /// Creates a non-owning handle to a reference value.
    pub fn downgrade(&self) -> Option<WeakValue> {
        WeakValue::new(self)
    }

    /// Strict equality: like `==` but NaN is never equal to itself.
    ///
    /// Used wherever a write must be classified as a no-op.
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            _ => self == other,
        }
    }
}

impl PartialEq for Value {
    /// SameValueZero: NaN equals NaN, +0 equals -0, references by identity.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => {
                if a.is_nan() && b.is_nan() {
                    true
                } else {
                    a == b
                }
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Map(a), Value::Map(b)) => a.ptr_eq(b),
            (Value::Set(a), Value::Set(b)) => a.ptr_eq(b),
            (Value::WeakMap(a), Value::WeakMap(b)) => a.ptr_eq(b),
            (Value::WeakSet(a), Value::WeakSet(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::Observed(a), Value::Observed(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Undefined | Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Number(n) => {
                // Keep hashing consistent with SameValueZero.
                let bits = if n.is_nan() {
                    f64::NAN.to_bits()
                } else if *n == 0.0 {
                    0u64
                } else {
                    n.to_bits()
                };
                bits.hash(state)
            }
            Value::String(s) => s.hash(state),
            Value::Symbol(sym) => sym.hash(state),
            other => {
                if let Some(identity) = other.identity() {
                    identity.hash(state);
                }
            }
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Symbol(sym) => write!(f, "{}", sym),
            Value::Function(func) => write!(f, "{:?}", func),
            other => match other.identity() {
                Some(id) => write!(f, "[{}#{:x}]", other.type_name(), id.addr()),
                None => write!(f, "[{}]", other.type_name()),
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{}", s),
            other => write!(f, "{:?}", other),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<Symbol> for Value {
    fn from(sym: Symbol) -> Self {
        Value::Symbol(sym)
    }
}

impl From<ObjectRef> for Value {
    fn from(o: ObjectRef) -> Self {
        Value::Object(o)
    }
}

impl From<MapRef> for Value {
    fn from(m: MapRef) -> Self {
        Value::Map(m)
    }
}

impl From<SetRef> for Value {
    fn from(s: SetRef) -> Self {
        Value::Set(s)
    }
}

impl From<WeakMapRef> for Value {
    fn from(m: WeakMapRef) -> Self {
        Value::WeakMap(m)
    }
}

impl From<WeakSetRef> for Value {
    fn from(s: WeakSetRef) -> Self {
        Value::WeakSet(s)
    }
}

impl From<FunctionRef> for Value {
    fn from(f: FunctionRef) -> Self {
        Value::Function(f)
    }
}

impl From<ObservedRef> for Value {
    fn from(o: ObservedRef) -> Self {
        Value::Observed(o)
    }
}

impl From<&PropertyKey> for Value {
    /// String keys become strings, indices numbers, symbols symbols.
    fn from(key: &PropertyKey) -> Self {
        match key {
            PropertyKey::String(s) => Value::String(s.clone()),
            PropertyKey::Index(i) => Value::Number(*i as f64),
            PropertyKey::Symbol(sym) => Value::Symbol(sym.clone()),
        }
    }
}

impl From<&Value> for Value {
    fn from(v: &Value) -> Self {
        v.clone()
    }
}
