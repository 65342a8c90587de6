//! The seam between stores and the wrappers built over them.
//!
//! Every observable wrapper implements [`Observed`]. A wrapper reports the
//! store it delegates to through [`Observed::target`], and every store carries
//! a [`Marker`] slot pointing back (weakly) at the wrapper built over it. The
//! pair makes wrapping idempotent: a value that is already a wrapper, or a
//! store whose marker holds a live wrapper, is never wrapped twice.

use crate::event::{Event, EventKey, Listener};
use crate::value::Value;
use crate::weak::Identity;
use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// The kind of store a wrapper delegates to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObservedKind {
    Object,
    Map,
    RecursiveMap,
    WeakMap,
    RecursiveWeakMap,
    Set,
    RecursiveSet,
    WeakSet,
}

/// Behavior shared by every observable wrapper.
pub trait Observed: Any {
    /// Returns the canonical unwrapped store.
    fn target(&self) -> Value;

    /// Returns the kind of wrapper.
    fn kind(&self) -> ObservedKind;

    /// Returns the current parent route, if it is alive.
    fn parent(&self) -> Option<ObservedRef>;

    /// Replaces the parent route. The link never keeps the parent alive.
    fn set_parent(&self, parent: Option<&ObservedRef>);

    /// Registers a listener for an event key.
    fn on(&self, key: EventKey, listener: Listener);

    /// Removes the listeners for one key, or for every key when `None`.
    fn off(&self, key: Option<&EventKey>);

    /// Delivers an event to the listeners registered under `event.key`.
    fn emit(&self, event: &Event);

    /// Converts into `Any` for downcasting to the concrete wrapper.
    fn into_any(self: Rc<Self>) -> Rc<dyn Any>;
}

/// A shared handle to an observable wrapper.
#[derive(Clone)]
pub struct ObservedRef(Rc<dyn Observed>);

impl ObservedRef {
    /// Wraps a concrete wrapper.
    pub fn new<T: Observed>(wrapper: Rc<T>) -> Self {
        Self(wrapper)
    }

    pub(crate) fn from_inner(inner: Rc<dyn Observed>) -> Self {
        Self(inner)
    }

    pub(crate) fn inner(&self) -> &Rc<dyn Observed> {
        &self.0
    }

    /// Returns the concrete wrapper if it is of type `T`.
    pub fn downcast<T: Observed>(&self) -> Option<Rc<T>> {
        self.0.clone().into_any().downcast::<T>().ok()
    }

    /// Creates a non-owning handle.
    pub fn downgrade(&self) -> WeakObserved {
        WeakObserved(Rc::downgrade(&self.0))
    }

    /// Returns true if both handles refer to the same wrapper.
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }

    /// Returns the identity of the wrapper.
    #[inline]
    pub fn identity(&self) -> Identity {
        Identity::of(&self.0)
    }

    /// Returns this wrapper as a `Value`.
    pub fn to_value(&self) -> Value {
        Value::Observed(self.clone())
    }
}

impl std::ops::Deref for ObservedRef {
    type Target = dyn Observed;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

impl PartialEq for ObservedRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for ObservedRef {}

impl fmt::Debug for ObservedRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Observed({:?}#{:x})", self.0.kind(), self.identity().addr())
    }
}

/// A non-owning handle to an observable wrapper.
#[derive(Clone)]
pub struct WeakObserved(Weak<dyn Observed>);

impl WeakObserved {
    /// Recovers the wrapper if it is alive.
    pub fn upgrade(&self) -> Option<ObservedRef> {
        self.0.upgrade().map(ObservedRef)
    }

    /// Returns true while the wrapper is alive.
    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

impl fmt::Debug for WeakObserved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WeakObserved(alive={})", self.is_alive())
    }
}

/// Identity marker slot carried by every store.
///
/// Holds a weak handle to the wrapper built over the store. The slot is not a
/// property, so it can never collide with user keys.
#[derive(Default)]
pub struct Marker(RefCell<Option<WeakObserved>>);

impl Marker {
    /// Returns the wrapper recorded for this store, if it is alive.
    pub fn get(&self) -> Option<ObservedRef> {
        self.0.borrow().as_ref().and_then(WeakObserved::upgrade)
    }

    /// Records `wrapper` as the wrapper of this store.
    pub fn set(&self, wrapper: &ObservedRef) {
        *self.0.borrow_mut() = Some(wrapper.downgrade());
    }

    /// Returns true if a live wrapper is recorded.
    pub fn is_marked(&self) -> bool {
        self.get().is_some()
    }
}

impl fmt::Debug for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Marker(marked={})", self.is_marked())
    }
}
