//! Shared wrapper plumbing.
//!
//! Every wrapper is a `Node` holding its listeners, its parent route and a
//! shape-specific state. The [`Observable`] trait gives every public wrapper
//! handle the same `on`/`off`/parent surface.

use crate::link::ParentLink;
use crate::notify::Notifier;
use std::any::Any;
use std::rc::Rc;
use tracing::trace;
use vigil_core::{
    Detail, Event, EventKey, Listener, Observed, ObservedKind, ObservedRef, Op, Value,
};

/// Shape-specific wrapper state.
pub(crate) trait State: 'static {
    const KIND: ObservedKind;

    /// The canonical unwrapped store.
    fn target(&self) -> Value;
}

/// A wrapper: listeners, parent route, and state.
pub(crate) struct Node<S> {
    pub(crate) notifier: Notifier,
    pub(crate) parent: ParentLink,
    pub(crate) state: S,
}

impl<S: State> Node<S> {
    /// Creates a wrapper and records it in the target's identity marker.
    pub(crate) fn create(state: S, parent: Option<&ObservedRef>) -> Rc<Self> {
        let node = Rc::new(Self {
            notifier: Notifier::new(),
            parent: ParentLink::new(parent),
            state,
        });
        let target = node.state.target();
        if let Some(marker) = target.marker() {
            marker.set(&ObservedRef::new(node.clone()));
        }
        trace!(kind = ?S::KIND, parent = parent.is_some(), "wrapper created");
        node
    }

    /// Returns this wrapper as a trait object handle.
    pub(crate) fn observed(self: &Rc<Self>) -> ObservedRef {
        ObservedRef::new(self.clone())
    }

    /// The wrapper children should report to: the parent if one is linked,
    /// else this wrapper.
    pub(crate) fn route(self: &Rc<Self>) -> ObservedRef {
        self.parent.get().unwrap_or_else(|| self.observed())
    }

    /// Fires the specific event, then `change` on this wrapper, then
    /// `change` on the parent unless the parent is this wrapper.
    pub(crate) fn broadcast(self: &Rc<Self>, key: EventKey, op: Op, detail: Detail) {
        let source = self.observed();
        let event = Event::new(key, op, source.clone(), detail);
        trace!(kind = ?S::KIND, event = %event.key, op = %op, "emit");
        self.notifier.emit(&event);

        let change = event.with_key(EventKey::Change);
        self.notifier.emit(&change);
        if let Some(parent) = self.parent.get() {
            if !parent.ptr_eq(&source) {
                parent.emit(&change);
            }
        }
    }
}

impl<S: State> Observed for Node<S> {
    fn target(&self) -> Value {
        self.state.target()
    }

    fn kind(&self) -> ObservedKind {
        S::KIND
    }

    fn parent(&self) -> Option<ObservedRef> {
        self.parent.get()
    }

    fn set_parent(&self, parent: Option<&ObservedRef>) {
        self.parent.set(parent);
    }

    fn on(&self, key: EventKey, listener: Listener) {
        self.notifier.on(key, listener);
    }

    fn off(&self, key: Option<&EventKey>) {
        self.notifier.off(key);
    }

    fn emit(&self, event: &Event) {
        self.notifier.emit(event);
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

/// Common surface of every wrapper handle.
pub trait Observable {
    /// Returns the wrapper as a trait object handle.
    fn as_observed(&self) -> ObservedRef;

    /// Registers `listener` under `key`.
    fn on(&self, key: impl Into<EventKey>, listener: Listener) -> &Self
    where
        Self: Sized,
    {
        self.as_observed().on(key.into(), listener);
        self
    }

    /// Removes the listeners for `key`, or all listeners when `None`.
    fn off(&self, key: Option<&EventKey>) -> &Self
    where
        Self: Sized,
    {
        self.as_observed().off(key);
        self
    }

    /// Returns the parent route, if it is alive.
    fn parent(&self) -> Option<ObservedRef> {
        self.as_observed().parent()
    }

    /// Replaces the parent route.
    fn set_parent(&self, parent: Option<&ObservedRef>) {
        self.as_observed().set_parent(parent);
    }

    /// Returns the wrapper as a `Value`.
    fn to_value(&self) -> Value {
        Value::Observed(self.as_observed())
    }
}

#[cfg(test)]
pub(crate) fn test_source() -> ObservedRef {
    crate::ObservableSet::new().as_observed()
}
