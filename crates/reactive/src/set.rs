//! Observable set wrappers.
//!
//! `add` broadcasts `EventKey::Add` only for a value not yet present;
//! `delete` broadcasts `EventKey::Delete` only when a value was removed.

use crate::node::{Node, Observable, State};
use crate::observe::observe;
use crate::options::ObserveOptions;
use hashbrown::HashMap;
use std::cell::RefCell;
use std::rc::Rc;
use vigil_core::{
    Detail, EventKey, ObservedKind, ObservedRef, Op, Result, SetRef, Value, WeakSetRef,
};

pub(crate) struct SetState {
    target: SetRef,
}

impl State for SetState {
    const KIND: ObservedKind = ObservedKind::Set;

    fn target(&self) -> Value {
        Value::Set(self.target.clone())
    }
}

/// An observable insertion-ordered set.
#[derive(Clone)]
pub struct ObservableSet(Rc<Node<SetState>>);

impl Default for ObservableSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ObservableSet {
    /// Creates an empty observable set.
    pub fn new() -> Self {
        Self::wrap(SetRef::new(), None)
    }

    /// Wraps `target` without emitting for its existing members.
    pub fn wrap(target: SetRef, parent: Option<&ObservedRef>) -> Self {
        Self(Node::create(SetState { target }, parent))
    }

    /// Wraps `target`. With `emit_on_construction`, the existing members are
    /// removed and re-added through [`add`](Self::add).
    pub fn with_options(
        target: SetRef,
        options: &ObserveOptions,
        parent: Option<&ObservedRef>,
    ) -> Self {
        let set = Self::wrap(target.clone(), parent);
        if options.emit_on_construction {
            let values = target.values();
            target.clear();
            for value in values {
                set.add(value);
            }
        }
        set
    }

    /// Creates an observable set holding `values`.
    pub fn from_values<V, I>(
        values: I,
        options: &ObserveOptions,
        parent: Option<&ObservedRef>,
    ) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        Self::with_options(SetRef::from_values(values), options, parent)
    }

    /// Returns the wrapper held by `value`, if it is an observable set.
    pub fn from_value(value: &Value) -> Option<Self> {
        value.as_observed()?.downcast::<Node<SetState>>().map(Self)
    }

    /// Returns the underlying set.
    pub fn target(&self) -> SetRef {
        self.0.state.target.clone()
    }

    /// Adds `value`.
    pub fn add(&self, value: impl Into<Value>) -> &Self {
        let value = value.into();
        if self.0.state.target.add(value.clone()) {
            self.0.broadcast(EventKey::Add, Op::Add, Detail::Item(value));
        }
        self
    }

    /// Removes `value`. Returns true if it was a member.
    pub fn delete(&self, value: &Value) -> bool {
        let removed = self.0.state.target.delete(value);
        if removed {
            self.0
                .broadcast(EventKey::Delete, Op::Delete, Detail::Item(value.clone()));
        }
        removed
    }

    /// Removes every member, broadcasting `EventKey::Clear` if there were any.
    pub fn clear(&self) {
        let target = &self.0.state.target;
        let empty = target.is_empty();
        target.clear();
        if !empty {
            self.0.broadcast(EventKey::Clear, Op::Clear, Detail::Cleared);
        }
    }

    pub fn has(&self, value: &Value) -> bool {
        self.0.state.target.has(value)
    }

    pub fn len(&self) -> usize {
        self.0.state.target.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.state.target.is_empty()
    }

    pub fn values(&self) -> Vec<Value> {
        self.0.state.target.values()
    }

    pub fn entries(&self) -> Vec<(Value, Value)> {
        self.0.state.target.entries()
    }

    pub fn for_each<F>(&self, f: F)
    where
        F: FnMut(&Value),
    {
        self.0.state.target.for_each(f);
    }
}

impl Observable for ObservableSet {
    fn as_observed(&self) -> ObservedRef {
        self.0.observed()
    }
}

pub(crate) struct RecursiveSetState {
    target: SetRef,
    options: ObserveOptions,
    /// Unwrapped value -> value as stored.
    stored: RefCell<HashMap<Value, Value>>,
}

impl State for RecursiveSetState {
    const KIND: ObservedKind = ObservedKind::RecursiveSet;

    fn target(&self) -> Value {
        Value::Set(self.target.clone())
    }
}

/// An observable set that wraps its structured members.
///
/// `has` and `delete` accept a member in raw or wrapped form. Primitive
/// members are stored as they are.
#[derive(Clone)]
pub struct RecursiveObservableSet(Rc<Node<RecursiveSetState>>);

impl Default for RecursiveObservableSet {
    fn default() -> Self {
        Self::wrap(SetRef::new(), &ObserveOptions::deep(), None)
    }
}

impl RecursiveObservableSet {
    /// Wraps `target`, replacing its members by their wrapped forms.
    ///
    /// Construction is silent unless `emit_on_construction` is set.
    pub fn wrap(target: SetRef, options: &ObserveOptions, parent: Option<&ObservedRef>) -> Self {
        let state = RecursiveSetState {
            target: target.clone(),
            options: options.nested(),
            stored: RefCell::new(HashMap::new()),
        };
        let set = Self(Node::create(state, parent));

        let values = target.values();
        target.clear();
        for value in values {
            if options.emit_on_construction {
                set.add(value);
            } else {
                let wrapped = set.wrap_child(&value);
                set.0
                    .state
                    .stored
                    .borrow_mut()
                    .insert(wrapped.unwrapped(), wrapped.clone());
                target.add(wrapped);
            }
        }
        set
    }

    /// Creates a recursive observable set holding `values`.
    pub fn from_values<V, I>(
        values: I,
        options: &ObserveOptions,
        parent: Option<&ObservedRef>,
    ) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        Self::wrap(SetRef::from_values(values), options, parent)
    }

    /// Returns the wrapper held by `value`, if it is a recursive observable set.
    pub fn from_value(value: &Value) -> Option<Self> {
        value
            .as_observed()?
            .downcast::<Node<RecursiveSetState>>()
            .map(Self)
    }

    /// Returns the underlying set. It holds the wrapped members.
    pub fn target(&self) -> SetRef {
        self.0.state.target.clone()
    }

    fn wrap_child(&self, value: &Value) -> Value {
        observe(value, &self.0.state.options, Some(&self.0.route()))
    }

    /// Adds the wrapped form of `value`.
    ///
    /// The event carries `value` as given.
    pub fn add(&self, value: impl Into<Value>) -> &Self {
        let value = value.into();
        let wrapped = self.wrap_child(&value);
        if self.has(&wrapped) {
            return self;
        }
        let state = &self.0.state;
        state
            .stored
            .borrow_mut()
            .insert(wrapped.unwrapped(), wrapped.clone());
        state.target.add(wrapped);
        self.0.broadcast(EventKey::Add, Op::Add, Detail::Item(value));
        self
    }

    /// Removes `value`, raw or wrapped. Returns true if it was a member.
    pub fn delete(&self, value: &Value) -> bool {
        let state = &self.0.state;
        let stored = state
            .stored
            .borrow_mut()
            .remove(&value.unwrapped())
            .unwrap_or_else(|| value.clone());
        let removed = state.target.delete(&stored);
        if removed {
            self.0
                .broadcast(EventKey::Delete, Op::Delete, Detail::Item(value.clone()));
        }
        removed
    }

    /// Removes every member and forgets the identity map.
    pub fn clear(&self) {
        let state = &self.0.state;
        let empty = state.target.is_empty();
        state.target.clear();
        state.stored.borrow_mut().clear();
        if !empty {
            self.0.broadcast(EventKey::Clear, Op::Clear, Detail::Cleared);
        }
    }

    /// Returns true if `value`, raw or wrapped, is a member.
    pub fn has(&self, value: &Value) -> bool {
        self.0.state.target.has(value)
            || self.0.state.stored.borrow().contains_key(&value.unwrapped())
    }

    pub fn len(&self) -> usize {
        self.0.state.target.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.state.target.is_empty()
    }

    pub fn values(&self) -> Vec<Value> {
        self.0.state.target.values()
    }

    pub fn entries(&self) -> Vec<(Value, Value)> {
        self.0.state.target.entries()
    }

    pub fn for_each<F>(&self, f: F)
    where
        F: FnMut(&Value),
    {
        self.0.state.target.for_each(f);
    }
}

impl Observable for RecursiveObservableSet {
    fn as_observed(&self) -> ObservedRef {
        self.0.observed()
    }
}

pub(crate) struct WeakSetState {
    target: WeakSetRef,
}

impl State for WeakSetState {
    const KIND: ObservedKind = ObservedKind::WeakSet;

    fn target(&self) -> Value {
        Value::WeakSet(self.target.clone())
    }
}

/// An observable weak set. Members must be reference values.
#[derive(Clone)]
pub struct ObservableWeakSet(Rc<Node<WeakSetState>>);

impl Default for ObservableWeakSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ObservableWeakSet {
    /// Creates an empty observable weak set.
    pub fn new() -> Self {
        Self::wrap(WeakSetRef::new(), None)
    }

    /// Wraps `target` as is.
    pub fn wrap(target: WeakSetRef, parent: Option<&ObservedRef>) -> Self {
        Self(Node::create(WeakSetState { target }, parent))
    }

    /// Creates an observable weak set holding `values`.
    ///
    /// Fails on the first value that is not a reference value.
    pub fn from_values<I>(
        values: I,
        options: &ObserveOptions,
        parent: Option<&ObservedRef>,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = Value>,
    {
        if !options.emit_on_construction {
            return Ok(Self::wrap(WeakSetRef::from_values(values)?, parent));
        }
        let set = Self::wrap(WeakSetRef::new(), parent);
        for value in values {
            set.add(value)?;
        }
        Ok(set)
    }

    /// Returns the wrapper held by `value`, if it is an observable weak set.
    pub fn from_value(value: &Value) -> Option<Self> {
        value
            .as_observed()?
            .downcast::<Node<WeakSetState>>()
            .map(Self)
    }

    /// Returns the underlying weak set.
    pub fn target(&self) -> WeakSetRef {
        self.0.state.target.clone()
    }

    /// Adds `value`. Fails if it is not a reference value.
    pub fn add(&self, value: impl Into<Value>) -> Result<&Self> {
        let value = value.into();
        let target = &self.0.state.target;
        let present = target.has(&value);
        target.add(&value)?;
        if !present {
            self.0.broadcast(EventKey::Add, Op::Add, Detail::Item(value));
        }
        Ok(self)
    }

    /// Removes `value`. Returns true if it was a member.
    pub fn delete(&self, value: &Value) -> bool {
        let removed = self.0.state.target.delete(value);
        if removed {
            self.0
                .broadcast(EventKey::Delete, Op::Delete, Detail::Item(value.clone()));
        }
        removed
    }

    pub fn has(&self, value: &Value) -> bool {
        self.0.state.target.has(value)
    }

    /// Returns the number of live members.
    pub fn len(&self) -> usize {
        self.0.state.target.live_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops dead members. Returns the count.
    pub fn purge(&self) -> usize {
        self.0.state.target.purge()
    }
}

impl Observable for ObservableWeakSet {
    fn as_observed(&self) -> ObservedRef {
        self.0.observed()
    }
}
