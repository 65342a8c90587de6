//! Observable wrapper over an object store.
//!
//! `ObservableObject` forwards reads and writes to its target object and
//! broadcasts a property event plus `change` for every real change. With
//! recursive wrapping, structured values read or written through the
//! wrapper are wrapped themselves, and their changes are routed to the
//! ancestor-most wrapper.

use crate::node::{Node, Observable, State};
use crate::observe::observe;
use crate::options::ObserveOptions;
use hashbrown::HashSet;
use std::rc::Rc;
use tracing::warn;
use vigil_core::{
    Detail, Error, EventKey, ObjectRef, ObservedKind, ObservedRef, Op, Property,
    PropertyDescriptor, PropertyKey, Result, Value,
};

pub(crate) struct ObjectState {
    target: ObjectRef,
    recursive: bool,
    /// Keys whose values are never wrapped.
    denied: HashSet<PropertyKey>,
    /// When set, only definitions of these keys emit.
    fields: Option<HashSet<PropertyKey>>,
}

impl State for ObjectState {
    const KIND: ObservedKind = ObservedKind::Object;

    fn target(&self) -> Value {
        Value::Object(self.target.clone())
    }
}

/// An observable object.
///
/// # Example
///
/// ```rust
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use vigil_core::{listener, ObjectRef};
/// use vigil_reactive::{Observable, ObservableObject, ObserveOptions};
///
/// let obj = ObservableObject::new(ObjectRef::new(), &ObserveOptions::default(), None);
/// let seen = Rc::new(RefCell::new(Vec::new()));
/// let seen_clone = seen.clone();
/// obj.on("name", listener(move |event| seen_clone.borrow_mut().push(event.value())));
///
/// obj.set("name", "Alice").unwrap();
/// obj.set("name", "Alice").unwrap(); // unchanged, no event
/// assert_eq!(seen.borrow().len(), 1);
/// ```
#[derive(Clone)]
pub struct ObservableObject(Rc<Node<ObjectState>>);

impl ObservableObject {
    /// Wraps `target`.
    ///
    /// The deny set is `black_list`, plus every key on the prototype chain
    /// unless `observe_prototypes` is set, minus `white_list`.
    pub fn new(target: ObjectRef, options: &ObserveOptions, parent: Option<&ObservedRef>) -> Self {
        let mut denied: HashSet<PropertyKey> = options.black_list.iter().cloned().collect();
        if !options.observe_prototypes {
            denied.extend(target.prototype_keys());
        }
        for key in &options.white_list {
            denied.remove(key);
        }
        Self::build(target, options.recursive, denied, None, parent)
    }

    /// Wraps `target` so that only definitions of `fields` emit. Deletes
    /// always emit. Values are not wrapped.
    pub(crate) fn with_fields(
        target: ObjectRef,
        fields: HashSet<PropertyKey>,
        parent: Option<&ObservedRef>,
    ) -> Self {
        Self::build(target, false, HashSet::new(), Some(fields), parent)
    }

    fn build(
        target: ObjectRef,
        recursive: bool,
        denied: HashSet<PropertyKey>,
        fields: Option<HashSet<PropertyKey>>,
        parent: Option<&ObservedRef>,
    ) -> Self {
        let state = ObjectState {
            target,
            recursive,
            denied,
            fields,
        };
        Self(Node::create(state, parent))
    }

    /// Returns the wrapper held by `value`, if it is an observable object.
    pub fn from_value(value: &Value) -> Option<Self> {
        value
            .as_observed()?
            .downcast::<Node<ObjectState>>()
            .map(Self)
    }

    /// Returns the underlying object.
    pub fn target(&self) -> ObjectRef {
        self.0.state.target.clone()
    }

    /// Returns true if `key` is never wrapped.
    pub fn is_denied(&self, key: &PropertyKey) -> bool {
        self.0.state.denied.contains(key)
    }

    fn emits(&self, key: &PropertyKey) -> bool {
        self.0
            .state
            .fields
            .as_ref()
            .map_or(true, |fields| fields.contains(key))
    }

    fn wraps(&self, key: &PropertyKey) -> bool {
        self.0.state.recursive && !self.is_denied(key)
    }

    /// Reads `key` through the prototype chain.
    ///
    /// Getters run with the wrapper as receiver. For wrapped keys, a
    /// structured result is returned wrapped; a raw result is replaced on
    /// the target by its wrapper so the next read finds it cached.
    pub fn get(&self, key: impl Into<PropertyKey>) -> Value {
        let key = key.into();
        let target = &self.0.state.target;
        let value = target.get_with_receiver(&key, &self.to_value());
        if !self.wraps(&key) || !value.is_structured() {
            return value;
        }

        let wrapped = observe(&value, &ObserveOptions::deep(), Some(&self.0.route()));
        if !value.is_observed() {
            // Written to the target directly so the cache fill does not emit.
            if let Err(err) = target.set(key.clone(), wrapped.clone()) {
                warn!(key = %key, error = %err, "failed to cache observable wrapper on target");
            }
        }
        wrapped
    }

    /// Assigns `value` to `key`.
    ///
    /// A setter found on the chain is invoked with the wrapper as receiver.
    /// Otherwise the value is defined on the wrapper, updating an existing
    /// own property or creating a plain data property.
    pub fn set(&self, key: impl Into<PropertyKey>, value: impl Into<Value>) -> Result<()> {
        let key = key.into();
        let value = value.into();
        let target = &self.0.state.target;
        match target.lookup(&key) {
            Some(Property::Accessor { set: Some(setter), .. }) => {
                setter.call(&self.to_value(), &[value]);
                Ok(())
            }
            Some(Property::Accessor { set: None, .. })
            | Some(Property::Data { writable: false, .. }) => Err(Error::not_writable(key)),
            _ => {
                let desc = if target.has_own(&key) {
                    PropertyDescriptor::value(value)
                } else {
                    PropertyDescriptor::data(value)
                };
                self.define_property(key, desc)
            }
        }
    }

    /// Defines `key` on the target and broadcasts unless the descriptor
    /// matches the existing property.
    ///
    /// The underlying store is written either way.
    pub fn define_property(
        &self,
        key: impl Into<PropertyKey>,
        mut desc: PropertyDescriptor,
    ) -> Result<()> {
        let key = key.into();
        if self.wraps(&key) {
            if let Some(value) = desc.value.as_ref().filter(|v| v.is_structured()) {
                desc.value = Some(observe(value, &ObserveOptions::deep(), Some(&self.0.route())));
            }
        }

        let target = &self.0.state.target;
        let unchanged = desc.is_unchanged(target.get_own_property(&key).as_ref());
        target.define_own_property(key.clone(), &desc)?;

        if !unchanged && self.emits(&key) {
            let value = desc.value.clone().unwrap_or_default();
            self.0.broadcast(
                EventKey::Property(key.clone()),
                Op::Set,
                Detail::Property {
                    key,
                    value,
                    descriptor: Some(desc),
                },
            );
        }
        Ok(())
    }

    /// Deletes the own property `key`.
    ///
    /// Broadcasts only when a property was actually removed.
    pub fn delete(&self, key: impl Into<PropertyKey>) -> Result<bool> {
        let key = key.into();
        let removed = self.0.state.target.delete(&key)?;
        if removed {
            self.0.broadcast(
                EventKey::Property(key.clone()),
                Op::Delete,
                Detail::Property {
                    key,
                    value: Value::Undefined,
                    descriptor: None,
                },
            );
        }
        Ok(removed)
    }

    /// Returns true if `key` is found on the target or its prototype chain.
    pub fn has(&self, key: impl Into<PropertyKey>) -> bool {
        self.0.state.target.has(&key.into())
    }

    /// Returns true if `key` is an own property of the target.
    pub fn has_own(&self, key: impl Into<PropertyKey>) -> bool {
        self.0.state.target.has_own(&key.into())
    }

    /// Returns the target's own keys in insertion order.
    pub fn keys(&self) -> Vec<PropertyKey> {
        self.0.state.target.own_keys()
    }

    /// Returns the target's own property under `key`.
    pub fn get_own_property(&self, key: impl Into<PropertyKey>) -> Option<Property> {
        self.0.state.target.get_own_property(&key.into())
    }
}

impl Observable for ObservableObject {
    fn as_observed(&self) -> ObservedRef {
        self.0.observed()
    }
}

impl PartialEq for ObservableObject {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl std::fmt::Debug for ObservableObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ObservableObject")
            .field(&self.0.state.target)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use tracing_test::traced_test;
    use vigil_core::{listener, Event, FunctionRef};

    type Log = Rc<RefCell<Vec<(String, Op)>>>;

    fn record(obs: &ObservableObject, key: impl Into<EventKey>, log: &Log, tag: &str) {
        let log = log.clone();
        let tag = tag.to_string();
        obs.on(
            key,
            listener(move |e: &Event| log.borrow_mut().push((tag.clone(), e.op))),
        );
    }

    fn deep(target: ObjectRef) -> ObservableObject {
        ObservableObject::new(target, &ObserveOptions::deep(), None)
    }

    #[test]
    fn test_set_emits_key_then_change() {
        let obj = ObservableObject::new(ObjectRef::new(), &ObserveOptions::default(), None);
        let log: Log = Rc::default();
        record(&obj, "x", &log, "x");
        record(&obj, EventKey::Change, &log, "change");

        obj.set("x", 1).unwrap();
        assert_eq!(
            *log.borrow(),
            vec![("x".to_string(), Op::Set), ("change".to_string(), Op::Set)]
        );
        assert_eq!(obj.get("x"), Value::from(1));
    }

    #[test]
    fn test_unchanged_write_is_silent_but_written() {
        let target = ObjectRef::from_entries([("x", 1)]);
        let obj = ObservableObject::new(target.clone(), &ObserveOptions::default(), None);
        let log: Log = Rc::default();
        record(&obj, EventKey::Change, &log, "change");

        obj.set("x", 1).unwrap();
        assert!(log.borrow().is_empty());
        assert_eq!(target.get(&"x".into()), Value::from(1));
    }

    #[test]
    fn test_delete_emits_only_on_removal() {
        let obj = ObservableObject::new(
            ObjectRef::from_entries([("x", 1)]),
            &ObserveOptions::default(),
            None,
        );
        let log: Log = Rc::default();
        record(&obj, "x", &log, "x");

        assert_eq!(obj.delete("missing"), Ok(false));
        assert!(log.borrow().is_empty());
        assert_eq!(obj.delete("x"), Ok(true));
        assert_eq!(*log.borrow(), vec![("x".to_string(), Op::Delete)]);
    }

    #[test]
    fn test_listener_panic_unwinds_after_store_write() {
        use std::panic::{catch_unwind, AssertUnwindSafe};

        let obj = ObservableObject::new(ObjectRef::new(), &ObserveOptions::default(), None);
        let later = Rc::new(RefCell::new(0));
        let later_clone = later.clone();
        obj.on("x", listener(|_| panic!("listener failed")));
        obj.on("x", listener(move |_| *later_clone.borrow_mut() += 1));

        let result = catch_unwind(AssertUnwindSafe(|| obj.set("x", 1)));
        assert!(result.is_err());
        assert_eq!(*later.borrow(), 0);
        assert_eq!(obj.target().get(&"x".into()), Value::from(1));

        // No borrow is left held, so the wrapper keeps working.
        obj.off(Some(&EventKey::property("x")));
        obj.set("x", 2).unwrap();
        assert_eq!(obj.get("x"), Value::from(2));
    }

    #[test]
    fn test_recursive_read_wraps_and_caches() {
        let child = ObjectRef::new();
        let target = ObjectRef::from_entries([("child", Value::from(child.clone()))]);
        let obj = deep(target.clone());

        let first = obj.get("child");
        assert!(first.is_observed());
        assert_eq!(first.unwrapped(), Value::from(child));
        // Cached on the target, so the same wrapper comes back.
        assert_eq!(target.get(&"child".into()), first);
        assert_eq!(obj.get("child"), first);
    }

    #[test]
    fn test_cache_fill_does_not_emit() {
        let target = ObjectRef::from_entries([("child", Value::from(ObjectRef::new()))]);
        let obj = deep(target);
        let log: Log = Rc::default();
        record(&obj, EventKey::Change, &log, "change");
        obj.get("child");
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_child_change_propagates_to_parent() {
        let target = ObjectRef::from_entries([("child", Value::from(ObjectRef::new()))]);
        let parent = deep(target);
        let child = ObservableObject::from_value(&parent.get("child")).unwrap();

        let log: Log = Rc::default();
        record(&child, "x", &log, "child.x");
        record(&child, EventKey::Change, &log, "child.change");
        record(&parent, EventKey::Change, &log, "parent.change");

        child.set("x", 1).unwrap();
        let tags: Vec<String> = log.borrow().iter().map(|(t, _)| t.clone()).collect();
        assert_eq!(tags, vec!["child.x", "child.change", "parent.change"]);
    }

    #[test]
    fn test_grandchild_routes_to_root() {
        let grandchild = ObjectRef::new();
        let child = ObjectRef::from_entries([("g", Value::from(grandchild))]);
        let root = deep(ObjectRef::from_entries([("c", Value::from(child))]));

        let c = ObservableObject::from_value(&root.get("c")).unwrap();
        let g = ObservableObject::from_value(&c.get("g")).unwrap();
        assert_eq!(g.parent(), Some(root.as_observed()));

        let count = Rc::new(RefCell::new(0));
        let count_clone = count.clone();
        root.on(EventKey::Change, listener(move |_| *count_clone.borrow_mut() += 1));
        g.set("leaf", true).unwrap();
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn test_recursive_write_wraps_value() {
        let obj = deep(ObjectRef::new());
        let raw = ObjectRef::new();
        obj.set("child", raw.clone()).unwrap();
        let stored = obj.target().get(&"child".into());
        assert!(stored.is_observed());
        assert_eq!(stored.unwrapped(), Value::from(raw));
        assert_eq!(stored.as_observed().unwrap().parent(), Some(obj.as_observed()));
    }

    #[test]
    fn test_rewriting_same_child_is_silent() {
        let raw = ObjectRef::new();
        let obj = deep(ObjectRef::new());
        obj.set("child", raw.clone()).unwrap();
        let log: Log = Rc::default();
        record(&obj, EventKey::Change, &log, "change");
        // The raw value wraps to the wrapper already stored.
        let keep = obj.get("child");
        obj.set("child", raw).unwrap();
        assert!(log.borrow().is_empty());
        drop(keep);
    }

    #[test]
    fn test_black_list_not_wrapped() {
        let target = ObjectRef::from_entries([("raw", Value::from(ObjectRef::new()))]);
        let obj = ObservableObject::new(
            target,
            &ObserveOptions::deep().black_list(["raw"]),
            None,
        );
        assert!(obj.is_denied(&"raw".into()));
        assert!(!obj.get("raw").is_observed());
    }

    #[test]
    fn test_prototype_keys_denied_unless_white_listed() {
        let proto = ObjectRef::from_entries([
            ("shared", Value::from(ObjectRef::new())),
            ("allowed", Value::from(ObjectRef::new())),
        ]);
        let target = ObjectRef::with_proto(Some(proto));
        let obj = ObservableObject::new(
            target.clone(),
            &ObserveOptions::deep().white_list(["allowed"]),
            None,
        );
        assert!(obj.is_denied(&"shared".into()));
        assert!(!obj.get("shared").is_observed());
        assert!(obj.get("allowed").is_observed());

        let open = ObservableObject::new(
            ObjectRef::with_proto(target.proto()),
            &ObserveOptions::deep().observe_prototypes(true),
            None,
        );
        assert!(!open.is_denied(&"shared".into()));
    }

    #[test]
    fn test_non_recursive_returns_raw() {
        let child = ObjectRef::new();
        let obj = ObservableObject::new(
            ObjectRef::from_entries([("c", Value::from(child.clone()))]),
            &ObserveOptions::default(),
            None,
        );
        assert_eq!(obj.get("c"), Value::from(child));
    }

    #[test]
    #[traced_test]
    fn test_failed_cache_write_warns_and_returns_wrapper() {
        let child = ObjectRef::new();
        let getter_child = child.clone();
        let getter = FunctionRef::new(move |_, _| Value::from(getter_child.clone()));
        let target = ObjectRef::new();
        target
            .define_own_property(
                "child".into(),
                &PropertyDescriptor::accessor(Some(getter), None).configurable(true),
            )
            .unwrap();
        let obj = deep(target);

        let value = obj.get("child");
        assert!(value.is_observed());
        assert_eq!(value.unwrapped(), Value::from(child));
        assert!(logs_contain("failed to cache observable wrapper on target"));
    }

    #[test]
    fn test_setter_receives_wrapper() {
        let seen = Rc::new(RefCell::new(Value::Undefined));
        let seen_clone = seen.clone();
        let setter = FunctionRef::new(move |this, _| {
            *seen_clone.borrow_mut() = this.clone();
            Value::Undefined
        });
        let target = ObjectRef::new();
        target
            .define_own_property("x".into(), &PropertyDescriptor::accessor(None, Some(setter)))
            .unwrap();
        let obj = ObservableObject::new(target, &ObserveOptions::default(), None);
        obj.set("x", 1).unwrap();
        assert_eq!(*seen.borrow(), obj.to_value());
    }

    #[test]
    fn test_read_only_assignment_fails() {
        let target = ObjectRef::new();
        target
            .define_own_property("x".into(), &PropertyDescriptor::data(1).writable(false))
            .unwrap();
        let obj = ObservableObject::new(target, &ObserveOptions::default(), None);
        assert_eq!(obj.set("x", 2), Err(Error::not_writable("x")));
    }

    #[test]
    fn test_event_detail() {
        let obj = ObservableObject::new(ObjectRef::new(), &ObserveOptions::default(), None);
        let captured = Rc::new(RefCell::new(None));
        let captured_clone = captured.clone();
        obj.on(
            EventKey::Change,
            listener(move |e| *captured_clone.borrow_mut() = Some(e.clone())),
        );
        obj.set("name", "vigil").unwrap();
        let event = captured.borrow_mut().take().unwrap();
        assert_eq!(event.key, EventKey::Change);
        assert_eq!(event.property_key(), Some(&PropertyKey::from("name")));
        assert_eq!(event.value(), Value::from("vigil"));
        assert_eq!(event.source, obj.as_observed());
    }
}
