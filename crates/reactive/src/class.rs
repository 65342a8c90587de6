//! Declarative observable fields on classes.
//!
//! A [`Class`] is a prototype object plus field initializers, built with a
//! [`ClassBuilder`]. The [`ClassRegistry`] records, per class, which fields
//! are observable. Instances created by [`ClassRegistry::instantiate`] are
//! [`ObservableObject`]s that emit only for the observable fields of their
//! class and every ancestor, with handlers bound to each of those fields.
//!
//! A handler comes from the class's explicit binding table, or failing that
//! from a method named by [`handler_name`] on the prototype chain. Either
//! way it runs with the raw, unwrapped instance as `this`.
//!
//! # Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use vigil_core::Value;
//! use vigil_reactive::{ClassBuilder, ClassRegistry};
//!
//! let registry = ClassRegistry::new();
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let seen_clone = seen.clone();
//! let counter = ClassBuilder::new("Counter")
//!     .field("count", 0)
//!     .observe("count")
//!     .handler("count", move |_this, event| seen_clone.borrow_mut().push(event.value()))
//!     .build(&registry)
//!     .unwrap();
//!
//! let instance = registry.instantiate(&counter, None).unwrap();
//! instance.set("count", 1).unwrap();
//! assert_eq!(*seen.borrow(), vec![Value::from(0), Value::from(1)]);
//! ```

use crate::node::Observable;
use crate::object::ObservableObject;
use hashbrown::{HashMap, HashSet};
use indexmap::{IndexMap, IndexSet};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;
use vigil_core::{
    listener, Event, EventKey, FunctionRef, Listener, ObjectRef, ObservedRef, PropertyDescriptor,
    PropertyKey, Result, Value,
};

/// Unique identifier for a class.
pub type ClassId = u64;

/// Global class id counter.
static NEXT_CLASS_ID: AtomicU64 = AtomicU64::new(1);

/// A field change handler. Receives the raw instance and the event.
pub type Handler = Rc<dyn Fn(&Value, &Event)>;

type Initializer = Rc<dyn Fn() -> Value>;

struct ClassDef {
    id: ClassId,
    name: Rc<str>,
    parent: Option<Class>,
    prototype: ObjectRef,
    fields: Vec<(PropertyKey, Initializer)>,
    handlers: IndexMap<PropertyKey, Handler>,
}

/// A class: a shared prototype, field initializers and handler bindings.
#[derive(Clone)]
pub struct Class(Rc<ClassDef>);

impl Class {
    /// Returns the class id.
    #[inline]
    pub fn id(&self) -> ClassId {
        self.0.id
    }

    /// Returns the class name.
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Returns the superclass.
    pub fn parent(&self) -> Option<&Class> {
        self.0.parent.as_ref()
    }

    /// Returns the prototype shared by instances.
    pub fn prototype(&self) -> &ObjectRef {
        &self.0.prototype
    }

    /// Returns this class followed by its ancestors, most derived first.
    pub fn lineage(&self) -> Vec<Class> {
        let mut chain = vec![self.clone()];
        let mut current = self.parent();
        while let Some(class) = current {
            chain.push(class.clone());
            current = class.parent();
        }
        chain
    }

    /// Returns true if `self` is `other` or derives from it.
    pub fn is_subclass_of(&self, other: &Class) -> bool {
        self.lineage().iter().any(|c| c.id() == other.id())
    }

    fn explicit_handler(&self, key: &PropertyKey) -> Option<Handler> {
        self.lineage()
            .into_iter()
            .find_map(|class| class.0.handlers.get(key).cloned())
    }
}

impl PartialEq for Class {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("id", &self.id())
            .field("name", &self.name())
            .finish()
    }
}

/// Builder for [`Class`].
pub struct ClassBuilder {
    name: Rc<str>,
    parent: Option<Class>,
    fields: Vec<(PropertyKey, Initializer)>,
    methods: Vec<(PropertyKey, FunctionRef)>,
    observed: Vec<PropertyKey>,
    handlers: IndexMap<PropertyKey, Handler>,
}

impl ClassBuilder {
    /// Starts a class named `name`.
    pub fn new(name: &str) -> Self {
        Self {
            name: Rc::from(name),
            parent: None,
            fields: Vec::new(),
            methods: Vec::new(),
            observed: Vec::new(),
            handlers: IndexMap::new(),
        }
    }

    /// Sets the superclass.
    pub fn extends(mut self, parent: &Class) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    /// Declares a field initialised to a clone of `initial`.
    pub fn field(self, key: impl Into<PropertyKey>, initial: impl Into<Value>) -> Self {
        let initial = initial.into();
        self.field_with(key, move || initial.clone())
    }

    /// Declares a field initialised by calling `init` for each instance.
    pub fn field_with<F>(mut self, key: impl Into<PropertyKey>, init: F) -> Self
    where
        F: Fn() -> Value + 'static,
    {
        self.fields.push((key.into(), Rc::new(init)));
        self
    }

    /// Installs a method on the class prototype.
    pub fn method(mut self, name: impl Into<PropertyKey>, method: FunctionRef) -> Self {
        self.methods.push((name.into(), method));
        self
    }

    /// Marks a field observable on this class.
    pub fn observe(mut self, key: impl Into<PropertyKey>) -> Self {
        self.observed.push(key.into());
        self
    }

    /// Binds `handler` to changes of `key`.
    pub fn handler<F>(mut self, key: impl Into<PropertyKey>, handler: F) -> Self
    where
        F: Fn(&Value, &Event) + 'static,
    {
        self.handlers.insert(key.into(), Rc::new(handler));
        self
    }

    /// Builds the class and registers its observable fields.
    pub fn build(self, registry: &ClassRegistry) -> Result<Class> {
        let prototype = ObjectRef::with_proto(self.parent.as_ref().map(|p| p.prototype().clone()));
        for (name, method) in self.methods {
            prototype.define_own_property(
                name,
                &PropertyDescriptor::data(method).enumerable(false),
            )?;
        }

        let class = Class(Rc::new(ClassDef {
            id: NEXT_CLASS_ID.fetch_add(1, Ordering::Relaxed),
            name: self.name,
            parent: self.parent,
            prototype,
            fields: self.fields,
            handlers: self.handlers,
        }));
        for key in self.observed {
            registry.obs_ref(&class, key);
        }
        Ok(class)
    }
}

/// Returns the conventional handler method name for a field:
/// `on` + the key with its first letter capitalised for string keys,
/// `on` + the decimal index for index keys, and `on` + the symbol's display
/// form otherwise.
pub fn handler_name(key: &PropertyKey) -> String {
    match key {
        PropertyKey::String(s) => {
            let mut chars = s.chars();
            match chars.next() {
                Some(first) => format!("on{}{}", first.to_uppercase(), chars.as_str()),
                None => "on".to_string(),
            }
        }
        PropertyKey::Index(i) => format!("on{}", i),
        PropertyKey::Symbol(sym) => format!("on{}", sym),
    }
}

/// Registry of observable fields per class.
///
/// Append-only: declarations are never removed.
#[derive(Debug, Default)]
pub struct ClassRegistry {
    declared: RefCell<HashMap<ClassId, IndexSet<PropertyKey>>>,
}

impl ClassRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `class` declares `key` observable.
    pub fn obs_ref(&self, class: &Class, key: impl Into<PropertyKey>) {
        let key = key.into();
        debug!(class = %class.name(), field = %key, "observable field declared");
        self.declared
            .borrow_mut()
            .entry(class.id())
            .or_default()
            .insert(key);
    }

    /// Returns the fields declared observable on exactly `class`.
    pub fn declared_fields(&self, class: &Class) -> Vec<PropertyKey> {
        self.declared
            .borrow()
            .get(&class.id())
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns the observable fields of `class` and all its ancestors,
    /// most derived first, without duplicates.
    pub fn observed_fields(&self, class: &Class) -> Vec<PropertyKey> {
        let declared = self.declared.borrow();
        let mut fields = IndexSet::new();
        for ancestor in class.lineage() {
            if let Some(keys) = declared.get(&ancestor.id()) {
                fields.extend(keys.iter().cloned());
            }
        }
        fields.into_iter().collect()
    }

    /// Returns the number of classes with declarations.
    pub fn len(&self) -> usize {
        self.declared.borrow().len()
    }

    /// Returns true if nothing has been declared.
    pub fn is_empty(&self) -> bool {
        self.declared.borrow().is_empty()
    }

    /// Creates an instance of `class`.
    ///
    /// The instance is wrapped so that only observable fields emit, handlers
    /// are bound for those fields, and then field initializers run through
    /// the wrapper, root class first.
    pub fn instantiate(&self, class: &Class, parent: Option<&ObservedRef>) -> Result<ObservableObject> {
        let raw = ObjectRef::with_proto(Some(class.prototype().clone()));
        let fields = self.observed_fields(class);
        let filter: HashSet<PropertyKey> = fields.iter().cloned().collect();
        let instance = ObservableObject::with_fields(raw.clone(), filter, parent);

        let this = Value::Object(raw);
        for key in &fields {
            if let Some(handler) = bind_handler(class, key, &this) {
                instance.on(EventKey::Property(key.clone()), handler);
            }
        }

        for ancestor in class.lineage().iter().rev() {
            for (key, init) in &ancestor.0.fields {
                instance.define_property(key.clone(), PropertyDescriptor::data(init()))?;
            }
        }
        debug!(class = %class.name(), fields = fields.len(), "instance created");
        Ok(instance)
    }
}

/// Resolves the handler for `key` and binds it to `this`.
fn bind_handler(class: &Class, key: &PropertyKey, this: &Value) -> Option<Listener> {
    if let Some(handler) = class.explicit_handler(key) {
        let this = this.clone();
        return Some(listener(move |event| handler(&this, event)));
    }

    let name = PropertyKey::from(handler_name(key));
    let method = match this.as_object()?.get(&name) {
        Value::Function(method) => method,
        _ => return None,
    };
    let this = this.clone();
    Some(listener(move |event| {
        let key = event.property_key().map(Value::from).unwrap_or_default();
        method.call(&this, &[event.value(), Value::from(event.op.to_string()), key]);
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::{Op, Symbol};

    type Calls = Rc<RefCell<Vec<(String, Value)>>>;

    fn recording_method(calls: &Calls, tag: &str) -> FunctionRef {
        let calls = calls.clone();
        let tag = tag.to_string();
        FunctionRef::new(move |_, args| {
            calls.borrow_mut().push((tag.clone(), args[0].clone()));
            Value::Undefined
        })
    }

    #[test]
    fn test_handler_name() {
        assert_eq!(handler_name(&"foo".into()), "onFoo");
        assert_eq!(handler_name(&"x".into()), "onX");
        assert_eq!(handler_name(&"".into()), "on");
        assert_eq!(handler_name(&PropertyKey::Index(3)), "on3");
        let sym = Symbol::new(Some("tag"));
        assert_eq!(handler_name(&sym.into()), "onSymbol(tag)");
    }

    #[test]
    fn test_observed_fields_union() {
        let registry = ClassRegistry::new();
        let one = ClassBuilder::new("One").observe("a").build(&registry).unwrap();
        let two = ClassBuilder::new("Two")
            .extends(&one)
            .observe("b")
            .build(&registry)
            .unwrap();
        let three = ClassBuilder::new("Three")
            .extends(&two)
            .observe("c")
            .observe("a")
            .build(&registry)
            .unwrap();

        assert_eq!(registry.declared_fields(&two), vec![PropertyKey::from("b")]);
        assert_eq!(
            registry.observed_fields(&three),
            vec![PropertyKey::from("c"), PropertyKey::from("a"), PropertyKey::from("b")]
        );
        assert_eq!(registry.len(), 3);
        assert!(three.is_subclass_of(&one));
        assert!(!one.is_subclass_of(&three));
    }

    #[test]
    fn test_inherited_fields_emit() {
        let registry = ClassRegistry::new();
        let one = ClassBuilder::new("One").field("a", 0).observe("a").build(&registry).unwrap();
        let two = ClassBuilder::new("Two")
            .extends(&one)
            .field("b", 0)
            .observe("b")
            .build(&registry)
            .unwrap();
        let three = ClassBuilder::new("Three")
            .extends(&two)
            .field("c", 0)
            .observe("c")
            .build(&registry)
            .unwrap();
        let instance = registry.instantiate(&three, None).unwrap();

        let keys = Rc::new(RefCell::new(Vec::new()));
        let keys_clone = keys.clone();
        instance.on(
            EventKey::Change,
            listener(move |e| keys_clone.borrow_mut().push(e.property_key().cloned())),
        );
        instance.set("a", 1).unwrap();
        instance.set("b", 1).unwrap();
        instance.set("c", 1).unwrap();
        instance.set("untracked", 1).unwrap();
        assert_eq!(
            *keys.borrow(),
            vec![
                Some(PropertyKey::from("a")),
                Some(PropertyKey::from("b")),
                Some(PropertyKey::from("c"))
            ]
        );
    }

    #[test]
    fn test_redeclared_field_single_stream() {
        let registry = ClassRegistry::new();
        let calls: Calls = Rc::default();
        let base = ClassBuilder::new("Base")
            .field("x", 1)
            .observe("x")
            .method("onX", recording_method(&calls, "onX"))
            .build(&registry)
            .unwrap();
        let derived = ClassBuilder::new("Derived")
            .extends(&base)
            .field("x", 2)
            .observe("x")
            .build(&registry)
            .unwrap();

        let instance = registry.instantiate(&derived, None).unwrap();
        assert_eq!(instance.get("x"), Value::from(2));
        calls.borrow_mut().clear();

        instance.set("x", 3).unwrap();
        assert_eq!(*calls.borrow(), vec![("onX".to_string(), Value::from(3))]);
    }

    #[test]
    fn test_conventional_handler_bound_to_raw_instance() {
        let registry = ClassRegistry::new();
        let this_seen = Rc::new(RefCell::new(Value::Undefined));
        let this_clone = this_seen.clone();
        let on_foo = FunctionRef::new(move |this, args| {
            *this_clone.borrow_mut() = this.clone();
            assert_eq!(args[1], Value::from("set"));
            assert_eq!(args[2], Value::from("foo"));
            Value::Undefined
        });
        let class = ClassBuilder::new("Widget")
            .observe("foo")
            .method("onFoo", on_foo)
            .build(&registry)
            .unwrap();

        let instance = registry.instantiate(&class, None).unwrap();
        instance.set("foo", true).unwrap();
        assert_eq!(*this_seen.borrow(), Value::from(instance.target()));
        assert_ne!(*this_seen.borrow(), instance.to_value());
    }

    #[test]
    fn test_explicit_handler_wins_over_convention() {
        let registry = ClassRegistry::new();
        let calls: Calls = Rc::default();
        let explicit_calls = calls.clone();
        let class = ClassBuilder::new("Widget")
            .observe("foo")
            .method("onFoo", recording_method(&calls, "convention"))
            .handler("foo", move |_, event| {
                explicit_calls
                    .borrow_mut()
                    .push(("explicit".to_string(), event.value()));
            })
            .build(&registry)
            .unwrap();

        let instance = registry.instantiate(&class, None).unwrap();
        instance.set("foo", 1).unwrap();
        assert_eq!(*calls.borrow(), vec![("explicit".to_string(), Value::from(1))]);
    }

    #[test]
    fn test_index_field_handler() {
        let registry = ClassRegistry::new();
        let calls: Calls = Rc::default();
        let class = ClassBuilder::new("Row")
            .observe(0u32)
            .method("on0", recording_method(&calls, "on0"))
            .build(&registry)
            .unwrap();
        let instance = registry.instantiate(&class, None).unwrap();
        instance.set(0u32, "first").unwrap();
        assert_eq!(*calls.borrow(), vec![("on0".to_string(), Value::from("first"))]);
    }

    #[test]
    fn test_initializers_emit_through_wrapper() {
        let registry = ClassRegistry::new();
        let calls: Calls = Rc::default();
        let class = ClassBuilder::new("Init")
            .field("n", 5)
            .observe("n")
            .method("onN", recording_method(&calls, "onN"))
            .build(&registry)
            .unwrap();
        registry.instantiate(&class, None).unwrap();
        assert_eq!(*calls.borrow(), vec![("onN".to_string(), Value::from(5))]);
    }

    #[test]
    fn test_field_with_fresh_values() {
        let registry = ClassRegistry::new();
        let class = ClassBuilder::new("Holder")
            .field_with("items", || Value::from(ObjectRef::new()))
            .build(&registry)
            .unwrap();
        let a = registry.instantiate(&class, None).unwrap();
        let b = registry.instantiate(&class, None).unwrap();
        assert_ne!(a.get("items"), b.get("items"));
    }

    #[test]
    fn test_delete_emits_for_every_field() {
        let registry = ClassRegistry::new();
        let class = ClassBuilder::new("Plain")
            .field("tracked", 1)
            .field("other", 1)
            .observe("tracked")
            .build(&registry)
            .unwrap();
        let instance = registry.instantiate(&class, None).unwrap();
        let ops = Rc::new(RefCell::new(Vec::new()));
        let ops_clone = ops.clone();
        instance.on(EventKey::Change, listener(move |e| ops_clone.borrow_mut().push(e.op)));

        assert_eq!(instance.delete("other"), Ok(true));
        assert_eq!(instance.delete("tracked"), Ok(true));
        assert_eq!(instance.delete("other"), Ok(false));
        assert_eq!(*ops.borrow(), vec![Op::Delete, Op::Delete]);

        // Unobserved fields still stay silent on definition.
        instance.set("other", 2).unwrap();
        assert_eq!(ops.borrow().len(), 2);
    }

    #[test]
    fn test_instance_propagates_to_parent() {
        let registry = ClassRegistry::new();
        let class = ClassBuilder::new("Child").observe("v").build(&registry).unwrap();
        let owner = crate::ObservableSet::new();
        let instance = registry
            .instantiate(&class, Some(&owner.as_observed()))
            .unwrap();

        let count = Rc::new(RefCell::new(0));
        let count_clone = count.clone();
        owner.on(EventKey::Change, listener(move |_| *count_clone.borrow_mut() += 1));
        instance.set("v", 1).unwrap();
        assert_eq!(*count.borrow(), 1);
    }
}
