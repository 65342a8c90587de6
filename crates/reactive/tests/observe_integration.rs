//! Integration tests for wrapping, emission and propagation across wrapper
//! kinds.

use std::cell::RefCell;
use std::rc::Rc;
use vigil_core::{
    listener, EventKey, FunctionRef, MapRef, ObjectRef, PropertyDescriptor, SetRef, Value,
    WeakMapRef,
};
use vigil_reactive::{
    obs, observe, ClassBuilder, Observable, ObservableMap, ObservableObject, ObservableSet,
    ObserveOptions, ReactiveContext, RecursiveObservableMap, RecursiveObservableSet,
    RecursiveObservableWeakMap,
};

type Log = Rc<RefCell<Vec<String>>>;

/// Records `tag:event-key` for every delivery on `key`.
fn record<O: Observable>(wrapper: &O, tag: &'static str, key: impl Into<EventKey>, log: &Log) {
    let log = log.clone();
    wrapper.on(
        key,
        listener(move |event| log.borrow_mut().push(format!("{}:{}", tag, event.key))),
    );
}

fn record_all<O: Observable>(wrapper: &O, tag: &'static str, keys: &[EventKey], log: &Log) {
    for key in keys {
        record(wrapper, tag, key.clone(), log);
    }
}

#[test]
fn wrapping_is_idempotent_for_every_kind() {
    let values = [
        Value::from(ObjectRef::new()),
        Value::from(MapRef::new()),
        Value::from(SetRef::new()),
        Value::from(WeakMapRef::new()),
    ];
    for value in values {
        let once = obs(value.clone());
        assert!(once.is_observed());
        assert_eq!(obs(once.clone()), once);
        assert_eq!(observe(&value, &ObserveOptions::deep(), None), once);
    }
}

#[test]
fn no_op_property_write_is_silent_but_stored() {
    let object = ObservableObject::new(
        ObjectRef::from_entries([("a", 1)]),
        &ObserveOptions::default(),
        None,
    );
    let log: Log = Rc::default();
    record(&object, "obj", EventKey::Change, &log);

    object.set("a", 1).unwrap();
    assert!(log.borrow().is_empty());

    object.set("a", 2).unwrap();
    assert_eq!(*log.borrow(), vec!["obj:change"]);
    assert_eq!(object.target().get(&"a".into()), Value::from(2));

    // Same value, different descriptor: not a no-op.
    object
        .define_property("a", PropertyDescriptor::data(2).enumerable(false))
        .unwrap();
    assert_eq!(log.borrow().len(), 2);
}

#[test]
fn nested_change_reaches_parent_after_child() {
    let raw = ObjectRef::from_entries([("child", ObjectRef::new())]);
    let parent = ObservableObject::new(raw, &ObserveOptions::deep(), None);
    let child = ObservableObject::from_value(&parent.get("child")).unwrap();

    let log: Log = Rc::default();
    record_all(&child, "child", &[EventKey::property("x"), EventKey::Change], &log);
    record(&parent, "parent", EventKey::Change, &log);

    child.set("x", 1).unwrap();
    assert_eq!(
        *log.borrow(),
        vec!["child:x", "child:change", "parent:change"]
    );
}

#[test]
fn deep_grandchild_reports_to_root() {
    let raw = ObjectRef::from_entries([(
        "a",
        ObjectRef::from_entries([("b", ObjectRef::new())]),
    )]);
    let root = ObservableObject::new(raw, &ObserveOptions::deep(), None);
    let a = ObservableObject::from_value(&root.get("a")).unwrap();
    let b = ObservableObject::from_value(&a.get("b")).unwrap();

    assert_eq!(a.parent(), Some(root.as_observed()));
    assert_eq!(b.parent(), Some(root.as_observed()));

    let log: Log = Rc::default();
    record(&root, "root", EventKey::Change, &log);
    b.set("leaf", true).unwrap();
    assert_eq!(*log.borrow(), vec!["root:change"]);
}

#[test]
fn set_add_delete_emission() {
    let set = ObservableSet::new();
    let log: Log = Rc::default();
    record_all(
        &set,
        "set",
        &[EventKey::Add, EventKey::Delete, EventKey::Change],
        &log,
    );

    set.add("x");
    assert_eq!(*log.borrow(), vec!["set:add", "set:change"]);
    set.add("x");
    assert_eq!(log.borrow().len(), 2);

    assert!(!set.delete(&Value::from("y")));
    assert_eq!(log.borrow().len(), 2);

    assert!(set.delete(&Value::from("x")));
    assert_eq!(
        log.borrow()[2..].to_vec(),
        vec!["set:delete".to_string(), "set:change".to_string()]
    );
}

#[test]
fn map_repeated_set_emits_once() {
    let map = ObservableMap::new();
    let log: Log = Rc::default();
    record(&map, "map", EventKey::Set, &log);

    map.set("k", "v");
    map.set("k", "v");
    assert_eq!(log.borrow().len(), 1);

    let recursive = RecursiveObservableMap::default();
    let shared = ObjectRef::new();
    record(&recursive, "rmap", EventKey::Set, &log);
    recursive.set("k", shared.clone());
    recursive.set("k", shared);
    assert_eq!(log.borrow().len(), 2);
}

#[test]
fn recursive_collections_accept_raw_or_wrapped_keys() {
    let raw_key = ObjectRef::new();
    let map = RecursiveObservableMap::default();
    map.set(raw_key.clone(), 1);
    let wrapped_key = map.keys()[0].clone();
    assert!(wrapped_key.is_observed());

    let raw = Value::from(raw_key);
    assert!(map.has(&raw) && map.has(&wrapped_key));
    assert_eq!(map.get(&raw), Some(Value::from(1)));
    assert_eq!(map.get(&wrapped_key), Some(Value::from(1)));
    assert!(map.delete(&wrapped_key));
    assert!(!map.has(&raw));

    let member = Value::from(SetRef::new());
    let set = RecursiveObservableSet::default();
    set.add(member.clone());
    let wrapped_member = set.values()[0].clone();
    assert!(set.has(&member) && set.has(&wrapped_member));
    assert!(set.delete(&member));
    assert!(!set.has(&wrapped_member));

    let weak = RecursiveObservableWeakMap::default();
    let weak_key = Value::from(ObjectRef::new());
    weak.set(obs(weak_key.clone()), "v").unwrap();
    assert_eq!(weak.get(&weak_key), Some(Value::from("v")));
    assert!(weak.delete(&weak_key));
}

#[test]
fn recursive_members_report_to_collection() {
    let set = RecursiveObservableSet::default();
    set.add(ObjectRef::new());
    let member = ObservableObject::from_value(&set.values()[0]).unwrap();

    let log: Log = Rc::default();
    record(&set, "set", EventKey::Change, &log);
    member.set("flag", 1).unwrap();
    assert_eq!(*log.borrow(), vec!["set:change"]);
}

#[test]
fn class_hierarchy_and_convention_binding() {
    let ctx = ReactiveContext::new();
    let calls = Rc::new(RefCell::new(Vec::new()));

    let method = |tag: &'static str| {
        let calls = calls.clone();
        FunctionRef::new(move |this, args| {
            calls.borrow_mut().push((tag, this.clone(), args[0].clone()));
            Value::Undefined
        })
    };

    let one = ClassBuilder::new("One")
        .field("one", 0)
        .observe("one")
        .method("onOne", method("onOne"))
        .build(ctx.classes())
        .unwrap();
    let two = ClassBuilder::new("Two")
        .extends(&one)
        .field("two", 0)
        .observe("two")
        .method("onTwo", method("onTwo"))
        .build(ctx.classes())
        .unwrap();
    let three = ClassBuilder::new("Three")
        .extends(&two)
        .field("three", 0)
        .field("one", 10)
        .observe("three")
        .observe("one")
        .method("onThree", method("onThree"))
        .build(ctx.classes())
        .unwrap();

    let instance = ctx.instantiate(&three, None).unwrap();
    calls.borrow_mut().clear();

    instance.set("one", 1).unwrap();
    instance.set("two", 2).unwrap();
    instance.set("three", 3).unwrap();

    let raw = Value::from(instance.target());
    let seen = calls.borrow();
    let tags: Vec<_> = seen.iter().map(|(tag, _, _)| *tag).collect();
    assert_eq!(tags, vec!["onOne", "onTwo", "onThree"]);
    assert!(seen.iter().all(|(_, this, _)| *this == raw));
    assert_eq!(seen[0].2, Value::from(1));
    assert_eq!(instance.get("one"), Value::from(1));
}

#[test]
fn batch_coalescing_through_context() {
    let ctx = ReactiveContext::new();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let seen_clone = seen.clone();
    let cb: vigil_reactive::Callback =
        Rc::new(move |args: &[Value]| seen_clone.borrow_mut().push(args.to_vec()));

    ctx.once(&cb, vec![Value::from(1)]);
    ctx.once(&cb, vec![Value::from(2)]);
    ctx.run_microtasks();
    assert_eq!(*seen.borrow(), vec![vec![Value::from(2)]]);
}

#[test]
fn dropped_wrapper_releases_listeners() {
    let raw = SetRef::new();
    let hits = Rc::new(RefCell::new(0));
    {
        let wrapper = ObservableSet::wrap(raw.clone(), None);
        let hits = hits.clone();
        wrapper.on(EventKey::Change, listener(move |_| *hits.borrow_mut() += 1));
    }
    // A fresh wrapper has no listeners from the dropped one.
    let wrapper = ObservableSet::from_value(&obs(raw)).unwrap();
    wrapper.add(1);
    assert_eq!(*hits.borrow(), 0);
    assert_eq!(Rc::strong_count(&hits), 1);
}
