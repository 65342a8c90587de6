//! Vigil Reactive - Change notification for objects and collections.
//!
//! This crate wraps the `vigil-core` stores in observable wrappers that
//! intercept every mutation, keep the store in sync, and notify listeners.
//! Changes propagate from nested wrappers up to the ancestor they were
//! reached from.
//!
//! # Core Concepts
//!
//! - `Notifier`: Per-wrapper listener table keyed by event
//! - `ObservableObject`: Property interception with optional deep wrapping
//! - `ObservableMap` / `ObservableSet` and their recursive and weak variants
//! - `observe()` / `obs()`: Pick the right wrapper for any value
//! - `ClassBuilder` / `ClassRegistry`: Declared observable fields with bound
//!   handlers
//! - `OnceQueue`: Coalesced deferred callbacks
//! - `ReactiveContext`: Owns the registries for one session
//!
//! # Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use vigil_core::{listener, EventKey, ObjectRef, Value};
//! use vigil_reactive::{observe, Observable, ObservableObject, ObserveOptions};
//!
//! let raw = ObjectRef::from_entries([("inner", Value::from(ObjectRef::new()))]);
//! let root = ObservableObject::new(raw, &ObserveOptions::deep(), None);
//!
//! let changes = Rc::new(RefCell::new(0));
//! let changes_clone = changes.clone();
//! root.on(EventKey::Change, listener(move |_| *changes_clone.borrow_mut() += 1));
//!
//! // Reading a nested object returns a wrapper routed to `root`.
//! let inner = ObservableObject::from_value(&root.get("inner")).unwrap();
//! inner.set("x", 1).unwrap();
//! assert_eq!(*changes.borrow(), 1);
//!
//! // Wrapping is idempotent.
//! assert_eq!(observe(&root.to_value(), &ObserveOptions::default(), None), root.to_value());
//! ```

pub mod batch;
pub mod class;
pub mod context;
pub mod link;
pub mod map;
mod node;
pub mod notify;
pub mod object;
pub mod observe;
pub mod options;
pub mod set;

pub use batch::{Callback, FlushMode, Microtasks, OnceQueue, Task};
pub use class::{handler_name, Class, ClassBuilder, ClassId, ClassRegistry, Handler};
pub use context::ReactiveContext;
pub use link::ParentLink;
pub use map::{ObservableMap, ObservableWeakMap, RecursiveObservableMap, RecursiveObservableWeakMap};
pub use node::Observable;
pub use notify::Notifier;
pub use object::ObservableObject;
pub use observe::{existing_wrapper, obs, observe};
pub use options::ObserveOptions;
pub use set::{ObservableSet, ObservableWeakSet, RecursiveObservableSet};

// Re-export commonly used types from the core crate
pub use vigil_core::{listener, Event, EventKey, Listener, ObservedRef, Op, Value};
