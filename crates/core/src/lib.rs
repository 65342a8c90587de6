//! Vigil Core - Value model and stores for the Vigil reactivity core.
//!
//! This crate provides the foundational types the observable wrappers are
//! built on:
//!
//! - `Value`: Dynamic values, with reference variants compared by identity
//! - `ObjectRef`: Objects with property descriptors and a prototype chain
//! - `MapRef` / `SetRef`: Insertion-ordered collections
//! - `WeakMapRef` / `WeakSetRef` / `WeakTable`: Identity-keyed associations
//!   that do not keep their keys alive
//! - `Observed`: The trait every observable wrapper implements
//! - `Event`: Change notifications
//! - `Error`: Errors raised when a store refuses a write
//!
//! # Example
//!
//! ```rust
//! use vigil_core::{MapRef, ObjectRef, PropertyDescriptor, Value};
//!
//! let obj = ObjectRef::from_entries([("name", "Alice")]);
//! obj.define_own_property("id".into(), &PropertyDescriptor::data(1).writable(false))
//!     .unwrap();
//! assert!(obj.set("id", 2).is_err());
//! assert_eq!(obj.get(&"name".into()), Value::from("Alice"));
//!
//! let map = MapRef::new();
//! map.set(Value::from(obj.clone()), Value::from(true));
//! assert!(map.has(&Value::from(obj)));
//! ```

mod collection;
mod descriptor;
mod error;
mod event;
mod key;
mod object;
mod observed;
mod value;
mod weak;

pub use collection::{MapRef, MapStore, SetRef, SetStore};
pub use descriptor::{Property, PropertyDescriptor};
pub use error::{Error, Result};
pub use event::{listener, Detail, Event, EventKey, Listener, Op};
pub use key::{PropertyKey, Symbol};
pub use object::{ObjectRef, ObjectStore};
pub use observed::{Marker, Observed, ObservedKind, ObservedRef, WeakObserved};
pub use value::{FunctionRef, Value};
pub use weak::{Identity, WeakMapRef, WeakMapStore, WeakSetRef, WeakSetStore, WeakTable, WeakValue};
