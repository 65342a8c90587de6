//! Per-wrapper listener registry.
//!
//! A `Notifier` maps event keys to the listeners registered under them.
//! The table is allocated on the first `on` call and lives inside the
//! wrapper that owns it, so dropping the wrapper reclaims its listeners.

use indexmap::IndexMap;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::warn;
use vigil_core::{Event, EventKey, Listener};

/// Listener registry for one wrapper.
#[derive(Default)]
pub struct Notifier {
    listeners: RefCell<Option<IndexMap<EventKey, Vec<Listener>>>>,
}

impl Notifier {
    /// Creates an empty notifier. No table is allocated until the first `on`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` under `key`.
    ///
    /// Registering the same listener (same `Rc` allocation) twice under one
    /// key is a no-op. Registration order is delivery order.
    pub fn on(&self, key: EventKey, listener: Listener) {
        let mut table = self.listeners.borrow_mut();
        let listeners = table.get_or_insert_with(IndexMap::new).entry(key).or_default();
        if !listeners.iter().any(|l| Rc::ptr_eq(l, &listener)) {
            listeners.push(listener);
        }
    }

    /// Removes the listeners registered under `key`, or every listener when
    /// `key` is `None`.
    ///
    /// Removing listeners that were never registered logs a warning and
    /// otherwise does nothing.
    pub fn off(&self, key: Option<&EventKey>) {
        let mut table = self.listeners.borrow_mut();
        let Some(map) = table.as_mut() else {
            warn!("off() called on a notifier with no listeners");
            return;
        };
        match key {
            Some(key) => {
                if map.shift_remove(key).is_none() {
                    warn!(event = %key, "off() called on an event with no listeners");
                }
            }
            None => {
                table.take();
            }
        }
    }

    /// Delivers `event` to every listener registered under `event.key`.
    ///
    /// The listener list is copied before delivery, so listeners may
    /// register or remove listeners, or mutate the emitting wrapper.
    pub fn emit(&self, event: &Event) {
        let snapshot = match self.listeners.borrow().as_ref() {
            Some(map) => match map.get(&event.key) {
                Some(listeners) => listeners.clone(),
                None => return,
            },
            None => return,
        };
        for listener in snapshot {
            listener(event);
        }
    }

    /// Returns the number of listeners registered under `key`.
    pub fn listener_count(&self, key: &EventKey) -> usize {
        self.listeners
            .borrow()
            .as_ref()
            .and_then(|map| map.get(key))
            .map_or(0, Vec::len)
    }

    /// Returns true if any listener is registered.
    pub fn has_listeners(&self) -> bool {
        self.listeners
            .borrow()
            .as_ref()
            .is_some_and(|map| map.values().any(|l| !l.is_empty()))
    }
}
