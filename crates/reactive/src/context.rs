//! The shared state of a reactive session.

use crate::batch::{Callback, FlushMode, Microtasks, OnceQueue};
use crate::class::{Class, ClassRegistry};
use crate::object::ObservableObject;
use tracing::debug;
use vigil_core::{ObservedRef, Result, Value};

/// Owns the class registry, the microtask queue and the once queue.
///
/// Create one per session and pass it to the code that declares classes or
/// schedules batches. The owner drives deferred work with
/// [`run_microtasks`](Self::run_microtasks).
///
/// # Example
///
/// ```rust
/// use std::rc::Rc;
/// use vigil_core::Value;
/// use vigil_reactive::{Callback, ReactiveContext};
///
/// let ctx = ReactiveContext::new();
/// let cb: Callback = Rc::new(|_: &[Value]| {});
/// ctx.once(&cb, vec![]);
/// assert_eq!(ctx.run_microtasks(), 1);
/// ```
#[derive(Debug)]
pub struct ReactiveContext {
    classes: ClassRegistry,
    microtasks: Microtasks,
    once: OnceQueue,
}

impl ReactiveContext {
    /// Creates a context whose once queue flushes automatically.
    pub fn new() -> Self {
        Self::with_flush_mode(FlushMode::Auto)
    }

    /// Creates a context with the given flush mode.
    pub fn with_flush_mode(mode: FlushMode) -> Self {
        let microtasks = Microtasks::new();
        let once = OnceQueue::with_flush_mode(microtasks.clone(), mode);
        Self {
            classes: ClassRegistry::new(),
            microtasks,
            once,
        }
    }

    pub fn classes(&self) -> &ClassRegistry {
        &self.classes
    }

    pub fn microtasks(&self) -> &Microtasks {
        &self.microtasks
    }

    pub fn once_queue(&self) -> &OnceQueue {
        &self.once
    }

    /// Shorthand for [`ClassRegistry::instantiate`].
    pub fn instantiate(&self, class: &Class, parent: Option<&ObservedRef>) -> Result<ObservableObject> {
        self.classes.instantiate(class, parent)
    }

    /// Shorthand for [`OnceQueue::once`].
    pub fn once(&self, callback: &Callback, args: Vec<Value>) {
        self.once.once(callback, args);
    }

    /// Flushes the once queue now. Returns the number of callbacks invoked.
    pub fn flush(&self) -> usize {
        self.once.flush()
    }

    /// Drains the microtask queue. Returns the number of tasks run.
    pub fn run_microtasks(&self) -> usize {
        self.microtasks.run()
    }

    /// Discards pending callbacks and queued microtasks.
    ///
    /// Class declarations are kept.
    pub fn teardown(&self) {
        debug!(
            pending = self.once.pending_len(),
            tasks = self.microtasks.len(),
            "tearing down reactive context"
        );
        self.microtasks.clear();
        self.once.reset();
    }
}

impl Default for ReactiveContext {
    fn default() -> Self {
        Self::new()
    }
}
