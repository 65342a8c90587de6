//! Deferred, coalescing callback batches.
//!
//! [`OnceQueue::once`] records the latest arguments for a callback and
//! schedules one flush on a [`Microtasks`] queue. Scheduling the same
//! callback again before the flush overwrites its arguments, so each
//! callback runs at most once per batch.

use indexmap::IndexMap;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::debug;
use vigil_core::{Identity, Value};

/// A deferred task.
pub type Task = Box<dyn FnOnce()>;

/// A batched callback. Identity is the `Rc` allocation.
pub type Callback = Rc<dyn Fn(&[Value])>;

/// A FIFO of deferred tasks, drained by its owner.
#[derive(Clone, Default)]
pub struct Microtasks(Rc<RefCell<VecDeque<Task>>>);

impl Microtasks {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a task.
    pub fn enqueue<F>(&self, task: F)
    where
        F: FnOnce() + 'static,
    {
        self.0.borrow_mut().push_back(Box::new(task));
    }

    /// Runs tasks until the queue is empty, including tasks queued while
    /// running. Returns the number of tasks run.
    pub fn run(&self) -> usize {
        let mut count = 0;
        loop {
            let next = self.0.borrow_mut().pop_front();
            match next {
                Some(task) => {
                    task();
                    count += 1;
                }
                None => return count,
            }
        }
    }

    /// Returns the number of queued tasks.
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    /// Returns true if no task is queued.
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Drops every queued task without running it.
    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

impl fmt::Debug for Microtasks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Microtasks").field("len", &self.len()).finish()
    }
}

/// When pending batches are flushed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FlushMode {
    /// A flush is scheduled on the microtask queue.
    #[default]
    Auto,
    /// Nothing runs until [`OnceQueue::flush`] is called.
    Manual,
}

struct OnceState {
    pending: RefCell<IndexMap<Identity, (Callback, Vec<Value>)>>,
    scheduled: Cell<bool>,
    mode: Cell<FlushMode>,
    microtasks: Microtasks,
}

/// Coalescing queue of one-shot callbacks.
///
/// # Example
///
/// ```rust
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use vigil_core::Value;
/// use vigil_reactive::{Callback, Microtasks, OnceQueue};
///
/// let microtasks = Microtasks::new();
/// let queue = OnceQueue::new(microtasks.clone());
/// let seen = Rc::new(RefCell::new(Vec::new()));
/// let seen_clone = seen.clone();
/// let cb: Callback = Rc::new(move |args: &[Value]| seen_clone.borrow_mut().push(args.to_vec()));
///
/// queue.once(&cb, vec![Value::from(1)]);
/// queue.once(&cb, vec![Value::from(2)]);
/// microtasks.run();
/// assert_eq!(*seen.borrow(), vec![vec![Value::from(2)]]);
/// ```
#[derive(Clone)]
pub struct OnceQueue(Rc<OnceState>);

impl OnceQueue {
    /// Creates a queue that schedules flushes on `microtasks`.
    pub fn new(microtasks: Microtasks) -> Self {
        Self::with_flush_mode(microtasks, FlushMode::Auto)
    }

    /// Creates a queue with the given flush mode.
    pub fn with_flush_mode(microtasks: Microtasks, mode: FlushMode) -> Self {
        Self(Rc::new(OnceState {
            pending: RefCell::new(IndexMap::new()),
            scheduled: Cell::new(false),
            mode: Cell::new(mode),
            microtasks,
        }))
    }

    /// Schedules `callback` to run once with `args`.
    ///
    /// A pending entry for the same callback keeps its position and takes
    /// the new arguments.
    pub fn once(&self, callback: &Callback, args: Vec<Value>) {
        let id = Identity::of(callback);
        self.0
            .pending
            .borrow_mut()
            .insert(id, (callback.clone(), args));
        if self.0.mode.get() == FlushMode::Auto && !self.0.scheduled.get() {
            self.schedule();
        }
    }

    fn schedule(&self) {
        self.0.scheduled.set(true);
        let weak: Weak<OnceState> = Rc::downgrade(&self.0);
        self.0.microtasks.enqueue(move || {
            let Some(state) = weak.upgrade() else {
                return;
            };
            let queue = OnceQueue(state);
            // Switching to manual mode after scheduling cancels the flush.
            if queue.flush_mode() == FlushMode::Auto {
                queue.flush();
            } else {
                queue.0.scheduled.set(false);
            }
        });
    }

    /// Invokes every pending callback once, in scheduling order.
    ///
    /// Returns the number of callbacks invoked. Callbacks scheduled while
    /// flushing land in the next batch.
    pub fn flush(&self) -> usize {
        let batch = std::mem::take(&mut *self.0.pending.borrow_mut());
        self.0.scheduled.set(false);
        debug!(callbacks = batch.len(), "flushing once queue");
        let count = batch.len();
        for (_, (callback, args)) in batch {
            callback(&args);
        }
        count
    }

    /// Returns the number of pending callbacks.
    pub fn pending_len(&self) -> usize {
        self.0.pending.borrow().len()
    }

    /// Returns true if a flush is waiting on the microtask queue.
    pub fn is_scheduled(&self) -> bool {
        self.0.scheduled.get()
    }

    /// Returns the flush mode.
    pub fn flush_mode(&self) -> FlushMode {
        self.0.mode.get()
    }

    /// Sets the flush mode. Returning to auto mode with work pending
    /// schedules a flush.
    pub fn set_flush_mode(&self, mode: FlushMode) {
        self.0.mode.set(mode);
        if mode == FlushMode::Auto && !self.0.scheduled.get() && self.pending_len() > 0 {
            self.schedule();
        }
    }

    /// Drops every pending callback without invoking it.
    pub fn clear(&self) {
        self.0.pending.borrow_mut().clear();
    }

    /// Clears pending callbacks and forgets any scheduled flush.
    ///
    /// Call after the microtask queue holding the flush was discarded.
    pub(crate) fn reset(&self) {
        self.clear();
        self.0.scheduled.set(false);
    }
}

impl fmt::Debug for OnceQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnceQueue")
            .field("pending", &self.pending_len())
            .field("scheduled", &self.is_scheduled())
            .field("mode", &self.flush_mode())
            .finish()
    }
}
