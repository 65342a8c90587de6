//! Parent routes.

use std::cell::RefCell;
use vigil_core::{ObservedRef, WeakObserved};

/// Weak link from a child wrapper to the wrapper that receives its
/// propagated `change` events.
///
/// The link never keeps the parent alive. A dead parent reads as no parent.
#[derive(Default, Debug)]
pub struct ParentLink(RefCell<Option<WeakObserved>>);

impl ParentLink {
    /// Creates a link to `parent`, or an empty link.
    pub fn new(parent: Option<&ObservedRef>) -> Self {
        Self(RefCell::new(parent.map(ObservedRef::downgrade)))
    }

    /// Returns the parent if it is alive.
    pub fn get(&self) -> Option<ObservedRef> {
        self.0.borrow().as_ref().and_then(WeakObserved::upgrade)
    }

    /// Overwrites the route. Last writer wins.
    pub fn set(&self, parent: Option<&ObservedRef>) {
        *self.0.borrow_mut() = parent.map(ObservedRef::downgrade);
    }

    /// Returns true if a live parent is linked.
    pub fn is_linked(&self) -> bool {
        self.get().is_some()
    }
}
