//! Wrapping configuration.

use vigil_core::PropertyKey;

/// Options controlling how a value is wrapped.
///
/// # Example
///
/// ```rust
/// use vigil_reactive::ObserveOptions;
///
/// let options = ObserveOptions::new()
///     .recursive(true)
///     .black_list(["secret"]);
/// assert!(options.recursive);
/// ```
#[derive(Clone, Debug, Default)]
pub struct ObserveOptions {
    /// Wrap nested structured values on access.
    pub recursive: bool,
    /// Also wrap values under keys found on the prototype chain.
    pub observe_prototypes: bool,
    /// Keys whose values are never wrapped.
    pub black_list: Vec<PropertyKey>,
    /// Keys re-allowed after the deny set is computed.
    pub white_list: Vec<PropertyKey>,
    /// Route initial collection contents through the mutating methods, so
    /// each entry emits.
    pub emit_on_construction: bool,
}

impl ObserveOptions {
    /// Creates default options: non-recursive, silent construction.
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for recursive options.
    pub fn deep() -> Self {
        Self::new().recursive(true)
    }

    /// Sets recursive wrapping.
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Sets prototype-chain observation.
    pub fn observe_prototypes(mut self, observe: bool) -> Self {
        self.observe_prototypes = observe;
        self
    }

    /// Adds keys to the deny list.
    pub fn black_list<K, I>(mut self, keys: I) -> Self
    where
        K: Into<PropertyKey>,
        I: IntoIterator<Item = K>,
    {
        self.black_list.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Adds keys to the allow list.
    pub fn white_list<K, I>(mut self, keys: I) -> Self
    where
        K: Into<PropertyKey>,
        I: IntoIterator<Item = K>,
    {
        self.white_list.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Sets construction-time emission.
    pub fn emit_on_construction(mut self, emit: bool) -> Self {
        self.emit_on_construction = emit;
        self
    }

    /// Options used for children wrapped by a recursive collection: the same
    /// lists, recursive, and silent.
    pub(crate) fn nested(&self) -> Self {
        Self {
            recursive: true,
            emit_on_construction: false,
            ..self.clone()
        }
    }
}
