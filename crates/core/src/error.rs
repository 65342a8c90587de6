//! Error types for store operations.

use crate::key::PropertyKey;

/// Result type alias for Vigil operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised when a store refuses a write.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// The property is read-only (non-writable data or setter-less accessor).
    #[error("cannot assign to read-only property `{key}`")]
    NotWritable { key: PropertyKey },
    /// The property is non-configurable and the change is not permitted.
    #[error("cannot redefine non-configurable property `{key}`")]
    NotConfigurable { key: PropertyKey },
    /// The object does not accept new properties.
    #[error("cannot add property `{key}`, object is not extensible")]
    NotExtensible { key: PropertyKey },
    /// A weak collection was given a key that has no identity.
    #[error("invalid value used as weak key: {type_name}")]
    InvalidWeakKey { type_name: &'static str },
}

impl Error {
    /// Creates a not-writable error.
    pub fn not_writable(key: impl Into<PropertyKey>) -> Self {
        Error::NotWritable { key: key.into() }
    }

    /// Creates a not-configurable error.
    pub fn not_configurable(key: impl Into<PropertyKey>) -> Self {
        Error::NotConfigurable { key: key.into() }
    }

    /// Creates a not-extensible error.
    pub fn not_extensible(key: impl Into<PropertyKey>) -> Self {
        Error::NotExtensible { key: key.into() }
    }

    /// Creates an invalid weak key error.
    pub fn invalid_weak_key(type_name: &'static str) -> Self {
        Error::InvalidWeakKey { type_name }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::not_writable("x").to_string(),
            "cannot assign to read-only property `x`"
        );
        assert_eq!(
            Error::invalid_weak_key("number").to_string(),
            "invalid value used as weak key: number"
        );
    }
}
