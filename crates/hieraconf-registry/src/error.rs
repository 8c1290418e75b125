//! Registry errors
//!
//! Every variant is raised at registration time and aborts the call before
//! anything becomes visible to readers.

/// Errors raised by [`crate::TypeRegistry`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// A referenced type name is neither registered nor in the batch
    #[error("unknown config type '{name}' referenced by {referenced_by}")]
    UnknownType { name: String, referenced_by: String },

    /// A name is already registered with a different schema
    #[error("config type '{name}' is already registered with a different schema")]
    DuplicateType { name: String },

    /// The hierarchy has no consistent ancestor order
    #[error("invalid linearization for {type_name}: {reason}")]
    InvalidLinearization { type_name: String, reason: String },

    /// A record type nests itself, directly or transitively
    #[error("recursive nesting: {}", path.join(" -> "))]
    RecursiveNesting { path: Vec<String> },

    /// A concrete type is already paired with a different lazy type
    #[error("{concrete} is already paired with {existing}, cannot pair with {requested}")]
    AmbiguousRegistration {
        concrete: String,
        existing: String,
        requested: String,
    },

    /// An id from another registry was passed in
    #[error("{id} does not belong to this registry")]
    ForeignType { id: String },
}

impl RegistryError {
    /// Create unknown type error
    pub fn unknown_type(name: impl Into<String>, referenced_by: impl Into<String>) -> Self {
        Self::UnknownType {
            name: name.into(),
            referenced_by: referenced_by.into(),
        }
    }

    /// Create invalid linearization error
    pub fn invalid_linearization(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidLinearization {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }

    /// Create foreign type error
    pub fn foreign(id: impl std::fmt::Display) -> Self {
        Self::ForeignType { id: id.to_string() }
    }
}

/// Result alias for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;
