//! Error types for hieraconf core
//!
//! Wraps the lower layers' errors and adds the lazy-wrapper faults:
//! - Registration and lookup failures from the registry
//! - Unknown fields and type mismatches from the value model
//! - Stack discipline and base type conflicts from the scope layer
//!
//! A field with no concrete value anywhere is never an error; it resolves
//! to [`crate::Resolution::Unset`].

use hieraconf_model::ModelError;
use hieraconf_registry::RegistryError;
use hieraconf_scope::ScopeError;

/// Main hieraconf error type
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoreError {
    /// Registry failure
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Value model failure
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// Scope failure
    #[error("scope error: {0}")]
    Scope(#[from] ScopeError),

    /// Nested access on a field that does not hold a record
    #[error("field '{field}' on {type_name} is not a nested config")]
    NotNested {
        /// Requesting type
        type_name: String,
        /// Field name
        field: String,
    },

    /// Lazy config of the wrong type supplied for a nested field
    #[error("{field} expects {expected}, got a lazy {actual}")]
    LazyTypeMismatch {
        /// Qualified field name
        field: String,
        /// Nested type the field declares
        expected: String,
        /// Concrete type of the supplied lazy config
        actual: String,
    },

    /// Lazy config built in a different environment
    #[error("lazy {type_name} belongs to a different registry")]
    ForeignType {
        /// Concrete type name
        type_name: String,
    },

    /// Materialized record could not be serialized
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl CoreError {
    /// Create not-nested error
    pub fn not_nested(type_name: impl Into<String>, field: impl Into<String>) -> Self {
        Self::NotNested {
            type_name: type_name.into(),
            field: field.into(),
        }
    }

    /// Whether this is a registration-time fault
    #[inline]
    #[must_use]
    pub fn is_registration_error(&self) -> bool {
        matches!(
            self,
            Self::Registry(
                RegistryError::AmbiguousRegistration { .. }
                    | RegistryError::InvalidLinearization { .. }
                    | RegistryError::RecursiveNesting { .. }
                    | RegistryError::DuplicateType { .. }
                    | RegistryError::UnknownType { .. }
            )
        )
    }
}

/// Result type for hieraconf core operations
pub type CoreResult<T> = Result<T, CoreError>;
