//! Error types for the value model

/// Errors raised while building schemas or records
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    /// Field is not declared on the type
    #[error("unknown field '{field}' on {type_name}")]
    UnknownField { type_name: String, field: String },

    /// Value does not fit the declared field type
    #[error("type mismatch for {field}: expected {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: String,
        actual: String,
    },

    /// Schema declaration is malformed
    #[error("invalid schema for {type_name}: {reason}")]
    InvalidSchema { type_name: String, reason: String },
}

impl ModelError {
    /// Create unknown field error
    pub fn unknown_field(type_name: impl Into<String>, field: impl Into<String>) -> Self {
        Self::UnknownField {
            type_name: type_name.into(),
            field: field.into(),
        }
    }

    /// Create invalid schema error
    pub fn invalid_schema(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSchema {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }
}

/// Result alias for model operations
pub type ModelResult<T> = Result<T, ModelError>;
