//! Scope errors

use crate::stack::{ScopeId, StackId};
use hieraconf_model::ModelError;

/// Errors raised by scope stacks and the global slot
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScopeError {
    /// A scope was released while scopes pushed after it were still live
    ///
    /// The released entry is removed anyway; the inner entries stay.
    #[error("scope {released} released out of order (innermost live scope is {innermost})")]
    StackDiscipline { released: ScopeId, innermost: ScopeId },

    /// The scope is not live on this stack
    #[error("scope {id} is not active on this stack")]
    UnknownScope { id: ScopeId },

    /// A guard was released on a different execution context than it was entered on
    #[error("scope {scope} belongs to stack {expected}, current stack is {actual}")]
    WrongContext {
        scope: ScopeId,
        expected: StackId,
        actual: StackId,
    },

    /// A scope was entered inside a tokio runtime by a task without its own stack
    #[error("task has no scope stack of its own; spawn it with scoped, inherit_scopes or within_scope")]
    UnscopedTask,

    /// A different base config type is already registered
    #[error("base config type is already {registered}, cannot register {requested}")]
    BaseTypeConflict { registered: String, requested: String },

    /// Record construction failed while merging scopes
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Result alias for scope operations
pub type ScopeResult<T> = Result<T, ScopeError>;
