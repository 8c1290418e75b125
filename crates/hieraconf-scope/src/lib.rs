//! hieraconf Scope Stacks
//!
//! The context axis of resolution: which config records are in force for
//! the code that is running right now.
//!
//! # Overview
//!
//! - **ScopeStack**: strict LIFO stack of records, a plain value
//! - **Ambient stacks**: one per OS thread outside a runtime, one per tokio
//!   task wrapped in [`scoped`], [`inherit_scopes`] or [`within_scope`];
//!   entered with [`enter_scope`] and released by dropping the returned
//!   [`ScopeGuard`]
//! - **GlobalSlot**: base config type plus global default instances,
//!   consulted beneath every stack
//! - **AvailableConfigs**: flattened snapshot, innermost value per field
//!   wins, with provenance
//!
//! # Example
//!
//! ```rust
//! use hieraconf_model::Value;
//! use hieraconf_scope::{enter_scope, flatten_active_scopes, GlobalSlot};
//! use hieraconf_test_utils::{sparse, step_hierarchy};
//!
//! let h = step_hierarchy();
//! let slot = GlobalSlot::new();
//! {
//!     let _guard = enter_scope(sparse(&h.global, &[("timeout", Value::Int(60))])).unwrap();
//!     let available = flatten_active_scopes(&slot);
//!     assert_eq!(available.field(h.global.id(), "timeout"), Some(&Value::Int(60)));
//! }
//! assert!(flatten_active_scopes(&slot).is_empty());
//! ```

#![warn(missing_docs)]

pub mod available;
pub mod context;
pub mod error;
pub mod global;
pub mod stack;

// Re-exports
pub use available::{AvailableConfigs, ConfigSource, MergedConfig};
pub use context::{
    current_depth, current_snapshot, enter_scope, enter_scope_masked, enter_scope_with,
    flatten_active_scopes, inherit_scopes, scoped, with_stack, within_scope, within_scope_with,
    ScopeGuard,
};
pub use error::{ScopeError, ScopeResult};
pub use global::GlobalSlot;
pub use stack::{MergeMode, ScopeEntry, ScopeId, ScopeStack, StackId};

/// Prelude module for common imports
pub mod prelude {
    //! Entering scopes and reading the flattened view
    pub use crate::{
        enter_scope, flatten_active_scopes, within_scope, AvailableConfigs, GlobalSlot, MergeMode,
        ScopeGuard,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
