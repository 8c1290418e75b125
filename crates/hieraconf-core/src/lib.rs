//! hieraconf Core
//!
//! Lazy configuration values resolved along two axes: the ancestry of the
//! config type (Y-axis) and the stack of scopes live in the current thread
//! or task (X-axis).
//!
//! # Overview
//!
//! - **ConfigEnv**: registry, global slot, lazy factory and resolver in one
//!   shareable handle
//! - **LazyFactory**: one optionalized companion type per concrete type
//! - **LazyConfig**: explicit values plus live lookup for everything else
//! - **DualAxisResolver**: explicit, then scopes by ancestor, then defaults
//! - **AnalysisCache**: optional precomputed per-type resolution plans
//!
//! # Example
//!
//! ```rust
//! use hieraconf_core::prelude::*;
//! use hieraconf_model::Value;
//! use hieraconf_test_utils::{sparse, step_hierarchy};
//!
//! let h = step_hierarchy();
//! let env = ConfigEnv::new(h.registry.clone());
//! let step = env.lazy(h.step.id()).unwrap();
//!
//! let _global = env
//!     .enter_scope(sparse(&h.global, &[("timeout", Value::Int(45))]))
//!     .unwrap();
//! assert_eq!(step.value("timeout").unwrap(), Some(Value::Int(45)));
//!
//! let pinned = step.with_override("timeout", 10).unwrap();
//! assert_eq!(pinned.value("timeout").unwrap(), Some(Value::Int(10)));
//! ```

#![warn(missing_docs)]

pub mod analysis;
pub mod config;
pub mod env;
pub mod error;
pub mod factory;
pub mod lazy;
pub mod resolver;
pub mod task;

// Re-exports
pub use analysis::{AnalysisCache, FieldPlan, ResolutionPlan};
pub use config::ResolverConfig;
pub use env::ConfigEnv;
pub use error::{CoreError, CoreResult};
pub use factory::{lazy_name_for, LazyFactory, LazyField, LazyType};
pub use lazy::{Explicit, LazyBuilder, LazyConfig, Preserve};
pub use resolver::{DualAxisResolver, Resolution, ValueSource};
pub use task::{spawn_inheriting, spawn_isolated};

/// Prelude module for common imports
pub mod prelude {
    //! Environment, lazy configs and resolution results
    pub use crate::{
        ConfigEnv, CoreError, CoreResult, LazyConfig, Preserve, Resolution, ResolverConfig,
        ValueSource,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
