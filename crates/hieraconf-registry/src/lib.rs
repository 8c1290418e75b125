//! hieraconf Type Registry
//!
//! Arena of registered config types with C3 ancestor orders and the
//! lazy ↔ concrete type map.
//!
//! # Overview
//!
//! - **TypeRegistry**: append-only, validated registration of record schemas
//! - **Linearization cache**: per-type ancestor order and field sets,
//!   computed at registration and cached on first lookup
//! - **Lazy map**: 1:1 pairing of lazy wrapper types with concrete types
//!
//! # Example
//!
//! ```rust
//! use hieraconf_model::{FieldType, RecordSchema};
//! use hieraconf_registry::TypeRegistry;
//!
//! let registry = TypeRegistry::new();
//! let ids = registry
//!     .register_batch(vec![
//!         RecordSchema::builder("GlobalConfig")
//!             .field("timeout", FieldType::Int, 30)
//!             .build()
//!             .unwrap(),
//!         RecordSchema::builder("StepConfig")
//!             .extends("GlobalConfig")
//!             .build()
//!             .unwrap(),
//!     ])
//!     .unwrap();
//!
//! let order = registry.linearize(ids[1]).unwrap();
//! assert_eq!(order.names(), ["StepConfig".to_string(), "GlobalConfig".to_string()]);
//! ```

#![warn(missing_docs)]

pub mod error;
mod lazy_map;
pub mod linearize;
pub mod registry;

// Re-exports
pub use error::{RegistryError, RegistryResult};
pub use linearize::{c3_linearize, c3_merge};
pub use registry::TypeRegistry;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
