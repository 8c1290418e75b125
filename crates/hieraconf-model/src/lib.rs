//! hieraconf value model
//!
//! Declarations and instances shared by every hieraconf crate.
//!
//! # Core Concepts
//!
//! - **Value**: a concrete field value. The placeholder is `None` in a
//!   record slot, never a value variant
//! - **RecordSchema**: name, ordered bases and own field declarations
//! - **TypeDescriptor**: a registered type with its ancestor order and
//!   effective fields
//! - **Record**: an immutable instance of a registered type
//!
//! # Example
//!
//! ```rust
//! use hieraconf_model::{FieldType, RecordSchema};
//!
//! let schema = RecordSchema::builder("StepConfig")
//!     .extends("PipelineConfig")
//!     .field("timeout", FieldType::Int, 10)
//!     .placeholder_field("label", FieldType::Str)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(schema.bases(), ["PipelineConfig".to_string()]);
//! ```

#![warn(missing_docs)]

pub mod descriptor;
pub mod error;
pub mod ids;
pub mod record;
pub mod schema;
pub mod value;

// Re-exports
pub use descriptor::{EffectiveField, Linearization, TypeDescriptor};
pub use error::{ModelError, ModelResult};
pub use ids::{ConfigTypeId, LazyTypeId, RegistryId};
pub use record::{Record, RecordBuilder};
pub use schema::{snake_case, RecordSchema, SchemaBuilder};
pub use value::{FieldDecl, FieldDefault, FieldType, Value};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for declaring config types
    pub use crate::{
        ConfigTypeId, FieldDecl, FieldType, Record, RecordSchema, TypeDescriptor, Value,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
