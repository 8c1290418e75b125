//! Testing utilities for the hieraconf workspace
//!
//! Shared config hierarchies, record helpers and tracing setup.

#![allow(missing_docs)]

use hieraconf_model::{FieldType, Record, RecordSchema, TypeDescriptor, Value};
use hieraconf_registry::TypeRegistry;
use once_cell::sync::Lazy;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

static TRACING: Lazy<()> = Lazy::new(|| {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
});

/// Install a test subscriber once per process; honors `RUST_LOG`
pub fn init_tracing() {
    Lazy::force(&TRACING);
}

/// Global → Pipeline → Step, each level inheriting as placeholder
#[derive(Debug, Clone)]
pub struct StepHierarchy {
    pub registry: TypeRegistry,
    pub global: Arc<TypeDescriptor>,
    pub pipeline: Arc<TypeDescriptor>,
    pub step: Arc<TypeDescriptor>,
}

pub fn step_schemas() -> Vec<RecordSchema> {
    vec![
        RecordSchema::builder("GlobalConfig")
            .field("timeout", FieldType::Int, 30)
            .field("retries", FieldType::Int, 3)
            .placeholder_field("label", FieldType::Str)
            .build()
            .unwrap(),
        RecordSchema::builder("PipelineConfig")
            .extends("GlobalConfig")
            .field("batch_size", FieldType::Int, 8)
            .inherit_as_none()
            .build()
            .unwrap(),
        RecordSchema::builder("StepConfig")
            .extends("PipelineConfig")
            .placeholder_field("step_name", FieldType::Str)
            .inherit_as_none()
            .build()
            .unwrap(),
    ]
}

pub fn step_hierarchy() -> StepHierarchy {
    step_hierarchy_in(TypeRegistry::new())
}

pub fn step_hierarchy_in(registry: TypeRegistry) -> StepHierarchy {
    registry.register_batch(step_schemas()).unwrap();
    StepHierarchy {
        global: registry.descriptor_by_name("GlobalConfig").unwrap(),
        pipeline: registry.descriptor_by_name("PipelineConfig").unwrap(),
        step: registry.descriptor_by_name("StepConfig").unwrap(),
        registry,
    }
}

/// Base ← Left, Right ← Diamond
#[derive(Debug, Clone)]
pub struct DiamondHierarchy {
    pub registry: TypeRegistry,
    pub base: Arc<TypeDescriptor>,
    pub left: Arc<TypeDescriptor>,
    pub right: Arc<TypeDescriptor>,
    pub diamond: Arc<TypeDescriptor>,
}

pub fn diamond_hierarchy() -> DiamondHierarchy {
    let registry = TypeRegistry::new();
    registry
        .register_batch(vec![
            RecordSchema::builder("BaseConfig")
                .field("level", FieldType::Int, 0)
                .placeholder_field("name", FieldType::Str)
                .build()
                .unwrap(),
            RecordSchema::builder("LeftConfig")
                .extends("BaseConfig")
                .field("left", FieldType::Bool, false)
                .build()
                .unwrap(),
            RecordSchema::builder("RightConfig")
                .extends("BaseConfig")
                .field("right", FieldType::Bool, false)
                .field("level", FieldType::Int, 5)
                .build()
                .unwrap(),
            RecordSchema::builder("DiamondConfig")
                .extends("LeftConfig")
                .extends("RightConfig")
                .build()
                .unwrap(),
        ])
        .unwrap();
    DiamondHierarchy {
        base: registry.descriptor_by_name("BaseConfig").unwrap(),
        left: registry.descriptor_by_name("LeftConfig").unwrap(),
        right: registry.descriptor_by_name("RightConfig").unwrap(),
        diamond: registry.descriptor_by_name("DiamondConfig").unwrap(),
        registry,
    }
}

/// Application root with injected nested configs, plus a step-level
/// config that inherits from one of them
#[derive(Debug, Clone)]
pub struct NestedHierarchy {
    pub registry: TypeRegistry,
    pub root: Arc<TypeDescriptor>,
    pub path_planning: Arc<TypeDescriptor>,
    pub zarr: Arc<TypeDescriptor>,
    pub materialization: Arc<TypeDescriptor>,
}

pub fn nested_schemas() -> Vec<RecordSchema> {
    vec![
        RecordSchema::builder("ZarrConfig")
            .field(
                "compression",
                FieldType::enumeration("Compression", &["none", "zstd", "lz4"]),
                Value::Enum("zstd".into()),
            )
            .field("level", FieldType::Int, 3)
            .build()
            .unwrap(),
        RecordSchema::builder("PathPlanningConfig")
            .field("output_dir_suffix", FieldType::Str, "_out")
            .placeholder_field("sub_dir", FieldType::Str)
            .build()
            .unwrap(),
        RecordSchema::builder("StepMaterializationConfig")
            .extends("PathPlanningConfig")
            .field("sub_dir", FieldType::Str, "checkpoints")
            .inherit_as_none()
            .build()
            .unwrap(),
        RecordSchema::builder("GlobalPipelineConfig")
            .field("num_workers", FieldType::Int, 2)
            .inject_nested_configs(&["PathPlanningConfig", "ZarrConfig"])
            .build()
            .unwrap(),
    ]
}

pub fn nested_hierarchy() -> NestedHierarchy {
    let registry = TypeRegistry::new();
    registry.register_batch(nested_schemas()).unwrap();
    NestedHierarchy {
        root: registry.descriptor_by_name("GlobalPipelineConfig").unwrap(),
        path_planning: registry.descriptor_by_name("PathPlanningConfig").unwrap(),
        zarr: registry.descriptor_by_name("ZarrConfig").unwrap(),
        materialization: registry
            .descriptor_by_name("StepMaterializationConfig")
            .unwrap(),
        registry,
    }
}

/// Record with the given concrete values and placeholders everywhere else
pub fn sparse(descriptor: &Arc<TypeDescriptor>, values: &[(&str, Value)]) -> Record {
    let mut builder = Record::builder(descriptor);
    for (name, value) in values {
        builder = builder.set(name, value.clone());
    }
    builder.placeholders_for_rest().build().unwrap()
}

/// Record with the given values on top of the declared defaults
pub fn with_defaults(descriptor: &Arc<TypeDescriptor>, values: &[(&str, Value)]) -> Record {
    let mut builder = Record::builder(descriptor);
    for (name, value) in values {
        builder = builder.set(name, value.clone());
    }
    builder.build().unwrap()
}
