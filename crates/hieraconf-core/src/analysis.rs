//! Analysis cache
//!
//! A [`ResolutionPlan`] is everything about a type that field resolution
//! needs and that never changes once the type is registered: for every
//! field, the ancestors that can hold it (in linearization order), its
//! last-resort value and where that value was declared. Plans hold no
//! resolved values, so a cached plan gives the same answers as computing
//! one per lookup.

use crate::error::CoreResult;
use dashmap::DashMap;
use hieraconf_model::{ConfigTypeId, EffectiveField, Linearization, ModelError, TypeDescriptor, Value};
use hieraconf_registry::TypeRegistry;
use indexmap::IndexMap;
use smallvec::SmallVec;
use std::sync::Arc;

/// Precomputed lookup data for one field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldPlan {
    ancestors: SmallVec<[ConfigTypeId; 8]>,
    fallback: Option<Value>,
    declared_by: ConfigTypeId,
    nested: Option<ConfigTypeId>,
}

impl FieldPlan {
    pub(crate) fn build(linearization: &Linearization, field: &EffectiveField) -> Self {
        Self {
            ancestors: linearization.ancestors_exposing(field.name()).collect(),
            fallback: field.fallback_value(),
            declared_by: field.declared_by(),
            nested: field.nested().map(|d| d.id()),
        }
    }

    /// Ancestors exposing the field, most specific first
    #[inline]
    #[must_use]
    pub fn ancestors(&self) -> &[ConfigTypeId] {
        &self.ancestors
    }

    /// Value used when no layer is concrete
    #[inline]
    #[must_use]
    pub fn fallback(&self) -> Option<&Value> {
        self.fallback.as_ref()
    }

    /// Type whose declaration is in effect
    #[inline]
    #[must_use]
    pub fn declared_by(&self) -> ConfigTypeId {
        self.declared_by
    }

    /// Nested record type, if the field holds one
    #[inline]
    #[must_use]
    pub fn nested(&self) -> Option<ConfigTypeId> {
        self.nested
    }
}

/// Precomputed lookup data for every field of a type
#[derive(Debug, Clone)]
pub struct ResolutionPlan {
    config_type: ConfigTypeId,
    type_name: String,
    linearization: Arc<Linearization>,
    fields: IndexMap<String, FieldPlan>,
}

impl ResolutionPlan {
    /// Build a plan from a descriptor and its cached linearization
    #[must_use]
    pub fn build(descriptor: &TypeDescriptor, linearization: Arc<Linearization>) -> Self {
        let fields = descriptor
            .fields()
            .map(|f| (f.name().to_string(), FieldPlan::build(&linearization, f)))
            .collect();
        Self {
            config_type: descriptor.id(),
            type_name: descriptor.name().to_string(),
            linearization,
            fields,
        }
    }

    /// Planned type
    #[inline]
    #[must_use]
    pub fn config_type(&self) -> ConfigTypeId {
        self.config_type
    }

    /// Ancestor order the plan was built from
    #[inline]
    #[must_use]
    pub fn linearization(&self) -> &Arc<Linearization> {
        &self.linearization
    }

    /// Plan for one field
    ///
    /// # Errors
    /// [`ModelError::UnknownField`] if the type has no such field.
    pub fn field(&self, name: &str) -> Result<&FieldPlan, ModelError> {
        self.fields
            .get(name)
            .ok_or_else(|| ModelError::unknown_field(&self.type_name, name))
    }

    /// Number of planned fields
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }
}

/// Concurrent, append-only map of resolution plans
#[derive(Debug, Default)]
pub struct AnalysisCache {
    plans: DashMap<ConfigTypeId, Arc<ResolutionPlan>>,
}

impl AnalysisCache {
    /// Empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Plan for `config_type`, computed on first request
    ///
    /// # Errors
    /// Propagates registry lookup failures.
    pub fn plan(&self, registry: &TypeRegistry, config_type: ConfigTypeId) -> CoreResult<Arc<ResolutionPlan>> {
        if let Some(plan) = self.plans.get(&config_type) {
            return Ok(Arc::clone(plan.value()));
        }
        let descriptor = registry.descriptor(config_type)?;
        let linearization = registry.linearize(config_type)?;
        let plan = Arc::new(ResolutionPlan::build(&descriptor, linearization));
        // Concurrent builders produce equal plans; the first one stored wins
        let stored = self.plans.entry(config_type).or_insert(plan);
        tracing::trace!("Resolution plan ready for {}", descriptor.name());
        Ok(Arc::clone(stored.value()))
    }

    /// Cached plan, without computing one
    #[must_use]
    pub fn get(&self, config_type: ConfigTypeId) -> Option<Arc<ResolutionPlan>> {
        self.plans.get(&config_type).map(|p| Arc::clone(p.value()))
    }

    /// Whether a plan is cached
    #[must_use]
    pub fn contains(&self, config_type: ConfigTypeId) -> bool {
        self.plans.contains_key(&config_type)
    }

    /// Number of cached plans
    #[must_use]
    pub fn len(&self) -> usize {
        self.plans.len()
    }

    /// Whether no plan is cached
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }
}
