//! Dual-axis field resolution
//!
//! Precedence for field `f` requested on type `T`:
//!
//! 1. An explicit value supplied when the lazy wrapper was built
//! 2. The live context, walking `T`'s ancestors from most to least specific
//!    (Y-axis). For each ancestor the flattened scope view already holds the
//!    innermost concrete value of that exact type (X-axis), so the first
//!    ancestor with a concrete `f` wins
//! 3. The declared default, or the default retained by an `inherit_as_none`
//!    redeclaration
//! 4. Otherwise the field is unset
//!
//! Resolution reads a snapshot and never mutates anything, so two lookups
//! against the same snapshot agree.

use crate::analysis::{AnalysisCache, FieldPlan};
use crate::config::ResolverConfig;
use crate::error::CoreResult;
use hieraconf_model::{ConfigTypeId, ModelError, Value};
use hieraconf_registry::TypeRegistry;
use hieraconf_scope::{AvailableConfigs, ConfigSource, ScopeId};
use serde::Serialize;
use std::sync::Arc;

/// Where a resolved value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ValueSource {
    /// Supplied explicitly on the lazy wrapper
    Explicit,
    /// A live scope entry
    Scope {
        /// Ancestor type the value was found on
        config_type: ConfigTypeId,
        /// Entry that supplied it
        scope: ScopeId,
    },
    /// The global default instance of an ancestor type
    GlobalDefault {
        /// Ancestor type the value was found on
        config_type: ConfigTypeId,
    },
    /// Static declaration default
    Default {
        /// Type whose declaration is in effect
        declared_by: ConfigTypeId,
    },
}

/// Outcome of resolving one field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Resolution {
    /// A concrete value was found
    Resolved {
        /// The value
        value: Value,
        /// Where it came from
        source: ValueSource,
    },
    /// No layer holds a concrete value and the default is a placeholder
    Unset,
}

impl Resolution {
    /// Resolved value, if any
    #[inline]
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Resolved { value, .. } => Some(value),
            Self::Unset => None,
        }
    }

    /// Consume into the resolved value
    #[inline]
    #[must_use]
    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Resolved { value, .. } => Some(value),
            Self::Unset => None,
        }
    }

    /// Source of the resolved value
    #[inline]
    #[must_use]
    pub fn source(&self) -> Option<ValueSource> {
        match self {
            Self::Resolved { source, .. } => Some(*source),
            Self::Unset => None,
        }
    }

    /// Whether nothing was found
    #[inline]
    #[must_use]
    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }
}

/// Resolves fields against a scope snapshot and the type registry
#[derive(Debug, Clone)]
pub struct DualAxisResolver {
    registry: TypeRegistry,
    analysis: Option<Arc<AnalysisCache>>,
    config: ResolverConfig,
}

impl DualAxisResolver {
    /// Resolver computing lookup data per call
    #[must_use]
    pub fn new(registry: TypeRegistry) -> Self {
        Self {
            registry,
            analysis: None,
            config: ResolverConfig::default(),
        }
    }

    /// Resolver with explicit configuration
    ///
    /// `analysis` is consulted only when the config enables it.
    #[must_use]
    pub fn with_config(registry: TypeRegistry, config: ResolverConfig, analysis: Arc<AnalysisCache>) -> Self {
        Self {
            registry,
            analysis: config.use_analysis_cache.then_some(analysis),
            config,
        }
    }

    /// Registry the resolver reads descriptors from
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> ResolverConfig {
        self.config
    }

    /// Resolve `field` on `requesting`
    ///
    /// # Errors
    /// - [`ModelError::UnknownField`] if `requesting` has no such field
    /// - Registry errors for ids from another registry
    pub fn resolve(
        &self,
        requesting: ConfigTypeId,
        field: &str,
        explicit: Option<&Value>,
        available: &AvailableConfigs,
    ) -> CoreResult<Resolution> {
        let resolution = if let Some(cache) = &self.analysis {
            let plan = cache.plan(&self.registry, requesting)?;
            Self::resolve_with_plan(plan.field(field)?, explicit, available, field)
        } else {
            let descriptor = self.registry.descriptor(requesting)?;
            let effective = descriptor
                .field(field)
                .ok_or_else(|| ModelError::unknown_field(descriptor.name(), field))?;
            let linearization = self.registry.linearize(requesting)?;
            let plan = FieldPlan::build(&linearization, effective);
            Self::resolve_with_plan(&plan, explicit, available, field)
        };
        if self.config.trace_resolution {
            tracing::trace!("Resolved {}.{} -> {:?}", requesting, field, resolution);
        }
        Ok(resolution)
    }

    pub(crate) fn resolve_with_plan(
        plan: &FieldPlan,
        explicit: Option<&Value>,
        available: &AvailableConfigs,
        field: &str,
    ) -> Resolution {
        if let Some(value) = explicit {
            return Resolution::Resolved {
                value: value.clone(),
                source: ValueSource::Explicit,
            };
        }

        for &ancestor in plan.ancestors() {
            let Some(merged) = available.get(ancestor) else {
                continue;
            };
            if let Some(value) = merged.get(field) {
                let source = match merged.source_of(field) {
                    Some(ConfigSource::Scope { id, .. }) => ValueSource::Scope {
                        config_type: ancestor,
                        scope: id,
                    },
                    _ => ValueSource::GlobalDefault { config_type: ancestor },
                };
                return Resolution::Resolved {
                    value: value.clone(),
                    source,
                };
            }
        }

        match plan.fallback() {
            Some(value) => Resolution::Resolved {
                value: value.clone(),
                source: ValueSource::Default {
                    declared_by: plan.declared_by(),
                },
            },
            None => Resolution::Unset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hieraconf_scope::{GlobalSlot, MergeMode, ScopeStack};
    use hieraconf_test_utils::{diamond_hierarchy, sparse, step_hierarchy, with_defaults};
    use pretty_assertions::assert_eq;

    fn resolved(value: impl Into<Value>, source: ValueSource) -> Resolution {
        Resolution::Resolved {
            value: value.into(),
            source,
        }
    }

    #[test]
    fn explicit_value_wins() {
        let h = step_hierarchy();
        let resolver = DualAxisResolver::new(h.registry.clone());
        let mut stack = ScopeStack::new();
        stack.push(sparse(&h.step, &[("timeout", Value::Int(99))]), MergeMode::Inherit);

        let result = resolver
            .resolve(h.step.id(), "timeout", Some(&Value::Int(10)), &stack.flatten(&GlobalSlot::new()))
            .unwrap();
        assert_eq!(result, resolved(10, ValueSource::Explicit));
    }

    #[test]
    fn ancestor_scope_supplies_value() {
        let h = step_hierarchy();
        let resolver = DualAxisResolver::new(h.registry.clone());
        let mut stack = ScopeStack::new();
        let scope = stack.push(sparse(&h.global, &[("timeout", Value::Int(30))]), MergeMode::Inherit);
        stack.push(sparse(&h.step, &[]), MergeMode::Inherit);

        let result = resolver
            .resolve(h.step.id(), "timeout", None, &stack.flatten(&GlobalSlot::new()))
            .unwrap();
        assert_eq!(
            result,
            resolved(
                30,
                ValueSource::Scope {
                    config_type: h.global.id(),
                    scope
                }
            )
        );
    }

    #[test]
    fn most_specific_ancestor_wins_over_scope_order() {
        let h = step_hierarchy();
        let resolver = DualAxisResolver::new(h.registry.clone());
        let mut stack = ScopeStack::new();
        // Pipeline pushed outside Global; Pipeline is still more specific
        stack.push(sparse(&h.pipeline, &[("timeout", Value::Int(60))]), MergeMode::Inherit);
        stack.push(sparse(&h.global, &[("timeout", Value::Int(30))]), MergeMode::Inherit);

        let available = stack.flatten(&GlobalSlot::new());
        let result = resolver.resolve(h.step.id(), "timeout", None, &available).unwrap();
        assert_eq!(result.value(), Some(&Value::Int(60)));
    }

    #[test]
    fn global_default_layer_is_reported() {
        let h = step_hierarchy();
        let resolver = DualAxisResolver::new(h.registry.clone());
        let slot = GlobalSlot::new();
        slot.set_global_default(with_defaults(&h.global, &[("retries", Value::Int(7))]));

        let available = ScopeStack::new().flatten(&slot);
        let result = resolver.resolve(h.step.id(), "retries", None, &available).unwrap();
        assert_eq!(
            result,
            resolved(7, ValueSource::GlobalDefault { config_type: h.global.id() })
        );
    }

    #[test]
    fn falls_back_to_declared_then_retained_default() {
        let h = step_hierarchy();
        let resolver = DualAxisResolver::new(h.registry.clone());
        let empty = AvailableConfigs::empty();

        let global_timeout = resolver.resolve(h.global.id(), "timeout", None, &empty).unwrap();
        assert_eq!(
            global_timeout,
            resolved(30, ValueSource::Default { declared_by: h.global.id() })
        );
        let step_timeout = resolver.resolve(h.step.id(), "timeout", None, &empty).unwrap();
        assert_eq!(step_timeout.value(), Some(&Value::Int(30)));
        let label = resolver.resolve(h.step.id(), "label", None, &empty).unwrap();
        assert!(label.is_unset());
    }

    #[test]
    fn unknown_field_is_an_error_not_unset() {
        let h = step_hierarchy();
        let resolver = DualAxisResolver::new(h.registry.clone());
        let err = resolver
            .resolve(h.global.id(), "batch_size", None, &AvailableConfigs::empty())
            .unwrap_err();
        assert!(matches!(err, crate::CoreError::Model(ModelError::UnknownField { .. })));
    }

    #[test]
    fn diamond_walks_c3_order() {
        let h = diamond_hierarchy();
        let resolver = DualAxisResolver::new(h.registry.clone());
        let mut stack = ScopeStack::new();
        stack.push(sparse(&h.base, &[("level", Value::Int(1))]), MergeMode::Inherit);
        stack.push(sparse(&h.right, &[("level", Value::Int(2))]), MergeMode::Inherit);
        stack.push(sparse(&h.left, &[("level", Value::Int(3))]), MergeMode::Inherit);

        // Diamond, Left, Right, Base: Left exposes `level` through Base
        let available = stack.flatten(&GlobalSlot::new());
        let result = resolver.resolve(h.diamond.id(), "level", None, &available).unwrap();
        assert_eq!(result.value(), Some(&Value::Int(3)));
    }

    #[test]
    fn cached_and_uncached_agree() {
        let h = step_hierarchy();
        let plain = DualAxisResolver::new(h.registry.clone());
        let cached = DualAxisResolver::with_config(
            h.registry.clone(),
            ResolverConfig::new().with_analysis_cache(true),
            Arc::new(AnalysisCache::new()),
        );
        let mut stack = ScopeStack::new();
        stack.push(sparse(&h.pipeline, &[("batch_size", Value::Int(16))]), MergeMode::Inherit);
        let available = stack.flatten(&GlobalSlot::new());

        for field in h.step.field_names() {
            assert_eq!(
                plain.resolve(h.step.id(), field, None, &available).unwrap(),
                cached.resolve(h.step.id(), field, None, &available).unwrap(),
            );
        }
    }
}
