//! Configuration environment
//!
//! [`ConfigEnv`] bundles the registry, the global slot, the lazy factory,
//! the analysis cache and the resolver. It is cheap to clone and every
//! clone shares the same state. [`ConfigEnv::global`] is the process-wide
//! environment; owned environments keep tests and embedded uses apart.

use crate::analysis::AnalysisCache;
use crate::config::ResolverConfig;
use crate::error::CoreResult;
use crate::factory::{LazyFactory, LazyType};
use crate::lazy::{LazyBuilder, LazyConfig, Preserve};
use crate::resolver::{DualAxisResolver, Resolution};
use hieraconf_model::{ConfigTypeId, Record, RecordSchema, TypeDescriptor, Value};
use hieraconf_registry::TypeRegistry;
use hieraconf_scope::{AvailableConfigs, GlobalSlot, MergeMode, ScopeGuard};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

static GLOBAL_ENV: Lazy<ConfigEnv> = Lazy::new(|| {
    ConfigEnv::with_parts(
        TypeRegistry::global().clone(),
        GlobalSlot::shared(),
        ResolverConfig::default(),
    )
});

/// Shared handle to a registry, global slot and resolver
#[derive(Debug, Clone)]
pub struct ConfigEnv {
    inner: Arc<EnvInner>,
}

#[derive(Debug)]
struct EnvInner {
    registry: TypeRegistry,
    global: Arc<GlobalSlot>,
    factory: LazyFactory,
    analysis: Arc<AnalysisCache>,
    resolver: DualAxisResolver,
    config: ResolverConfig,
}

impl ConfigEnv {
    /// Environment over `registry` with its own global slot
    #[must_use]
    pub fn new(registry: TypeRegistry) -> Self {
        Self::with_config(registry, ResolverConfig::default())
    }

    /// Environment over `registry` with resolver configuration
    #[must_use]
    pub fn with_config(registry: TypeRegistry, config: ResolverConfig) -> Self {
        Self::with_parts(registry, Arc::new(GlobalSlot::new()), config)
    }

    /// Environment from explicit parts
    #[must_use]
    pub fn with_parts(registry: TypeRegistry, global: Arc<GlobalSlot>, config: ResolverConfig) -> Self {
        let analysis = Arc::new(AnalysisCache::new());
        Self {
            inner: Arc::new(EnvInner {
                factory: LazyFactory::new(registry.clone()),
                resolver: DualAxisResolver::with_config(registry.clone(), config, Arc::clone(&analysis)),
                registry,
                global,
                analysis,
                config,
            }),
        }
    }

    /// Process-wide environment
    #[must_use]
    pub fn global() -> Self {
        GLOBAL_ENV.clone()
    }

    /// Type registry
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &TypeRegistry {
        &self.inner.registry
    }

    /// Global slot
    #[inline]
    #[must_use]
    pub fn global_slot(&self) -> &Arc<GlobalSlot> {
        &self.inner.global
    }

    /// Resolver configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> ResolverConfig {
        self.inner.config
    }

    /// Field resolver
    #[inline]
    #[must_use]
    pub fn resolver(&self) -> &DualAxisResolver {
        &self.inner.resolver
    }

    /// Lazy type factory
    #[inline]
    #[must_use]
    pub fn factory(&self) -> &LazyFactory {
        &self.inner.factory
    }

    /// Analysis cache (filled only when enabled)
    #[inline]
    #[must_use]
    pub fn analysis_cache(&self) -> &Arc<AnalysisCache> {
        &self.inner.analysis
    }

    /// Register one schema
    ///
    /// # Errors
    /// Registration faults from the registry.
    pub fn register(&self, schema: RecordSchema) -> CoreResult<ConfigTypeId> {
        Ok(self.inner.registry.register(schema)?)
    }

    /// Register schemas that may reference each other
    ///
    /// # Errors
    /// Registration faults from the registry; nothing is committed on error.
    pub fn register_batch(&self, schemas: Vec<RecordSchema>) -> CoreResult<Vec<ConfigTypeId>> {
        Ok(self.inner.registry.register_batch(schemas)?)
    }

    /// Descriptor by id
    ///
    /// # Errors
    /// Unknown or foreign ids.
    pub fn descriptor(&self, id: ConfigTypeId) -> CoreResult<Arc<TypeDescriptor>> {
        Ok(self.inner.registry.descriptor(id)?)
    }

    /// Descriptor by name
    ///
    /// # Errors
    /// Unknown names.
    pub fn descriptor_by_name(&self, name: &str) -> CoreResult<Arc<TypeDescriptor>> {
        Ok(self.inner.registry.descriptor_by_name(name)?)
    }

    /// Record the application's base config type (idempotent)
    ///
    /// # Errors
    /// Unknown ids, or a different base type already registered.
    pub fn register_base_config_type(&self, id: ConfigTypeId) -> CoreResult<()> {
        let descriptor = self.descriptor(id)?;
        Ok(self.inner.global.register_base_config_type(&descriptor)?)
    }

    /// Registered base config type
    #[must_use]
    pub fn base_config_type(&self) -> Option<ConfigTypeId> {
        self.inner.global.base_config_type()
    }

    /// Install the global default for the record's type
    ///
    /// Any registered type may carry a default, not only the base config
    /// type; see [`GlobalSlot::set_global_default`].
    ///
    /// # Errors
    /// Records of a type from another registry.
    pub fn set_global_default(&self, record: Record) -> CoreResult<Option<Record>> {
        self.descriptor(record.type_id())?;
        Ok(self.inner.global.set_global_default(record))
    }

    /// Global default for a type
    #[must_use]
    pub fn global_default(&self, id: ConfigTypeId) -> Option<Record> {
        self.inner.global.global_default(id)
    }

    /// Remove the global default for a type
    pub fn clear_global_default(&self, id: ConfigTypeId) -> Option<Record> {
        self.inner.global.clear_global_default(id)
    }

    /// Register the record's type as base and make the record the global default
    ///
    /// # Errors
    /// Foreign records, or a different base type already registered.
    pub fn ensure_global_config_context(&self, record: Record) -> CoreResult<()> {
        self.register_base_config_type(record.type_id())?;
        self.set_global_default(record)?;
        Ok(())
    }

    /// Enter a scope on the current context
    ///
    /// # Errors
    /// - Records of a type from another registry
    /// - [`ScopeError::UnscopedTask`](hieraconf_scope::ScopeError::UnscopedTask)
    ///   inside a tokio task that has no stack of its own
    pub fn enter_scope(&self, record: Record) -> CoreResult<ScopeGuard> {
        self.enter_scope_with(record, MergeMode::Inherit)
    }

    /// Enter a scope whose placeholders hide outer values of the same type
    ///
    /// # Errors
    /// Records of a type from another registry.
    pub fn enter_scope_masked(&self, record: Record) -> CoreResult<ScopeGuard> {
        self.enter_scope_with(record, MergeMode::Mask)
    }

    fn enter_scope_with(&self, record: Record, mode: MergeMode) -> CoreResult<ScopeGuard> {
        self.descriptor(record.type_id())?;
        Ok(hieraconf_scope::enter_scope_with(record, mode)?)
    }

    /// Run `fut` inside `record`'s scope, on a copy of the current stack
    ///
    /// # Errors
    /// Records of a type from another registry.
    pub fn within_scope<F: Future>(
        &self,
        record: Record,
        fut: F,
    ) -> CoreResult<impl Future<Output = F::Output>> {
        self.descriptor(record.type_id())?;
        Ok(hieraconf_scope::within_scope(record, fut))
    }

    /// Snapshot of the global defaults and the current context's scopes
    #[must_use]
    pub fn flatten_active_scopes(&self) -> AvailableConfigs {
        hieraconf_scope::flatten_active_scopes(&self.inner.global)
    }

    /// Resolve a field against the current context
    ///
    /// # Errors
    /// Unknown fields or foreign ids.
    pub fn resolve(&self, requesting: ConfigTypeId, field: &str, explicit: Option<&Value>) -> CoreResult<Resolution> {
        let available = self.flatten_active_scopes();
        self.inner.resolver.resolve(requesting, field, explicit, &available)
    }

    /// Lazy type for a concrete type
    ///
    /// # Errors
    /// See [`LazyFactory::make_lazy`].
    pub fn make_lazy(&self, id: ConfigTypeId) -> CoreResult<Arc<LazyType>> {
        self.inner.factory.make_lazy(id)
    }

    /// Lazy type for a concrete type under an explicit name
    ///
    /// # Errors
    /// See [`LazyFactory::make_lazy_named`].
    pub fn make_lazy_named(&self, id: ConfigTypeId, name: &str) -> CoreResult<Arc<LazyType>> {
        self.inner.factory.make_lazy_named(id, name)
    }

    /// Lazy instance with no explicit values
    ///
    /// # Errors
    /// See [`LazyFactory::make_lazy`].
    pub fn lazy(&self, id: ConfigTypeId) -> CoreResult<LazyConfig> {
        Ok(LazyConfig::new(self.clone(), self.make_lazy(id)?, IndexMap::new()))
    }

    /// Builder for a lazy instance
    ///
    /// # Errors
    /// See [`LazyFactory::make_lazy`].
    pub fn lazy_builder(&self, id: ConfigTypeId) -> CoreResult<LazyBuilder> {
        Ok(LazyBuilder::new(self.clone(), self.make_lazy(id)?))
    }

    /// Lazy instance carrying a concrete record's values
    ///
    /// # Errors
    /// Foreign records or lazy generation failures.
    pub fn lazy_from_record(&self, record: &Record, preserve: Preserve) -> CoreResult<LazyConfig> {
        LazyConfig::from_record(self, record, preserve)
    }

    /// Resolve every field of `lazy` against the current context
    ///
    /// # Errors
    /// See [`LazyConfig::materialize`].
    pub fn materialize(&self, lazy: &LazyConfig) -> CoreResult<Record> {
        lazy.materialize_in(&self.flatten_active_scopes())
    }

    /// Populate caches for `types` and every record type nested in them
    ///
    /// Changes timing only, never results.
    ///
    /// # Errors
    /// Unknown or foreign ids.
    pub fn prewarm<I>(&self, types: I) -> CoreResult<()>
    where
        I: IntoIterator<Item = ConfigTypeId>,
    {
        let mut pending: Vec<ConfigTypeId> = types.into_iter().collect();
        let mut seen = HashSet::new();
        while let Some(id) = pending.pop() {
            if !seen.insert(id) {
                continue;
            }
            let descriptor = self.descriptor(id)?;
            self.inner.registry.linearize(id)?;
            self.make_lazy(id)?;
            if self.inner.config.use_analysis_cache {
                self.inner.analysis.plan(&self.inner.registry, id)?;
            }
            pending.extend(descriptor.fields().filter_map(|f| f.nested().map(|n| n.id())));
        }
        tracing::debug!("Prewarmed {} config types", seen.len());
        Ok(())
    }
}
