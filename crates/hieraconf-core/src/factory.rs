//! Lazy type factory
//!
//! A [`LazyType`] is the static companion of a concrete config type: the
//! same fields, every one optional, with nested record fields retargeted
//! to the lazy type of the nested record. The factory builds one per
//! concrete type, pairs it with the concrete type in the registry and
//! hands out the same `Arc` on every later request.

use crate::error::CoreResult;
use dashmap::DashMap;
use hieraconf_model::{ConfigTypeId, EffectiveField, FieldType, LazyTypeId, TypeDescriptor};
use hieraconf_registry::TypeRegistry;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// Default lazy type name for a concrete type
#[must_use]
pub fn lazy_name_for(concrete: &str) -> String {
    format!("Lazy{concrete}")
}

/// One optionalized field of a lazy type
#[derive(Clone)]
pub struct LazyField {
    name: String,
    ty: FieldType,
    declared: EffectiveField,
    nested: Option<Arc<LazyType>>,
}

impl LazyField {
    /// Field name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Optional field type, nested records named by their lazy type
    #[inline]
    #[must_use]
    pub fn ty(&self) -> &FieldType {
        &self.ty
    }

    /// Declaration on the concrete type
    #[inline]
    #[must_use]
    pub fn declared(&self) -> &EffectiveField {
        &self.declared
    }

    /// Lazy type substituted for a nested record field
    #[inline]
    #[must_use]
    pub fn nested(&self) -> Option<&Arc<LazyType>> {
        self.nested.as_ref()
    }
}

impl fmt::Debug for LazyField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyField")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .field("nested", &self.nested.as_ref().map(|n| n.name()))
            .finish()
    }
}

/// Companion of a concrete config type with every field optional
pub struct LazyType {
    id: LazyTypeId,
    name: String,
    concrete: Arc<TypeDescriptor>,
    fields: IndexMap<String, LazyField>,
}

impl LazyType {
    /// Lazy type id
    #[inline]
    #[must_use]
    pub fn id(&self) -> LazyTypeId {
        self.id
    }

    /// Lazy type name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wrapped concrete type
    #[inline]
    #[must_use]
    pub fn concrete(&self) -> &Arc<TypeDescriptor> {
        &self.concrete
    }

    /// Wrapped concrete type id
    #[inline]
    #[must_use]
    pub fn concrete_id(&self) -> ConfigTypeId {
        self.concrete.id()
    }

    /// Field by name
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&LazyField> {
        self.fields.get(name)
    }

    /// Fields in concrete declaration order
    pub fn fields(&self) -> impl ExactSizeIterator<Item = &LazyField> {
        self.fields.values()
    }

    /// Field names in concrete declaration order
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Number of fields
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }
}

impl fmt::Debug for LazyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyType")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("concrete", &self.concrete.name())
            .field("fields", &self.fields.values().collect::<Vec<_>>())
            .finish()
    }
}

/// Builds and caches lazy types
#[derive(Debug, Clone)]
pub struct LazyFactory {
    registry: TypeRegistry,
    by_concrete: Arc<DashMap<ConfigTypeId, Arc<LazyType>>>,
}

impl LazyFactory {
    /// Factory over `registry`
    #[must_use]
    pub fn new(registry: TypeRegistry) -> Self {
        Self {
            registry,
            by_concrete: Arc::new(DashMap::new()),
        }
    }

    /// Lazy type for `concrete`, named `Lazy<Concrete>` when first built
    ///
    /// Returns the existing lazy type whatever name it was built under.
    ///
    /// # Errors
    /// - Registry errors for unknown or foreign ids
    /// - [`hieraconf_registry::RegistryError::AmbiguousRegistration`] if
    ///   the default name is already paired elsewhere
    pub fn make_lazy(&self, concrete: ConfigTypeId) -> CoreResult<Arc<LazyType>> {
        if let Some(existing) = self.get(concrete) {
            return Ok(existing);
        }
        let descriptor = self.registry.descriptor(concrete)?;
        self.build(&descriptor, &lazy_name_for(descriptor.name()))
    }

    /// Lazy type for `concrete` under an explicit name
    ///
    /// # Errors
    /// [`hieraconf_registry::RegistryError::AmbiguousRegistration`] if the
    /// concrete type is already paired with a lazy type of another name, or
    /// the name already wraps another concrete type.
    pub fn make_lazy_named(&self, concrete: ConfigTypeId, name: &str) -> CoreResult<Arc<LazyType>> {
        let descriptor = self.registry.descriptor(concrete)?;
        // Pairing first surfaces a conflicting name even on a cache hit
        let lazy_id = self.registry.lazy_id_for(name);
        self.registry.register_lazy(lazy_id, concrete)?;
        if let Some(existing) = self.get(concrete) {
            return Ok(existing);
        }
        self.build(&descriptor, name)
    }

    /// Cached lazy type, without building one
    #[must_use]
    pub fn get(&self, concrete: ConfigTypeId) -> Option<Arc<LazyType>> {
        self.by_concrete.get(&concrete).map(|l| Arc::clone(l.value()))
    }

    /// Number of lazy types built
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_concrete.len()
    }

    /// Whether nothing was built yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_concrete.is_empty()
    }

    fn build(&self, descriptor: &Arc<TypeDescriptor>, name: &str) -> CoreResult<Arc<LazyType>> {
        let lazy_id = self.registry.lazy_id_for(name);
        self.registry.register_lazy(lazy_id, descriptor.id())?;

        // Nesting is acyclic, enforced at registration, so this terminates
        let mut fields = IndexMap::with_capacity(descriptor.field_count());
        for field in descriptor.fields() {
            let nested = match field.nested() {
                Some(inner) => Some(self.make_lazy(inner.id())?),
                None => None,
            };
            let ty = match &nested {
                Some(lazy) => FieldType::record(lazy.name()).optional(),
                None => field.ty().clone().optional(),
            };
            fields.insert(
                field.name().to_string(),
                LazyField {
                    name: field.name().to_string(),
                    ty,
                    declared: field.clone(),
                    nested,
                },
            );
        }

        let built = Arc::new(LazyType {
            id: lazy_id,
            name: name.to_string(),
            concrete: Arc::clone(descriptor),
            fields,
        });
        let stored = Arc::clone(
            self.by_concrete
                .entry(descriptor.id())
                .or_insert_with(|| Arc::clone(&built))
                .value(),
        );
        if Arc::ptr_eq(&stored, &built) {
            tracing::debug!(
                "Generated lazy type {} for {} ({} fields)",
                name,
                descriptor.name(),
                stored.field_count()
            );
        } else {
            tracing::warn!("Lazy type for {} was generated concurrently; using the first", descriptor.name());
        }
        Ok(stored)
    }
}
