//! Type registry and linearization cache
//!
//! The registry is an append-only arena of [`TypeDescriptor`]s. Registration
//! resolves base and nested type names, computes the C3 order and the
//! effective field set, and validates the nesting graph. Everything is
//! checked before the first descriptor is committed, so a failed call leaves
//! the registry exactly as it was.
//!
//! Readers never take the writer lock. A descriptor is pushed to the arena
//! before its name is indexed, so a name lookup that succeeds always finds a
//! complete entry.

use crate::error::{RegistryError, RegistryResult};
use crate::lazy_map::LazyMap;
use crate::linearize::c3_linearize;
use dashmap::DashMap;
use hieraconf_model::{
    ConfigTypeId, EffectiveField, FieldDecl, FieldDefault, LazyTypeId, Linearization,
    RecordSchema, RegistryId, TypeDescriptor,
};
use indexmap::{IndexMap, IndexSet};
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::Arc;

static GLOBAL_REGISTRY: Lazy<TypeRegistry> = Lazy::new(TypeRegistry::new);

/// Process-wide or owned registry of config types
///
/// Cloning is cheap and yields a handle to the same registry.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    inner: Arc<RegistryInner>,
}

#[derive(Debug)]
struct RegistryInner {
    id: RegistryId,
    arena: RwLock<Vec<Arc<TypeDescriptor>>>,
    by_name: DashMap<String, ConfigTypeId>,
    linearizations: DashMap<ConfigTypeId, Arc<Linearization>>,
    lazy: LazyMap,
    writer: Mutex<()>,
}

impl TypeRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        let id = RegistryId::next();
        Self {
            inner: Arc::new(RegistryInner {
                id,
                arena: RwLock::new(Vec::new()),
                by_name: DashMap::new(),
                linearizations: DashMap::new(),
                lazy: LazyMap::new(id),
                writer: Mutex::new(()),
            }),
        }
    }

    /// Process-wide registry
    #[must_use]
    pub fn global() -> &'static TypeRegistry {
        &GLOBAL_REGISTRY
    }

    /// Identity of this registry
    #[inline]
    #[must_use]
    pub fn id(&self) -> RegistryId {
        self.inner.id
    }

    /// Whether two handles refer to the same registry
    #[inline]
    #[must_use]
    pub fn same_as(&self, other: &TypeRegistry) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Register one schema
    ///
    /// # Errors
    /// See [`TypeRegistry::register_batch`].
    pub fn register(&self, schema: RecordSchema) -> RegistryResult<ConfigTypeId> {
        let ids = self.register_batch(vec![schema])?;
        ids.into_iter()
            .next()
            .ok_or_else(|| RegistryError::invalid_linearization("<batch>", "empty registration"))
    }

    /// Register schemas that may reference each other
    ///
    /// Returns ids in input order. Re-registering an identical schema is a
    /// no-op returning the existing id.
    ///
    /// # Errors
    /// - [`RegistryError::UnknownType`] for an unresolvable base or nested type
    /// - [`RegistryError::DuplicateType`] for a name taken by a different schema
    /// - [`RegistryError::InvalidLinearization`] for cyclic inheritance or a
    ///   hierarchy with no C3 order
    /// - [`RegistryError::RecursiveNesting`] for a record nesting itself
    pub fn register_batch(&self, schemas: Vec<RecordSchema>) -> RegistryResult<Vec<ConfigTypeId>> {
        let _writer = self.inner.writer.lock();

        // Split into already-registered and pending
        let mut pending: IndexMap<String, RecordSchema> = IndexMap::new();
        for schema in &schemas {
            if let Ok(existing) = self.descriptor_by_name(schema.name()) {
                if existing.schema() != schema {
                    return Err(RegistryError::DuplicateType {
                        name: schema.name().to_string(),
                    });
                }
                continue;
            }
            match pending.get(schema.name()) {
                Some(other) if other != schema => {
                    return Err(RegistryError::DuplicateType {
                        name: schema.name().to_string(),
                    });
                }
                Some(_) => {}
                None => {
                    pending.insert(schema.name().to_string(), schema.clone());
                }
            }
        }

        for schema in pending.values() {
            for name in schema.referenced_types() {
                if !pending.contains_key(name) && !self.inner.by_name.contains_key(name) {
                    return Err(RegistryError::unknown_type(name, schema.name()));
                }
            }
        }

        let order = dependency_order(&pending)?;

        // Build descriptors against a private view; slot == index in `all`
        let mut all: Vec<Arc<TypeDescriptor>> = self.inner.arena.read().clone();
        let committed = all.len();
        let mut pending_ids: HashMap<String, ConfigTypeId> = HashMap::new();

        for name in order {
            let Some(schema) = pending.get(name) else {
                continue;
            };
            let slot = u32::try_from(all.len())
                .map_err(|_| RegistryError::invalid_linearization(name, "registry is full"))?;
            let id = ConfigTypeId::new(self.inner.id, slot);
            let view = BuildView {
                all: &all,
                pending_ids: &pending_ids,
                by_name: &self.inner.by_name,
            };
            let descriptor = build_descriptor(id, schema, &view)?;
            pending_ids.insert(name.to_string(), id);
            all.push(Arc::new(descriptor));
        }

        // Commit: arena first, then names
        let fresh: Vec<Arc<TypeDescriptor>> = all.split_off(committed);
        self.inner.arena.write().extend(fresh.iter().cloned());
        for descriptor in &fresh {
            self.inner
                .by_name
                .insert(descriptor.name().to_string(), descriptor.id());
            tracing::debug!(
                "Registered config type {} as {} ({} ancestors, {} fields)",
                descriptor.name(),
                descriptor.id(),
                descriptor.linearization().depth(),
                descriptor.field_count()
            );
        }

        schemas
            .iter()
            .map(|s| {
                self.lookup(s.name())
                    .ok_or_else(|| RegistryError::unknown_type(s.name(), "<batch>"))
            })
            .collect()
    }

    /// Descriptor for an id
    ///
    /// # Errors
    /// [`RegistryError::ForeignType`] for an id from another registry.
    pub fn descriptor(&self, id: ConfigTypeId) -> RegistryResult<Arc<TypeDescriptor>> {
        self.check_owned(id)?;
        self.inner
            .arena
            .read()
            .get(id.slot())
            .cloned()
            .ok_or_else(|| RegistryError::foreign(id))
    }

    /// Descriptor for a registered name
    ///
    /// # Errors
    /// [`RegistryError::UnknownType`] if the name is not registered.
    pub fn descriptor_by_name(&self, name: &str) -> RegistryResult<Arc<TypeDescriptor>> {
        let id = self
            .lookup(name)
            .ok_or_else(|| RegistryError::unknown_type(name, "lookup"))?;
        self.descriptor(id)
    }

    /// Id for a registered name
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<ConfigTypeId> {
        self.inner.by_name.get(name).map(|id| *id)
    }

    /// Ancestor order and field sets, cached on first use
    ///
    /// # Errors
    /// [`RegistryError::ForeignType`] for an id from another registry.
    pub fn linearize(&self, id: ConfigTypeId) -> RegistryResult<Arc<Linearization>> {
        if let Some(cached) = self.inner.linearizations.get(&id) {
            return Ok(Arc::clone(&cached));
        }
        let descriptor = self.descriptor(id)?;
        let entry = self
            .inner
            .linearizations
            .entry(id)
            .or_insert_with(|| Arc::clone(descriptor.linearization()));
        Ok(Arc::clone(&entry))
    }

    /// Whether the linearization of `id` is already cached
    #[must_use]
    pub fn is_linearization_cached(&self, id: ConfigTypeId) -> bool {
        self.inner.linearizations.contains_key(&id)
    }

    /// Whether `child` is `ancestor` or derives from it
    ///
    /// # Errors
    /// [`RegistryError::ForeignType`] for an id from another registry.
    pub fn is_subtype(&self, child: ConfigTypeId, ancestor: ConfigTypeId) -> RegistryResult<bool> {
        self.check_owned(ancestor)?;
        Ok(self.linearize(child)?.contains(ancestor))
    }

    /// Number of registered types
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.arena.read().len()
    }

    /// Whether nothing is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered type names in registration order
    #[must_use]
    pub fn type_names(&self) -> Vec<String> {
        self.inner
            .arena
            .read()
            .iter()
            .map(|d| d.name().to_string())
            .collect()
    }

    /// Lazy type id for a lazy type name, allocated on first request
    #[must_use]
    pub fn lazy_id_for(&self, name: &str) -> LazyTypeId {
        self.inner.lazy.id_for(name)
    }

    /// Name a lazy id was allocated for
    #[must_use]
    pub fn lazy_name(&self, lazy: LazyTypeId) -> Option<String> {
        self.inner.lazy.name(lazy)
    }

    /// Pair a lazy type with its concrete type
    ///
    /// Re-registering the same pair is a no-op.
    ///
    /// # Errors
    /// - [`RegistryError::AmbiguousRegistration`] if either side is already
    ///   paired differently
    /// - [`RegistryError::ForeignType`] for ids from another registry
    pub fn register_lazy(&self, lazy: LazyTypeId, concrete: ConfigTypeId) -> RegistryResult<()> {
        let descriptor = self.descriptor(concrete)?;
        self.inner.lazy.pair(lazy, concrete, descriptor.name())?;
        tracing::debug!("Paired {} with {}", lazy, descriptor.name());
        Ok(())
    }

    /// Concrete type wrapped by a lazy type
    #[must_use]
    pub fn concrete_for_lazy(&self, lazy: LazyTypeId) -> Option<ConfigTypeId> {
        self.inner.lazy.concrete_for(lazy)
    }

    /// Lazy type paired with a concrete type
    #[must_use]
    pub fn lazy_for_concrete(&self, concrete: ConfigTypeId) -> Option<LazyTypeId> {
        self.inner.lazy.lazy_for(concrete)
    }

    /// Number of lazy ↔ concrete pairs
    #[must_use]
    pub fn lazy_pair_count(&self) -> usize {
        self.inner.lazy.pair_count()
    }

    fn check_owned(&self, id: ConfigTypeId) -> RegistryResult<()> {
        if id.registry() == self.inner.id {
            Ok(())
        } else {
            Err(RegistryError::foreign(id))
        }
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Base,
    Nested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Order pending schemas so bases and nested types come first
fn dependency_order(pending: &IndexMap<String, RecordSchema>) -> RegistryResult<Vec<&str>> {
    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut out = Vec::with_capacity(pending.len());
    for name in pending.keys() {
        let mut path = Vec::new();
        visit(name, Edge::Base, pending, &mut marks, &mut path, &mut out)?;
    }
    Ok(out)
}

fn visit<'a>(
    name: &'a str,
    via: Edge,
    pending: &'a IndexMap<String, RecordSchema>,
    marks: &mut HashMap<&'a str, Mark>,
    path: &mut Vec<(&'a str, Edge)>,
    out: &mut Vec<&'a str>,
) -> RegistryResult<()> {
    match marks.get(name) {
        Some(Mark::Done) => return Ok(()),
        Some(Mark::Visiting) => return Err(cycle_error(name, via, path)),
        None => {}
    }
    let Some(schema) = pending.get(name) else {
        // Already committed; it cannot reach back into the batch
        return Ok(());
    };

    marks.insert(name, Mark::Visiting);
    path.push((name, via));

    let bases = schema.bases().iter().map(|b| (b.as_str(), Edge::Base));
    let nested = schema
        .fields()
        .iter()
        .filter_map(|f| f.ty.record_name())
        .map(|n| (n, Edge::Nested));
    for (next, edge) in bases.chain(nested) {
        visit(next, edge, pending, marks, path, out)?;
    }

    path.pop();
    marks.insert(name, Mark::Done);
    out.push(name);
    Ok(())
}

fn cycle_error(closing: &str, via: Edge, path: &[(&str, Edge)]) -> RegistryError {
    let start = path.iter().position(|(n, _)| *n == closing).unwrap_or(0);
    let mut names: Vec<String> = path[start..].iter().map(|(n, _)| (*n).to_string()).collect();
    names.push(closing.to_string());
    let nesting = via == Edge::Nested || path[start + 1..].iter().any(|(_, e)| *e == Edge::Nested);
    if nesting {
        RegistryError::RecursiveNesting { path: names }
    } else {
        RegistryError::invalid_linearization(closing, format!("cyclic inheritance: {}", names.join(" -> ")))
    }
}

/// Descriptors visible while a batch is being built
struct BuildView<'a> {
    all: &'a [Arc<TypeDescriptor>],
    pending_ids: &'a HashMap<String, ConfigTypeId>,
    by_name: &'a DashMap<String, ConfigTypeId>,
}

impl BuildView<'_> {
    fn named(&self, name: &str, referenced_by: &str) -> RegistryResult<Arc<TypeDescriptor>> {
        let id = self
            .pending_ids
            .get(name)
            .copied()
            .or_else(|| self.by_name.get(name).map(|r| *r));
        id.and_then(|id| self.by_id(id))
            .ok_or_else(|| RegistryError::unknown_type(name, referenced_by))
    }

    fn by_id(&self, id: ConfigTypeId) -> Option<Arc<TypeDescriptor>> {
        self.all.get(id.slot()).cloned()
    }
}

/// Compute order and effective fields for one schema
fn build_descriptor(
    id: ConfigTypeId,
    schema: &RecordSchema,
    view: &BuildView<'_>,
) -> RegistryResult<TypeDescriptor> {
    let bases: Vec<Arc<TypeDescriptor>> = schema
        .bases()
        .iter()
        .map(|b| view.named(b, schema.name()))
        .collect::<RegistryResult<_>>()?;
    let base_ids: SmallVec<[ConfigTypeId; 4]> = bases.iter().map(|b| b.id()).collect();

    let base_orders: Vec<&[ConfigTypeId]> = bases.iter().map(|b| b.linearization().order()).collect();
    let order = c3_linearize(id, &base_ids, &base_orders).map_err(|blocked| {
        let names: Vec<String> = blocked
            .iter()
            .filter_map(|b| view.by_id(*b).map(|d| d.name().to_string()))
            .collect();
        RegistryError::invalid_linearization(
            schema.name(),
            format!("cannot order bases consistently ({})", names.join(", ")),
        )
    })?;

    // Ancestor descriptors in order, self excluded
    let ancestors: Vec<Arc<TypeDescriptor>> = order[1..]
        .iter()
        .map(|aid| {
            view.by_id(*aid)
                .ok_or_else(|| RegistryError::unknown_type(aid.to_string(), schema.name()))
        })
        .collect::<RegistryResult<_>>()?;

    // Least specific first; an override keeps the position of the original
    let mut fields: IndexMap<String, EffectiveField> = IndexMap::new();
    for ancestor in ancestors.iter().rev() {
        for field in ancestor.fields().filter(|f| f.declared_by() == ancestor.id()) {
            fields.insert(field.name().to_string(), field.clone());
        }
    }
    for decl in schema.fields() {
        let nested = match decl.ty.record_name() {
            Some(n) => Some(view.named(n, schema.name())?),
            None => None,
        };
        fields.insert(decl.name.clone(), EffectiveField::new(decl.clone(), id, nested));
    }

    // Inherited concrete defaults become placeholders; own declarations stay
    if schema.inherit_as_none() {
        for field in fields.values_mut().filter(|f| f.declared_by() != id) {
            if let (None, FieldDefault::Value(original)) = (field.nested(), field.default()) {
                let decl = FieldDecl::placeholder(field.name(), field.ty().clone());
                *field = EffectiveField::new(decl, id, None).with_retained_default(original.clone());
            }
        }
    }

    let mut names: SmallVec<[String; 8]> = SmallVec::new();
    let mut field_sets: Vec<IndexSet<String>> = Vec::with_capacity(order.len());
    names.push(schema.name().to_string());
    field_sets.push(fields.keys().cloned().collect());
    for ancestor in &ancestors {
        names.push(ancestor.name().to_string());
        field_sets.push(ancestor.field_names().map(str::to_string).collect());
    }

    let linearization = Linearization::new(SmallVec::from_vec(order), names, field_sets);
    Ok(TypeDescriptor::new(
        id,
        schema.clone(),
        base_ids,
        Arc::new(linearization),
        fields,
    ))
}
