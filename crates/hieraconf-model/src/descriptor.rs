//! Registered type descriptors
//!
//! A [`TypeDescriptor`] is what the registry produces from a schema: the
//! resolved base ids, the ancestor order and the effective field set with
//! the most specific declaration of every field. Descriptors are immutable
//! once created and shared behind `Arc`.

use crate::ids::ConfigTypeId;
use crate::record::{Record, RecordBuilder};
use crate::schema::RecordSchema;
use crate::value::{FieldDecl, FieldDefault, FieldType, Value};
use indexmap::{IndexMap, IndexSet};
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// Ancestor order of a type, most specific first
///
/// Each ancestor carries the set of field names an instance of that
/// ancestor exposes, so the Y-axis walk can skip ancestors that cannot
/// hold the requested field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Linearization {
    order: SmallVec<[ConfigTypeId; 8]>,
    names: SmallVec<[String; 8]>,
    field_sets: Vec<IndexSet<String>>,
}

impl Linearization {
    /// Build from parallel lists (self first)
    ///
    /// # Panics
    /// Panics if the lists differ in length; this is a registry bug.
    #[must_use]
    pub fn new(
        order: SmallVec<[ConfigTypeId; 8]>,
        names: SmallVec<[String; 8]>,
        field_sets: Vec<IndexSet<String>>,
    ) -> Self {
        assert!(
            order.len() == names.len() && order.len() == field_sets.len(),
            "linearization lists must be parallel"
        );
        Self {
            order,
            names,
            field_sets,
        }
    }

    /// Ancestor ids, self first
    #[inline]
    #[must_use]
    pub fn order(&self) -> &[ConfigTypeId] {
        &self.order
    }

    /// Ancestor names, self first
    #[inline]
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of types in the order, including self
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.order.len()
    }

    /// Whether `id` is self or an ancestor
    #[inline]
    #[must_use]
    pub fn contains(&self, id: ConfigTypeId) -> bool {
        self.order.contains(&id)
    }

    /// Field names exposed by the ancestor at `position`
    #[must_use]
    pub fn fields_at(&self, position: usize) -> Option<&IndexSet<String>> {
        self.field_sets.get(position)
    }

    /// Ancestors exposing `field`, most specific first
    pub fn ancestors_exposing<'a>(
        &'a self,
        field: &'a str,
    ) -> impl Iterator<Item = ConfigTypeId> + 'a {
        self.order
            .iter()
            .zip(&self.field_sets)
            .filter(move |(_, set)| set.contains(field))
            .map(|(id, _)| *id)
    }
}

/// Most specific declaration of a field on a registered type
#[derive(Clone)]
pub struct EffectiveField {
    decl: FieldDecl,
    declared_by: ConfigTypeId,
    nested: Option<Arc<TypeDescriptor>>,
    retained: Option<Value>,
}

impl EffectiveField {
    /// Create effective field
    #[must_use]
    pub fn new(
        decl: FieldDecl,
        declared_by: ConfigTypeId,
        nested: Option<Arc<TypeDescriptor>>,
    ) -> Self {
        Self {
            decl,
            declared_by,
            nested,
            retained: None,
        }
    }

    /// Keep the concrete default this field had before it was redeclared
    /// as a placeholder
    #[must_use]
    pub fn with_retained_default(mut self, value: Value) -> Self {
        self.retained = Some(value);
        self
    }

    /// Concrete default hidden by an inherit-as-placeholder redeclaration
    #[inline]
    #[must_use]
    pub fn retained_default(&self) -> Option<&Value> {
        self.retained.as_ref()
    }

    /// Field name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.decl.name
    }

    /// Declared type
    #[inline]
    #[must_use]
    pub fn ty(&self) -> &FieldType {
        &self.decl.ty
    }

    /// Static default
    #[inline]
    #[must_use]
    pub fn default(&self) -> &FieldDefault {
        &self.decl.default
    }

    /// Underlying declaration
    #[inline]
    #[must_use]
    pub fn decl(&self) -> &FieldDecl {
        &self.decl
    }

    /// Type whose declaration is in effect
    #[inline]
    #[must_use]
    pub fn declared_by(&self) -> ConfigTypeId {
        self.declared_by
    }

    /// Descriptor of the nested record type, for record fields
    #[inline]
    #[must_use]
    pub fn nested(&self) -> Option<&Arc<TypeDescriptor>> {
        self.nested.as_ref()
    }

    /// Whether `value` can be stored in this field
    #[must_use]
    pub fn accepts(&self, value: &Value) -> bool {
        match (&self.nested, value) {
            (Some(nested), Value::Record(record)) => record.descriptor().is_subtype_of(nested.id()),
            (Some(_), _) => false,
            (None, v) => self.decl.ty.accepts_shape(v),
        }
    }

    /// Default value materialized as a concrete value, if any
    #[must_use]
    pub fn default_value(&self) -> Option<Value> {
        match (&self.decl.default, &self.nested) {
            (FieldDefault::Value(v), _) => Some(v.clone()),
            (FieldDefault::Nested, Some(nested)) => Some(Value::Record(Record::defaults(nested))),
            _ => None,
        }
    }

    /// Last-resort value when nothing in scope is concrete: the default,
    /// or the retained default of a redeclared field
    #[must_use]
    pub fn fallback_value(&self) -> Option<Value> {
        self.default_value().or_else(|| self.retained.clone())
    }
}

impl fmt::Debug for EffectiveField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectiveField")
            .field("decl", &self.decl)
            .field("declared_by", &self.declared_by)
            .field("nested", &self.nested.as_ref().map(|n| n.name()))
            .field("retained", &self.retained)
            .finish()
    }
}

/// Immutable description of a registered config type
#[derive(Debug)]
pub struct TypeDescriptor {
    id: ConfigTypeId,
    schema: RecordSchema,
    bases: SmallVec<[ConfigTypeId; 4]>,
    linearization: Arc<Linearization>,
    fields: IndexMap<String, EffectiveField>,
}

impl TypeDescriptor {
    /// Create descriptor (called by the registry after validation)
    #[must_use]
    pub fn new(
        id: ConfigTypeId,
        schema: RecordSchema,
        bases: SmallVec<[ConfigTypeId; 4]>,
        linearization: Arc<Linearization>,
        fields: IndexMap<String, EffectiveField>,
    ) -> Self {
        Self {
            id,
            schema,
            bases,
            linearization,
            fields,
        }
    }

    /// Type id
    #[inline]
    #[must_use]
    pub fn id(&self) -> ConfigTypeId {
        self.id
    }

    /// Type name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        self.schema.name()
    }

    /// Schema this descriptor was registered from
    #[inline]
    #[must_use]
    pub fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    /// Direct base ids
    #[inline]
    #[must_use]
    pub fn bases(&self) -> &[ConfigTypeId] {
        &self.bases
    }

    /// Ancestor order
    #[inline]
    #[must_use]
    pub fn linearization(&self) -> &Arc<Linearization> {
        &self.linearization
    }

    /// Whether this type is `ancestor` or derives from it
    #[inline]
    #[must_use]
    pub fn is_subtype_of(&self, ancestor: ConfigTypeId) -> bool {
        self.linearization.contains(ancestor)
    }

    /// Effective fields in record order
    pub fn fields(&self) -> impl ExactSizeIterator<Item = &EffectiveField> {
        self.fields.values()
    }

    /// Effective field by name
    #[inline]
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&EffectiveField> {
        self.fields.get(name)
    }

    /// Position of a field in record order
    #[inline]
    #[must_use]
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.get_index_of(name)
    }

    /// Effective field at a position
    #[inline]
    #[must_use]
    pub fn field_at(&self, index: usize) -> Option<&EffectiveField> {
        self.fields.get_index(index).map(|(_, f)| f)
    }

    /// Number of effective fields
    #[inline]
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Field names in record order
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Record builder for this type
    #[must_use]
    pub fn record_builder(self: &Arc<Self>) -> RecordBuilder {
        Record::builder(self)
    }
}
