//! Config record instances
//!
//! A [`Record`] is an immutable instance of a registered type: one optional
//! value slot per effective field, in descriptor order. `None` is the
//! placeholder. Updates go through [`Record::replace`], which returns a new
//! record and shares nothing mutable with the old one.

use crate::descriptor::TypeDescriptor;
use crate::error::{ModelError, ModelResult};
use crate::ids::ConfigTypeId;
use crate::value::Value;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;
use std::sync::Arc;

/// Immutable instance of a config type
#[derive(Clone)]
pub struct Record {
    descriptor: Arc<TypeDescriptor>,
    values: Arc<[Option<Value>]>,
}

impl Record {
    /// Builder that fills unset fields from their defaults
    #[must_use]
    pub fn builder(descriptor: &Arc<TypeDescriptor>) -> RecordBuilder {
        RecordBuilder::new(descriptor)
    }

    /// Instance with every field at its static default
    #[must_use]
    pub fn defaults(descriptor: &Arc<TypeDescriptor>) -> Self {
        let values = descriptor
            .fields()
            .map(crate::descriptor::EffectiveField::default_value)
            .collect::<Vec<_>>();
        Self {
            descriptor: Arc::clone(descriptor),
            values: values.into(),
        }
    }

    /// Instance from raw slots in descriptor order
    ///
    /// # Errors
    /// Returns [`ModelError::InvalidSchema`] when the slot count is wrong and
    /// [`ModelError::TypeMismatch`] when a value does not fit its field.
    pub fn from_values(descriptor: &Arc<TypeDescriptor>, values: Vec<Option<Value>>) -> ModelResult<Self> {
        if values.len() != descriptor.field_count() {
            return Err(ModelError::invalid_schema(
                descriptor.name(),
                format!(
                    "expected {} field values, got {}",
                    descriptor.field_count(),
                    values.len()
                ),
            ));
        }
        for (field, value) in descriptor.fields().zip(&values) {
            if let Some(value) = value {
                check_value(descriptor, field.name(), value)?;
            }
        }
        Ok(Self {
            descriptor: Arc::clone(descriptor),
            values: values.into(),
        })
    }

    /// Type id
    #[inline]
    #[must_use]
    pub fn type_id(&self) -> ConfigTypeId {
        self.descriptor.id()
    }

    /// Type name
    #[inline]
    #[must_use]
    pub fn type_name(&self) -> &str {
        self.descriptor.name()
    }

    /// Descriptor of the record's type
    #[inline]
    #[must_use]
    pub fn descriptor(&self) -> &Arc<TypeDescriptor> {
        &self.descriptor
    }

    /// Raw value of a field, `None` for the placeholder
    ///
    /// # Errors
    /// Returns [`ModelError::UnknownField`] if the type has no such field.
    pub fn get(&self, field: &str) -> ModelResult<Option<&Value>> {
        let index = self
            .descriptor
            .field_index(field)
            .ok_or_else(|| ModelError::unknown_field(self.type_name(), field))?;
        Ok(self.values[index].as_ref())
    }

    /// Raw value at a descriptor position
    #[inline]
    #[must_use]
    pub fn value_at(&self, index: usize) -> Option<&Value> {
        self.values.get(index).and_then(Option::as_ref)
    }

    /// Whether a field holds a concrete value (unknown fields are not)
    #[must_use]
    pub fn is_concrete(&self, field: &str) -> bool {
        matches!(self.get(field), Ok(Some(_)))
    }

    /// All slots in descriptor order
    #[inline]
    #[must_use]
    pub fn values(&self) -> &[Option<Value>] {
        &self.values
    }

    /// `(field, value)` pairs in descriptor order
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&Value>)> {
        self.descriptor
            .field_names()
            .zip(self.values.iter().map(Option::as_ref))
    }

    /// Fields holding a concrete value
    pub fn concrete_fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.iter().filter_map(|(name, value)| value.map(|v| (name, v)))
    }

    /// Concrete values that are themselves records
    pub fn nested_records(&self) -> impl Iterator<Item = &Record> {
        self.values
            .iter()
            .filter_map(|v| v.as_ref().and_then(Value::as_record))
    }

    /// Copy with one field replaced
    ///
    /// # Errors
    /// Returns [`ModelError::UnknownField`] or [`ModelError::TypeMismatch`].
    pub fn replace(&self, field: &str, value: Option<Value>) -> ModelResult<Self> {
        let index = self
            .descriptor
            .field_index(field)
            .ok_or_else(|| ModelError::unknown_field(self.type_name(), field))?;
        if let Some(value) = &value {
            check_value(&self.descriptor, field, value)?;
        }
        let mut values = self.values.to_vec();
        values[index] = value;
        Ok(Self {
            descriptor: Arc::clone(&self.descriptor),
            values: values.into(),
        })
    }
}

fn check_value(descriptor: &TypeDescriptor, field: &str, value: &Value) -> ModelResult<()> {
    let decl = descriptor
        .field(field)
        .ok_or_else(|| ModelError::unknown_field(descriptor.name(), field))?;
    if decl.accepts(value) {
        Ok(())
    } else {
        let actual = match value {
            Value::Record(r) => r.type_name().to_string(),
            other => other.kind().to_string(),
        };
        Err(ModelError::TypeMismatch {
            field: format!("{}.{field}", descriptor.name()),
            expected: format!("{:?}", decl.ty()),
            actual,
        })
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.type_id() == other.type_id() && self.values == other.values
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(self.type_name());
        for (name, value) in self.iter() {
            s.field(name, &value);
        }
        s.finish()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, &value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone)]
enum Slot {
    Unset,
    Placeholder,
    Value(Value),
}

/// Builder for [`Record`]
///
/// Errors are collected and reported by [`RecordBuilder::build`] so calls
/// chain without intermediate `?`.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    descriptor: Arc<TypeDescriptor>,
    slots: Vec<Slot>,
    error: Option<ModelError>,
}

impl RecordBuilder {
    /// New builder with every field unset
    #[must_use]
    pub fn new(descriptor: &Arc<TypeDescriptor>) -> Self {
        Self {
            descriptor: Arc::clone(descriptor),
            slots: vec![Slot::Unset; descriptor.field_count()],
            error: None,
        }
    }

    /// Set a concrete value
    #[must_use]
    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        if self.error.is_some() {
            return self;
        }
        match self.descriptor.field_index(field) {
            Some(index) => match check_value(&self.descriptor, field, &value) {
                Ok(()) => self.slots[index] = Slot::Value(value),
                Err(e) => self.error = Some(e),
            },
            None => self.error = Some(ModelError::unknown_field(self.descriptor.name(), field)),
        }
        self
    }

    /// Set a field to the placeholder regardless of its default
    #[must_use]
    pub fn placeholder(mut self, field: &str) -> Self {
        if self.error.is_some() {
            return self;
        }
        match self.descriptor.field_index(field) {
            Some(index) => self.slots[index] = Slot::Placeholder,
            None => self.error = Some(ModelError::unknown_field(self.descriptor.name(), field)),
        }
        self
    }

    /// Set every still-unset field to the placeholder
    #[must_use]
    pub fn placeholders_for_rest(mut self) -> Self {
        for slot in &mut self.slots {
            if matches!(slot, Slot::Unset) {
                *slot = Slot::Placeholder;
            }
        }
        self
    }

    /// Finish, filling unset fields from their static defaults
    ///
    /// # Errors
    /// Returns the first error recorded by [`RecordBuilder::set`] or
    /// [`RecordBuilder::placeholder`].
    pub fn build(self) -> ModelResult<Record> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let values = self
            .slots
            .into_iter()
            .zip(self.descriptor.fields())
            .map(|(slot, field)| match slot {
                Slot::Unset => field.default_value(),
                Slot::Placeholder => None,
                Slot::Value(v) => Some(v),
            })
            .collect::<Vec<_>>();
        Ok(Record {
            descriptor: self.descriptor,
            values: values.into(),
        })
    }
}
