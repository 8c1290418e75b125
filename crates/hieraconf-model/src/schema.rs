//! Record schemas and the schema builder
//!
//! A [`RecordSchema`] is the declaration side of a config type: its name,
//! its direct bases (left to right) and the fields it declares itself.
//! Schemas are composed with [`SchemaBuilder`] before anything touches the
//! registry, so field injection is an explicit step instead of a side effect
//! of class definition.

use crate::error::ModelError;
use crate::value::{FieldDecl, FieldDefault, FieldType, Value};
use std::collections::HashSet;

/// Declaration of a config record type
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSchema {
    name: String,
    bases: Vec<String>,
    fields: Vec<FieldDecl>,
    inherit_as_none: bool,
}

impl RecordSchema {
    /// Start building a schema
    #[must_use]
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(name)
    }

    /// Type name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Direct bases, in declaration order
    #[inline]
    #[must_use]
    pub fn bases(&self) -> &[String] {
        &self.bases
    }

    /// Fields declared on this type itself
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &[FieldDecl] {
        &self.fields
    }

    /// Whether inherited concrete defaults are redeclared as placeholders
    #[inline]
    #[must_use]
    pub fn inherit_as_none(&self) -> bool {
        self.inherit_as_none
    }

    /// Names of record types this schema references (bases and nested fields)
    pub fn referenced_types(&self) -> impl Iterator<Item = &str> {
        self.bases
            .iter()
            .map(String::as_str)
            .chain(self.fields.iter().filter_map(|f| f.ty.record_name()))
    }
}

/// Builder for [`RecordSchema`]
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    name: String,
    bases: Vec<String>,
    fields: Vec<FieldDecl>,
    inherit_as_none: bool,
}

impl SchemaBuilder {
    /// New builder for a type name
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bases: Vec::new(),
            fields: Vec::new(),
            inherit_as_none: false,
        }
    }

    /// Add a direct base type
    #[must_use]
    pub fn extends(mut self, base: impl Into<String>) -> Self {
        self.bases.push(base.into());
        self
    }

    /// Declare a field with a concrete default
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, ty: FieldType, default: impl Into<Value>) -> Self {
        self.fields.push(FieldDecl::new(name, ty, default));
        self
    }

    /// Declare a field whose default is the placeholder
    #[must_use]
    pub fn placeholder_field(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        self.fields.push(FieldDecl::placeholder(name, ty));
        self
    }

    /// Declare a nullable field with a placeholder default
    #[must_use]
    pub fn optional_field(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        self.fields.push(FieldDecl::placeholder(name, ty.optional()));
        self
    }

    /// Declare a nested record field defaulting to the nested type's defaults
    #[must_use]
    pub fn nested(mut self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.fields.push(FieldDecl::nested(name, type_name));
        self
    }

    /// Declare a prepared field
    #[must_use]
    pub fn decl(mut self, decl: FieldDecl) -> Self {
        self.fields.push(decl);
        self
    }

    /// Redeclare inherited concrete defaults as placeholders on registration
    #[must_use]
    pub fn inherit_as_none(mut self) -> Self {
        self.inherit_as_none = true;
        self
    }

    /// Add one nested record field per config type, named by snake-casing
    /// the type name (`PathPlanningConfig` → `path_planning_config`)
    #[must_use]
    pub fn inject_nested_configs<S: AsRef<str>>(mut self, type_names: &[S]) -> Self {
        for type_name in type_names {
            let type_name = type_name.as_ref();
            self.fields
                .push(FieldDecl::nested(snake_case(type_name), type_name));
        }
        self
    }

    /// Validate and finish the schema
    ///
    /// # Errors
    /// Returns [`ModelError::InvalidSchema`] for an empty name, duplicate
    /// field or base names, or a nested default on a non-record field, and
    /// [`ModelError::TypeMismatch`] for a default the field type rejects.
    pub fn build(self) -> Result<RecordSchema, ModelError> {
        if self.name.trim().is_empty() {
            return Err(ModelError::invalid_schema(&self.name, "type name cannot be empty"));
        }

        let mut seen_bases = HashSet::new();
        for base in &self.bases {
            if !seen_bases.insert(base.as_str()) {
                return Err(ModelError::invalid_schema(
                    &self.name,
                    format!("duplicate base '{base}'"),
                ));
            }
        }

        let mut seen_fields = HashSet::new();
        for decl in &self.fields {
            if !seen_fields.insert(decl.name.as_str()) {
                return Err(ModelError::invalid_schema(
                    &self.name,
                    format!("duplicate field '{}'", decl.name),
                ));
            }
            match &decl.default {
                FieldDefault::Value(v) if !decl.ty.accepts_shape(v) => {
                    return Err(ModelError::TypeMismatch {
                        field: format!("{}.{}", self.name, decl.name),
                        expected: format!("{:?}", decl.ty),
                        actual: v.kind().to_string(),
                    });
                }
                FieldDefault::Nested if decl.ty.record_name().is_none() => {
                    return Err(ModelError::invalid_schema(
                        &self.name,
                        format!("field '{}' has a nested default but is not a record", decl.name),
                    ));
                }
                _ => {}
            }
        }

        Ok(RecordSchema {
            name: self.name,
            bases: self.bases,
            fields: self.fields,
            inherit_as_none: self.inherit_as_none,
        })
    }
}

/// Convert a `CamelCase` type name into a `snake_case` field name
#[must_use]
pub fn snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if i > 0 && c.is_uppercase() {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            let boundary = (next_lower && prev != '_')
                || prev.is_lowercase()
                || prev.is_ascii_digit();
            if boundary {
                out.push('_');
            }
        }
        out.extend(c.to_lowercase());
    }
    out
}
