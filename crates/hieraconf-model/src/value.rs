//! Field values and declared field types

use crate::record::Record;
use serde::Serialize;
use std::path::PathBuf;

/// A concrete field value
///
/// There is deliberately no null variant: a field slot holding `None`
/// is the placeholder that resolution looks through.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Boolean flag
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Floating point number
    Float(f64),
    /// UTF-8 string
    Str(String),
    /// Filesystem path
    Path(PathBuf),
    /// Enum variant name
    Enum(String),
    /// Homogeneous list
    List(Vec<Value>),
    /// Nested config record
    Record(Record),
}

impl Value {
    /// Short kind name used in diagnostics
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::Path(_) => "path",
            Self::Enum(_) => "enum",
            Self::List(_) => "list",
            Self::Record(_) => "record",
        }
    }

    /// Integer payload
    #[inline]
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Float payload (ints widen)
    #[inline]
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Bool payload
    #[inline]
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// String payload (also enum variant names)
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) | Self::Enum(v) => Some(v),
            _ => None,
        }
    }

    /// Nested record payload
    #[inline]
    #[must_use]
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Record(r) => Some(r),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<PathBuf> for Value {
    fn from(v: PathBuf) -> Self {
        Self::Path(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::List(v)
    }
}

impl From<Record> for Value {
    fn from(v: Record) -> Self {
        Self::Record(v)
    }
}

/// Declared semantic type of a field
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum FieldType {
    /// Boolean
    Bool,
    /// Integer
    Int,
    /// Float (accepts ints)
    Float,
    /// String
    Str,
    /// Path
    Path,
    /// Closed set of variant names
    Enum {
        /// Enum type name
        name: String,
        /// Allowed variants
        variants: Vec<String>,
    },
    /// List of one element type
    List(Box<FieldType>),
    /// Nested record, by registered type name
    Record(String),
    /// Explicitly nullable field
    Optional(Box<FieldType>),
}

impl FieldType {
    /// Enum type helper
    #[must_use]
    pub fn enumeration(name: impl Into<String>, variants: &[&str]) -> Self {
        Self::Enum {
            name: name.into(),
            variants: variants.iter().map(|v| (*v).to_string()).collect(),
        }
    }

    /// Nested record helper
    #[must_use]
    pub fn record(name: impl Into<String>) -> Self {
        Self::Record(name.into())
    }

    /// Wrap in `Optional` unless already optional
    #[must_use]
    pub fn optional(self) -> Self {
        match self {
            Self::Optional(_) => self,
            other => Self::Optional(Box::new(other)),
        }
    }

    /// Whether the type is explicitly nullable
    #[inline]
    #[must_use]
    pub fn is_optional(&self) -> bool {
        matches!(self, Self::Optional(_))
    }

    /// Type with any `Optional` wrapper removed
    #[must_use]
    pub fn unwrap_optional(&self) -> &FieldType {
        match self {
            Self::Optional(inner) => inner.unwrap_optional(),
            other => other,
        }
    }

    /// Nested record type name, looking through `Optional`
    #[must_use]
    pub fn record_name(&self) -> Option<&str> {
        match self.unwrap_optional() {
            Self::Record(name) => Some(name),
            _ => None,
        }
    }

    /// Shape check for non-record values
    ///
    /// Record values are only checked for being records here; subtype
    /// compatibility needs the registered descriptor.
    #[must_use]
    pub fn accepts_shape(&self, value: &Value) -> bool {
        match (self.unwrap_optional(), value) {
            (Self::Bool, Value::Bool(_))
            | (Self::Int, Value::Int(_))
            | (Self::Float, Value::Float(_) | Value::Int(_))
            | (Self::Str, Value::Str(_))
            | (Self::Path, Value::Path(_) | Value::Str(_))
            | (Self::Record(_), Value::Record(_)) => true,
            (Self::Enum { variants, .. }, Value::Enum(v) | Value::Str(v)) => variants.contains(v),
            (Self::List(elem), Value::List(items)) => items.iter().all(|i| elem.accepts_shape(i)),
            _ => false,
        }
    }
}

/// Static default declared on a field
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldDefault {
    /// No concrete default; the field inherits
    #[default]
    Placeholder,
    /// Concrete default value
    Value(Value),
    /// Default-constructed instance of the nested record type
    Nested,
}

impl FieldDefault {
    /// Whether the default carries a concrete value
    #[inline]
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder)
    }

    /// Concrete default value, if any
    #[inline]
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }
}

/// Declaration of one field on a record schema
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    /// Field name
    pub name: String,
    /// Declared type
    pub ty: FieldType,
    /// Static default
    pub default: FieldDefault,
}

impl FieldDecl {
    /// Field with a concrete default
    #[must_use]
    pub fn new(name: impl Into<String>, ty: FieldType, default: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            ty,
            default: FieldDefault::Value(default.into()),
        }
    }

    /// Field whose default is the placeholder
    #[must_use]
    pub fn placeholder(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            default: FieldDefault::Placeholder,
        }
    }

    /// Nested record field defaulting to the nested type's default instance
    #[must_use]
    pub fn nested(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: FieldType::Record(type_name.into()),
            default: FieldDefault::Nested,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_accepts_int() {
        assert!(FieldType::Float.accepts_shape(&Value::Int(3)));
        assert!(!FieldType::Int.accepts_shape(&Value::Float(3.0)));
    }

    #[test]
    fn enum_checks_variants() {
        let ty = FieldType::enumeration("Mode", &["include", "exclude"]);
        assert!(ty.accepts_shape(&Value::Enum("include".into())));
        assert!(!ty.accepts_shape(&Value::Enum("other".into())));
    }

    #[test]
    fn optional_is_transparent() {
        let ty = FieldType::Int.optional().optional();
        assert!(ty.is_optional());
        assert_eq!(ty.unwrap_optional(), &FieldType::Int);
        assert!(ty.accepts_shape(&Value::Int(1)));
    }

    #[test]
    fn list_checks_elements() {
        let ty = FieldType::List(Box::new(FieldType::Str));
        assert!(ty.accepts_shape(&Value::List(vec!["a".into(), "b".into()])));
        assert!(!ty.accepts_shape(&Value::List(vec![Value::Int(1)])));
    }

    #[test]
    fn record_name_looks_through_optional() {
        let ty = FieldType::record("ZarrConfig").optional();
        assert_eq!(ty.record_name(), Some("ZarrConfig"));
        assert_eq!(FieldType::Int.record_name(), None);
    }

    #[test]
    fn value_conversions() {
        assert_eq!(Value::from(30), Value::Int(30));
        assert_eq!(Value::from("x").as_str(), Some("x"));
        assert_eq!(Value::Int(2).as_float(), Some(2.0));
        assert_eq!(Value::Bool(true).kind(), "bool");
    }
}
