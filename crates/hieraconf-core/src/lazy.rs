//! Lazy config instances
//!
//! A [`LazyConfig`] holds only the values its creator supplied. Every other
//! field is looked up through the dual-axis resolver on each access, against
//! whatever scopes are live at that moment. [`LazyConfig::materialize`]
//! takes one snapshot and freezes every field into a concrete record.

use crate::env::ConfigEnv;
use crate::error::{CoreError, CoreResult};
use crate::factory::{LazyField, LazyType};
use crate::resolver::{Resolution, ValueSource};
use hieraconf_model::{ConfigTypeId, FieldDefault, ModelError, Record, Value};
use hieraconf_scope::{AvailableConfigs, ScopeGuard};
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// Value supplied explicitly for one field
#[derive(Debug, Clone, PartialEq)]
pub enum Explicit {
    /// Plain value
    Value(Value),
    /// Nested lazy config for a record field
    Nested(LazyConfig),
}

/// Which values of a concrete record survive conversion to a lazy config
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Preserve {
    /// Every concrete value becomes explicit
    #[default]
    All,
    /// Values equal to the declared default are dropped so they inherit
    NonDefault,
}

/// Lazy instance of a config type
#[derive(Clone)]
pub struct LazyConfig {
    env: ConfigEnv,
    lazy_type: Arc<LazyType>,
    explicit: Arc<IndexMap<String, Explicit>>,
}

impl LazyConfig {
    pub(crate) fn new(env: ConfigEnv, lazy_type: Arc<LazyType>, explicit: IndexMap<String, Explicit>) -> Self {
        Self {
            env,
            lazy_type,
            explicit: Arc::new(explicit),
        }
    }

    pub(crate) fn from_record(env: &ConfigEnv, record: &Record, preserve: Preserve) -> CoreResult<Self> {
        let lazy_type = env.make_lazy(record.type_id())?;
        let mut explicit = IndexMap::new();

        for (field, value) in lazy_type.fields().zip(record.values()) {
            let Some(value) = value else {
                continue;
            };
            if let (Some(declared), Value::Record(inner)) = (field.nested(), value) {
                let nested = Self::from_record(env, inner, preserve)?;
                let keep = preserve == Preserve::All
                    || !nested.explicit.is_empty()
                    || nested.concrete_type() != declared.concrete_id();
                if keep {
                    explicit.insert(field.name().to_string(), Explicit::Nested(nested));
                }
                continue;
            }
            let keep = match preserve {
                Preserve::All => true,
                Preserve::NonDefault => field.declared().default_value().as_ref() != Some(value),
            };
            if keep {
                explicit.insert(field.name().to_string(), Explicit::Value(value.clone()));
            }
        }

        Ok(Self::new(env.clone(), lazy_type, explicit))
    }

    /// Lazy type of this instance
    #[inline]
    #[must_use]
    pub fn lazy_type(&self) -> &Arc<LazyType> {
        &self.lazy_type
    }

    /// Lazy type name
    #[inline]
    #[must_use]
    pub fn type_name(&self) -> &str {
        self.lazy_type.name()
    }

    /// Wrapped concrete type
    #[inline]
    #[must_use]
    pub fn concrete_type(&self) -> ConfigTypeId {
        self.lazy_type.concrete_id()
    }

    /// Environment the instance resolves in
    #[inline]
    #[must_use]
    pub fn env(&self) -> &ConfigEnv {
        &self.env
    }

    fn lazy_field(&self, field: &str) -> CoreResult<&LazyField> {
        self.lazy_type
            .field(field)
            .ok_or_else(|| ModelError::unknown_field(self.lazy_type.concrete().name(), field).into())
    }

    /// Resolve a field against the scopes live right now
    ///
    /// # Errors
    /// [`ModelError::UnknownField`] if the type has no such field.
    pub fn get(&self, field: &str) -> CoreResult<Resolution> {
        self.get_in(field, &self.env.flatten_active_scopes())
    }

    /// Resolve a field against a given snapshot
    ///
    /// # Errors
    /// [`ModelError::UnknownField`] if the type has no such field.
    pub fn get_in(&self, field: &str, available: &AvailableConfigs) -> CoreResult<Resolution> {
        self.resolve_field(self.lazy_field(field)?, available)
    }

    /// Nested fields left at their default resolve to a fresh lazy of the
    /// nested type, materialized in the same snapshot
    fn resolve_field(&self, field: &LazyField, available: &AvailableConfigs) -> CoreResult<Resolution> {
        let explicit = match (self.explicit.get(field.name()), field.nested()) {
            (Some(Explicit::Nested(nested)), _) => {
                return Ok(Resolution::Resolved {
                    value: Value::Record(nested.materialize_in(available)?),
                    source: ValueSource::Explicit,
                });
            }
            (None, Some(nested_type)) if *field.declared().default() == FieldDefault::Nested => {
                let fresh = Self::new(self.env.clone(), Arc::clone(nested_type), IndexMap::new());
                return Ok(Resolution::Resolved {
                    value: Value::Record(fresh.materialize_in(available)?),
                    source: ValueSource::Default {
                        declared_by: field.declared().declared_by(),
                    },
                });
            }
            (Some(Explicit::Value(value)), _) => Some(value),
            (None, _) => None,
        };
        self.env
            .resolver()
            .resolve(self.concrete_type(), field.name(), explicit, available)
    }

    /// Resolved value of a field, `None` when unset
    ///
    /// # Errors
    /// [`ModelError::UnknownField`] if the type has no such field.
    pub fn value(&self, field: &str) -> CoreResult<Option<Value>> {
        Ok(self.get(field)?.into_value())
    }

    /// Lazy config of a nested record field
    ///
    /// The explicit nested instance if one was supplied, otherwise an empty
    /// instance of the field's lazy type, which resolves on its own.
    ///
    /// # Errors
    /// - [`ModelError::UnknownField`] if the type has no such field
    /// - [`CoreError::NotNested`] if the field does not hold a record
    pub fn nested(&self, field: &str) -> CoreResult<LazyConfig> {
        let lazy_field = self.lazy_field(field)?;
        let nested_type = lazy_field
            .nested()
            .ok_or_else(|| CoreError::not_nested(self.lazy_type.concrete().name(), field))?;
        match self.explicit.get(field) {
            Some(Explicit::Nested(nested)) => Ok(nested.clone()),
            _ => Ok(Self::new(self.env.clone(), Arc::clone(nested_type), IndexMap::new())),
        }
    }

    /// Explicit value of a field
    #[must_use]
    pub fn explicit(&self, field: &str) -> Option<&Explicit> {
        self.explicit.get(field)
    }

    /// Whether a field was supplied explicitly
    #[must_use]
    pub fn is_explicit(&self, field: &str) -> bool {
        self.explicit.contains_key(field)
    }

    /// Explicitly supplied fields, in the order they were set
    pub fn explicit_fields(&self) -> impl Iterator<Item = &str> {
        self.explicit.keys().map(String::as_str)
    }

    /// Copy with one more explicit value
    ///
    /// # Errors
    /// Same as [`LazyBuilder::set`].
    pub fn with_override(&self, field: &str, value: impl Into<Value>) -> CoreResult<LazyConfig> {
        let entry = explicit_entry(&self.env, &self.lazy_type, field, value.into())?;
        let mut explicit = (*self.explicit).clone();
        explicit.insert(field.to_string(), entry);
        Ok(Self::new(self.env.clone(), Arc::clone(&self.lazy_type), explicit))
    }

    /// Resolve every field once and freeze the result
    ///
    /// # Errors
    /// Propagates resolution and record validation errors.
    pub fn materialize(&self) -> CoreResult<Record> {
        self.materialize_in(&self.env.flatten_active_scopes())
    }

    /// Like [`LazyConfig::materialize`], against a given snapshot
    ///
    /// # Errors
    /// Propagates resolution and record validation errors.
    pub fn materialize_in(&self, available: &AvailableConfigs) -> CoreResult<Record> {
        let mut values = Vec::with_capacity(self.lazy_type.field_count());
        for field in self.lazy_type.fields() {
            values.push(self.resolve_field(field, available)?.into_value());
        }
        Ok(Record::from_values(self.lazy_type.concrete(), values)?)
    }

    /// Concrete record holding only the explicit values
    ///
    /// # Errors
    /// Propagates record validation errors.
    pub fn to_base_record(&self) -> CoreResult<Record> {
        let mut values = Vec::with_capacity(self.lazy_type.field_count());
        for field in self.lazy_type.field_names() {
            let value = match self.explicit.get(field) {
                Some(Explicit::Value(value)) => Some(value.clone()),
                Some(Explicit::Nested(nested)) => Some(Value::Record(nested.to_base_record()?)),
                None => None,
            };
            values.push(value);
        }
        Ok(Record::from_values(self.lazy_type.concrete(), values)?)
    }

    /// Materialize and serialize to JSON
    ///
    /// # Errors
    /// Propagates materialization errors; [`CoreError::Serialization`] if
    /// the record cannot be encoded.
    pub fn to_json(&self) -> CoreResult<serde_json::Value> {
        let record = self.materialize()?;
        serde_json::to_value(&record).map_err(|e| CoreError::Serialization(e.to_string()))
    }

    /// Push the explicit values as a scope on the current context
    ///
    /// # Errors
    /// Propagates record validation errors, and refuses inside a tokio task
    /// without its own stack.
    pub fn enter_scope(&self) -> CoreResult<ScopeGuard> {
        Ok(hieraconf_scope::enter_scope(self.to_base_record()?)?)
    }
}

impl PartialEq for LazyConfig {
    fn eq(&self, other: &Self) -> bool {
        self.lazy_type.id() == other.lazy_type.id() && self.explicit == other.explicit
    }
}

impl fmt::Debug for LazyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(self.lazy_type.name());
        for (name, value) in self.explicit.iter() {
            s.field(name, value);
        }
        s.finish_non_exhaustive()
    }
}

fn explicit_entry(env: &ConfigEnv, lazy_type: &LazyType, field: &str, value: Value) -> CoreResult<Explicit> {
    let lazy_field = lazy_type
        .field(field)
        .ok_or_else(|| ModelError::unknown_field(lazy_type.concrete().name(), field))?;

    if let (Some(_), Value::Record(record)) = (lazy_field.nested(), &value) {
        let nested = LazyConfig::from_record(env, record, Preserve::All)?;
        check_nested(env, lazy_type, lazy_field, &nested)?;
        return Ok(Explicit::Nested(nested));
    }

    if lazy_field.declared().accepts(&value) {
        Ok(Explicit::Value(value))
    } else {
        Err(ModelError::TypeMismatch {
            field: format!("{}.{field}", lazy_type.concrete().name()),
            expected: format!("{:?}", lazy_field.declared().ty()),
            actual: value.kind().to_string(),
        }
        .into())
    }
}

fn check_nested(env: &ConfigEnv, owner: &LazyType, field: &LazyField, nested: &LazyConfig) -> CoreResult<()> {
    let expected = field
        .nested()
        .ok_or_else(|| CoreError::not_nested(owner.concrete().name(), field.name()))?;
    if !nested.env().registry().same_as(env.registry()) {
        return Err(CoreError::ForeignType {
            type_name: nested.lazy_type().concrete().name().to_string(),
        });
    }
    if !nested.lazy_type().concrete().is_subtype_of(expected.concrete_id()) {
        return Err(CoreError::LazyTypeMismatch {
            field: format!("{}.{}", owner.concrete().name(), field.name()),
            expected: expected.concrete().name().to_string(),
            actual: nested.lazy_type().concrete().name().to_string(),
        });
    }
    Ok(())
}

/// Builds a [`LazyConfig`] from explicit values
///
/// Errors are deferred to [`LazyBuilder::build`]; the first one wins.
#[derive(Debug)]
#[must_use = "call build() to get the lazy config"]
pub struct LazyBuilder {
    env: ConfigEnv,
    lazy_type: Arc<LazyType>,
    explicit: IndexMap<String, Explicit>,
    error: Option<CoreError>,
}

impl LazyBuilder {
    pub(crate) fn new(env: ConfigEnv, lazy_type: Arc<LazyType>) -> Self {
        Self {
            env,
            lazy_type,
            explicit: IndexMap::new(),
            error: None,
        }
    }

    /// Set a field explicitly
    ///
    /// A record value for a nested field becomes a nested lazy config that
    /// keeps every value of the record.
    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        if self.error.is_none() {
            match explicit_entry(&self.env, &self.lazy_type, field, value.into()) {
                Ok(entry) => {
                    self.explicit.insert(field.to_string(), entry);
                }
                Err(e) => self.error = Some(e),
            }
        }
        self
    }

    /// Set a nested field to a lazy config
    pub fn set_nested(mut self, field: &str, nested: LazyConfig) -> Self {
        if self.error.is_none() {
            let checked: CoreResult<()> = self
                .lazy_type
                .field(field)
                .ok_or_else(|| ModelError::unknown_field(self.lazy_type.concrete().name(), field).into())
                .and_then(|f| check_nested(&self.env, &self.lazy_type, f, &nested));
            match checked {
                Ok(()) => {
                    self.explicit.insert(field.to_string(), Explicit::Nested(nested));
                }
                Err(e) => self.error = Some(e),
            }
        }
        self
    }

    /// Finish the lazy config
    ///
    /// # Errors
    /// The first error recorded by `set` or `set_nested`.
    pub fn build(self) -> CoreResult<LazyConfig> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(LazyConfig::new(self.env, self.lazy_type, self.explicit)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hieraconf_test_utils::{nested_hierarchy, sparse, step_hierarchy, with_defaults};
    use pretty_assertions::assert_eq;

    #[test]
    fn access_re_resolves_against_current_scopes() {
        let h = step_hierarchy();
        let env = ConfigEnv::new(h.registry.clone());
        let step = env.lazy(h.step.id()).unwrap();

        assert_eq!(step.value("timeout").unwrap(), Some(Value::Int(30)));
        {
            let _g = env
                .enter_scope(sparse(&h.global, &[("timeout", Value::Int(45))]))
                .unwrap();
            assert_eq!(step.value("timeout").unwrap(), Some(Value::Int(45)));
        }
        assert_eq!(step.value("timeout").unwrap(), Some(Value::Int(30)));
    }

    #[test]
    fn builder_records_only_explicit_fields() {
        let h = step_hierarchy();
        let env = ConfigEnv::new(h.registry.clone());
        let step = env
            .lazy_builder(h.step.id())
            .unwrap()
            .set("timeout", 10)
            .build()
            .unwrap();
        assert!(step.is_explicit("timeout"));
        assert!(!step.is_explicit("retries"));
        assert_eq!(step.explicit_fields().collect::<Vec<_>>(), ["timeout"]);
        assert_eq!(step.get("timeout").unwrap().source(), Some(ValueSource::Explicit));
    }

    #[test]
    fn builder_rejects_bad_values() {
        let h = step_hierarchy();
        let env = ConfigEnv::new(h.registry.clone());
        let err = env
            .lazy_builder(h.step.id())
            .unwrap()
            .set("timeout", "soon")
            .set("retries", 2)
            .build()
            .unwrap_err();
        assert!(matches!(err, CoreError::Model(ModelError::TypeMismatch { .. })));

        let err = env
            .lazy_builder(h.step.id())
            .unwrap()
            .set("nope", 1)
            .build()
            .unwrap_err();
        assert!(matches!(err, CoreError::Model(ModelError::UnknownField { .. })));
    }

    #[test]
    fn with_override_leaves_original_untouched() {
        let h = step_hierarchy();
        let env = ConfigEnv::new(h.registry.clone());
        let base = env.lazy(h.step.id()).unwrap();
        let overridden = base.with_override("retries", 9).unwrap();
        assert_eq!(overridden.value("retries").unwrap(), Some(Value::Int(9)));
        assert_eq!(base.value("retries").unwrap(), Some(Value::Int(3)));
        assert_ne!(base, overridden);
    }

    #[test]
    fn materialize_freezes_current_values() {
        let h = step_hierarchy();
        let env = ConfigEnv::new(h.registry.clone());
        let step = env
            .lazy_builder(h.step.id())
            .unwrap()
            .set("step_name", "load")
            .build()
            .unwrap();

        let frozen = {
            let _g = env
                .enter_scope(sparse(&h.pipeline, &[("batch_size", Value::Int(64))]))
                .unwrap();
            step.materialize().unwrap()
        };
        assert_eq!(frozen.type_id(), h.step.id());
        assert_eq!(frozen.get("batch_size").unwrap(), Some(&Value::Int(64)));
        assert_eq!(frozen.get("step_name").unwrap(), Some(&Value::from("load")));
        assert_eq!(frozen.get("timeout").unwrap(), Some(&Value::Int(30)));
        assert_eq!(frozen.get("label").unwrap(), None);
        // The lazy instance keeps following the context
        assert_eq!(step.value("batch_size").unwrap(), Some(Value::Int(8)));
    }

    #[test]
    fn to_base_record_keeps_placeholders() {
        let h = step_hierarchy();
        let env = ConfigEnv::new(h.registry.clone());
        let step = env
            .lazy_builder(h.step.id())
            .unwrap()
            .set("timeout", 10)
            .build()
            .unwrap();
        let base = step.to_base_record().unwrap();
        assert_eq!(base.get("timeout").unwrap(), Some(&Value::Int(10)));
        assert_eq!(base.concrete_fields().count(), 1);
    }

    #[test]
    fn nested_fields_resolve_by_their_own_type() {
        let h = nested_hierarchy();
        let env = ConfigEnv::new(h.registry.clone());
        let root = env.lazy(h.root.id()).unwrap();
        let app = with_defaults(&h.root, &[]).replace(
            "path_planning_config",
            Some(Value::Record(with_defaults(
                &h.path_planning,
                &[("output_dir_suffix", "_processed".into())],
            ))),
        );
        let _g = env.enter_scope(app.unwrap()).unwrap();

        let path = root.nested("path_planning_config").unwrap();
        assert_eq!(path.concrete_type(), h.path_planning.id());
        assert_eq!(path.value("output_dir_suffix").unwrap(), Some(Value::from("_processed")));

        let frozen = root.materialize().unwrap();
        let nested = frozen.get("path_planning_config").unwrap().unwrap();
        assert_eq!(
            nested.as_record().unwrap().get("output_dir_suffix").unwrap(),
            Some(&Value::from("_processed"))
        );
        assert!(matches!(root.nested("num_workers"), Err(CoreError::NotNested { .. })));
    }

    #[test]
    fn get_and_materialize_agree_on_default_nested_fields() {
        let h = nested_hierarchy();
        let env = ConfigEnv::new(h.registry.clone());
        let root = env.lazy(h.root.id()).unwrap();
        let _outer = env
            .enter_scope(sparse(&h.path_planning, &[("output_dir_suffix", "_x".into())]))
            .unwrap();
        let app = Record::builder(&h.root)
            .set("path_planning_config", sparse(&h.path_planning, &[]))
            .build()
            .unwrap();
        let _inner = env.enter_scope(app).unwrap();

        let got = root.get("path_planning_config").unwrap();
        let frozen = root.materialize().unwrap();
        assert_eq!(got.value(), frozen.get("path_planning_config").unwrap());
        let path = got.value().and_then(Value::as_record).unwrap();
        assert!(path.is_concrete("output_dir_suffix"));
        assert_eq!(path.get("output_dir_suffix").unwrap(), Some(&Value::from("_x")));
        assert!(matches!(got.source(), Some(ValueSource::Default { .. })));
    }

    #[test]
    fn record_value_becomes_nested_lazy() {
        let h = nested_hierarchy();
        let env = ConfigEnv::new(h.registry.clone());
        let zarr = with_defaults(&h.zarr, &[("level", Value::Int(9))]);
        let root = env
            .lazy_builder(h.root.id())
            .unwrap()
            .set("zarr_config", zarr)
            .build()
            .unwrap();

        let Some(Explicit::Nested(nested)) = root.explicit("zarr_config") else {
            panic!("expected nested lazy");
        };
        assert!(nested.is_explicit("level"));
        assert!(nested.is_explicit("compression"));
        assert_eq!(root.nested("zarr_config").unwrap().value("level").unwrap(), Some(Value::Int(9)));
    }

    #[test]
    fn set_nested_checks_type() {
        let h = nested_hierarchy();
        let env = ConfigEnv::new(h.registry.clone());
        let materialization = env.lazy(h.materialization.id()).unwrap();
        let root = env
            .lazy_builder(h.root.id())
            .unwrap()
            .set_nested("path_planning_config", materialization)
            .build()
            .unwrap();
        assert_eq!(
            root.nested("path_planning_config").unwrap().concrete_type(),
            h.materialization.id()
        );

        let zarr = env.lazy(h.zarr.id()).unwrap();
        let err = env
            .lazy_builder(h.root.id())
            .unwrap()
            .set_nested("path_planning_config", zarr)
            .build()
            .unwrap_err();
        assert!(matches!(err, CoreError::LazyTypeMismatch { .. }));
    }

    #[test]
    fn set_nested_rejects_foreign_env() {
        let h = nested_hierarchy();
        let other = nested_hierarchy();
        let env = ConfigEnv::new(h.registry.clone());
        let foreign = ConfigEnv::new(other.registry.clone()).lazy(other.zarr.id()).unwrap();
        let err = env
            .lazy_builder(h.root.id())
            .unwrap()
            .set_nested("zarr_config", foreign)
            .build()
            .unwrap_err();
        assert!(matches!(err, CoreError::ForeignType { .. }));
    }

    #[test]
    fn from_record_non_default_keeps_only_changes() {
        let h = step_hierarchy();
        let env = ConfigEnv::new(h.registry.clone());
        let record = with_defaults(&h.global, &[("retries", Value::Int(5))]);

        let all = env.lazy_from_record(&record, Preserve::All).unwrap();
        assert!(all.is_explicit("timeout"));
        let changed = env.lazy_from_record(&record, Preserve::NonDefault).unwrap();
        assert_eq!(changed.explicit_fields().collect::<Vec<_>>(), ["retries"]);

        // Default-equal fields now follow the context
        let _g = env
            .enter_scope(sparse(&h.global, &[("timeout", Value::Int(90))]))
            .unwrap();
        assert_eq!(changed.value("timeout").unwrap(), Some(Value::Int(90)));
        assert_eq!(all.value("timeout").unwrap(), Some(Value::Int(30)));
    }

    #[test]
    fn to_json_materializes() {
        let h = step_hierarchy();
        let env = ConfigEnv::new(h.registry.clone());
        let global = env
            .lazy_builder(h.global.id())
            .unwrap()
            .set("label", "nightly")
            .build()
            .unwrap();
        assert_eq!(
            global.to_json().unwrap(),
            serde_json::json!({"timeout": 30, "retries": 3, "label": "nightly"})
        );
    }

    #[test]
    fn lazy_enter_scope_pushes_explicit_values() {
        let h = step_hierarchy();
        let env = ConfigEnv::new(h.registry.clone());
        let pipeline = env
            .lazy_builder(h.pipeline.id())
            .unwrap()
            .set("batch_size", 32)
            .build()
            .unwrap();
        let step = env.lazy(h.step.id()).unwrap();
        {
            let _g = pipeline.enter_scope().unwrap();
            assert_eq!(step.value("batch_size").unwrap(), Some(Value::Int(32)));
            // Pipeline's placeholders do not hide the retained default
            assert_eq!(step.value("timeout").unwrap(), Some(Value::Int(30)));
        }
        assert_eq!(step.value("batch_size").unwrap(), Some(Value::Int(8)));
    }
}
