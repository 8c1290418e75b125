//! Flattened scope snapshot
//!
//! [`AvailableConfigs`] answers "what does the live context say about type
//! T": one merged view per concrete type, built bottom-up from the global
//! defaults and then every stack entry from outermost to innermost. Within a
//! type the innermost concrete value of each field wins, and every value
//! remembers which layer supplied it.
//!
//! A scope entry also contributes the records nested in its fields, keyed by
//! their own type, so a `PathPlanningConfig` carried inside the application
//! config is found when a path-planning field is resolved.

use crate::error::ScopeResult;
use crate::global::GlobalSlot;
use crate::stack::{MergeMode, ScopeEntry, ScopeId};
use hieraconf_model::{ConfigTypeId, Record, TypeDescriptor, Value};
use indexmap::IndexMap;
use serde::Serialize;
use std::sync::Arc;

/// Layer that supplied a merged value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConfigSource {
    /// Global default instance
    GlobalDefault,
    /// Live scope entry
    Scope {
        /// Entry id
        id: ScopeId,
        /// Stack position, 1 = outermost
        depth: usize,
    },
}

/// Merged view of one config type
#[derive(Debug, Clone)]
pub struct MergedConfig {
    descriptor: Arc<TypeDescriptor>,
    values: Vec<Option<Value>>,
    sources: Vec<Option<ConfigSource>>,
}

impl MergedConfig {
    fn empty(descriptor: &Arc<TypeDescriptor>) -> Self {
        let n = descriptor.field_count();
        Self {
            descriptor: Arc::clone(descriptor),
            values: vec![None; n],
            sources: vec![None; n],
        }
    }

    fn apply(&mut self, record: &Record, source: ConfigSource, mode: MergeMode) {
        for (i, value) in record.values().iter().enumerate() {
            match (value, mode) {
                (Some(v), _) => {
                    self.values[i] = Some(v.clone());
                    self.sources[i] = Some(source);
                }
                (None, MergeMode::Mask) => {
                    self.values[i] = None;
                    self.sources[i] = Some(source);
                }
                (None, MergeMode::Inherit) => {}
            }
        }
    }

    /// Descriptor of the merged type
    #[inline]
    #[must_use]
    pub fn descriptor(&self) -> &Arc<TypeDescriptor> {
        &self.descriptor
    }

    /// Concrete merged value of a field
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.descriptor
            .field_index(field)
            .and_then(|i| self.values[i].as_ref())
    }

    /// Layer that last wrote a field (a masking layer counts)
    #[must_use]
    pub fn source_of(&self, field: &str) -> Option<ConfigSource> {
        self.descriptor
            .field_index(field)
            .and_then(|i| self.sources[i])
    }

    /// Merged values in descriptor order
    #[inline]
    #[must_use]
    pub fn values(&self) -> &[Option<Value>] {
        &self.values
    }

    /// Merged view as a record
    ///
    /// # Errors
    /// Propagates record validation errors.
    pub fn to_record(&self) -> ScopeResult<Record> {
        Ok(Record::from_values(&self.descriptor, self.values.clone())?)
    }
}

/// Read-only snapshot of the global defaults and the live scope stack
#[derive(Debug, Clone, Default)]
pub struct AvailableConfigs {
    configs: IndexMap<ConfigTypeId, MergedConfig>,
    depth: usize,
}

impl AvailableConfigs {
    pub(crate) fn build(global: &GlobalSlot, entries: &[ScopeEntry]) -> Self {
        let mut out = Self {
            configs: IndexMap::new(),
            depth: entries.len(),
        };
        for record in global.defaults() {
            out.absorb(&record, ConfigSource::GlobalDefault, MergeMode::Inherit);
        }
        for (i, entry) in entries.iter().enumerate() {
            let source = ConfigSource::Scope {
                id: entry.id(),
                depth: i + 1,
            };
            out.absorb(entry.record(), source, entry.mode());
        }
        out
    }

    /// Snapshot with nothing in it
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    fn absorb(&mut self, record: &Record, source: ConfigSource, mode: MergeMode) {
        // Nested records first, by their own type
        for nested in record.nested_records() {
            self.absorb(nested, source, MergeMode::Inherit);
        }
        self.configs
            .entry(record.type_id())
            .or_insert_with(|| MergedConfig::empty(record.descriptor()))
            .apply(record, source, mode);
    }

    /// Merged view for a type
    #[must_use]
    pub fn get(&self, config_type: ConfigTypeId) -> Option<&MergedConfig> {
        self.configs.get(&config_type)
    }

    /// Whether anything of this type is available
    #[must_use]
    pub fn contains(&self, config_type: ConfigTypeId) -> bool {
        self.configs.contains_key(&config_type)
    }

    /// Concrete merged value of `field` on `config_type`
    #[must_use]
    pub fn field(&self, config_type: ConfigTypeId, field: &str) -> Option<&Value> {
        self.get(config_type).and_then(|m| m.get(field))
    }

    /// Which layer supplied `field` on `config_type`
    #[must_use]
    pub fn source_of(&self, config_type: ConfigTypeId, field: &str) -> Option<ConfigSource> {
        self.get(config_type).and_then(|m| m.source_of(field))
    }

    /// Available types, in first-seen order
    pub fn types(&self) -> impl Iterator<Item = ConfigTypeId> + '_ {
        self.configs.keys().copied()
    }

    /// Merged view of a type as a record
    ///
    /// # Errors
    /// Propagates record validation errors.
    pub fn to_record(&self, config_type: ConfigTypeId) -> ScopeResult<Option<Record>> {
        self.get(config_type).map(MergedConfig::to_record).transpose()
    }

    /// Number of available types
    #[must_use]
    pub fn len(&self) -> usize {
        self.configs.len()
    }

    /// Whether nothing is available
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// Stack depth the snapshot was taken at
    #[inline]
    #[must_use]
    pub fn scope_depth(&self) -> usize {
        self.depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::ScopeStack;
    use hieraconf_test_utils::{nested_hierarchy, sparse, step_hierarchy, with_defaults};
    use pretty_assertions::assert_eq;

    #[test]
    fn innermost_concrete_value_wins_per_field() {
        let h = step_hierarchy();
        let mut stack = ScopeStack::new();
        let outer = stack.push(
            sparse(&h.global, &[("timeout", Value::Int(30)), ("label", "outer".into())]),
            MergeMode::Inherit,
        );
        let inner = stack.push(sparse(&h.global, &[("timeout", Value::Int(45))]), MergeMode::Inherit);

        let available = stack.flatten(&GlobalSlot::new());
        let id = h.global.id();
        assert_eq!(available.field(id, "timeout"), Some(&Value::Int(45)));
        assert_eq!(available.field(id, "label"), Some(&Value::from("outer")));
        assert_eq!(
            available.source_of(id, "timeout"),
            Some(ConfigSource::Scope { id: inner, depth: 2 })
        );
        assert_eq!(
            available.source_of(id, "label"),
            Some(ConfigSource::Scope { id: outer, depth: 1 })
        );
    }

    #[test]
    fn mask_hides_outer_values() {
        let h = step_hierarchy();
        let mut stack = ScopeStack::new();
        stack.push(sparse(&h.global, &[("label", "outer".into())]), MergeMode::Inherit);
        stack.push(sparse(&h.global, &[]), MergeMode::Mask);

        let available = stack.flatten(&GlobalSlot::new());
        assert_eq!(available.field(h.global.id(), "label"), None);
    }

    #[test]
    fn global_default_is_bottom_layer() {
        let h = step_hierarchy();
        let slot = GlobalSlot::new();
        slot.set_global_default(with_defaults(&h.global, &[]));
        let mut stack = ScopeStack::new();
        stack.push(sparse(&h.global, &[("retries", Value::Int(9))]), MergeMode::Inherit);

        let available = stack.flatten(&slot);
        let id = h.global.id();
        assert_eq!(available.field(id, "timeout"), Some(&Value::Int(30)));
        assert_eq!(available.source_of(id, "timeout"), Some(ConfigSource::GlobalDefault));
        assert_eq!(available.field(id, "retries"), Some(&Value::Int(9)));
    }

    #[test]
    fn nested_records_are_available_by_type() {
        let h = nested_hierarchy();
        let root = with_defaults(&h.root, &[]);
        let mut stack = ScopeStack::new();
        stack.push(root, MergeMode::Inherit);

        let available = stack.flatten(&GlobalSlot::new());
        assert!(available.contains(h.path_planning.id()));
        assert_eq!(
            available.field(h.path_planning.id(), "output_dir_suffix"),
            Some(&Value::from("_out"))
        );
        assert_eq!(available.field(h.zarr.id(), "level"), Some(&Value::Int(3)));
        assert_eq!(available.len(), 3);
    }

    #[test]
    fn to_record_keeps_placeholders() {
        let h = step_hierarchy();
        let mut stack = ScopeStack::new();
        stack.push(sparse(&h.step, &[("step_name", "load".into())]), MergeMode::Inherit);

        let available = stack.flatten(&GlobalSlot::new());
        let record = available.to_record(h.step.id()).unwrap().unwrap();
        assert_eq!(record.get("step_name").unwrap(), Some(&Value::from("load")));
        assert_eq!(record.get("timeout").unwrap(), None);
        assert!(available.to_record(h.global.id()).unwrap().is_none());
    }

    #[test]
    fn empty_snapshot() {
        let available = AvailableConfigs::empty();
        assert!(available.is_empty());
        assert_eq!(available.scope_depth(), 0);
    }
}
