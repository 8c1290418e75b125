//! Bidirectional lazy ↔ concrete type map
//!
//! Lazy ids are allocated by name, so two callers asking for the same lazy
//! type name get the same id. Pairing is a single-winner compare-and-set on
//! the concrete side; losers that asked for the same pair succeed, losers
//! that asked for a different pair get [`RegistryError::AmbiguousRegistration`].

use crate::error::{RegistryError, RegistryResult};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use hieraconf_model::{ConfigTypeId, LazyTypeId, RegistryId};
use std::sync::atomic::{AtomicU32, Ordering};

#[derive(Debug)]
pub(crate) struct LazyMap {
    registry: RegistryId,
    next_slot: AtomicU32,
    by_name: DashMap<String, LazyTypeId>,
    names: DashMap<LazyTypeId, String>,
    concrete_to_lazy: DashMap<ConfigTypeId, LazyTypeId>,
    lazy_to_concrete: DashMap<LazyTypeId, ConfigTypeId>,
}

impl LazyMap {
    pub(crate) fn new(registry: RegistryId) -> Self {
        Self {
            registry,
            next_slot: AtomicU32::new(0),
            by_name: DashMap::new(),
            names: DashMap::new(),
            concrete_to_lazy: DashMap::new(),
            lazy_to_concrete: DashMap::new(),
        }
    }

    pub(crate) fn id_for(&self, name: &str) -> LazyTypeId {
        if let Some(id) = self.by_name.get(name) {
            return *id;
        }
        let id = *self
            .by_name
            .entry(name.to_string())
            .or_insert_with(|| {
                LazyTypeId::new(self.registry, self.next_slot.fetch_add(1, Ordering::Relaxed))
            });
        self.names.entry(id).or_insert_with(|| name.to_string());
        id
    }

    pub(crate) fn name(&self, id: LazyTypeId) -> Option<String> {
        self.names.get(&id).map(|n| n.clone())
    }

    /// Pair `lazy` with `concrete`; `concrete_name` is only used for errors
    pub(crate) fn pair(
        &self,
        lazy: LazyTypeId,
        concrete: ConfigTypeId,
        concrete_name: &str,
    ) -> RegistryResult<()> {
        if lazy.registry() != self.registry {
            return Err(RegistryError::foreign(lazy));
        }

        match self.concrete_to_lazy.entry(concrete) {
            Entry::Occupied(existing) => {
                if *existing.get() == lazy {
                    Ok(())
                } else {
                    Err(self.ambiguous(concrete_name, *existing.get(), lazy))
                }
            }
            Entry::Vacant(slot) => {
                match self.lazy_to_concrete.entry(lazy) {
                    Entry::Occupied(bound) if *bound.get() != concrete => {
                        // Lazy type already wraps another concrete type
                        return Err(self.ambiguous(concrete_name, lazy, lazy));
                    }
                    Entry::Occupied(_) => {}
                    Entry::Vacant(v) => {
                        v.insert(concrete);
                    }
                }
                slot.insert(lazy);
                Ok(())
            }
        }
    }

    pub(crate) fn concrete_for(&self, lazy: LazyTypeId) -> Option<ConfigTypeId> {
        self.lazy_to_concrete.get(&lazy).map(|c| *c)
    }

    pub(crate) fn lazy_for(&self, concrete: ConfigTypeId) -> Option<LazyTypeId> {
        self.concrete_to_lazy.get(&concrete).map(|l| *l)
    }

    pub(crate) fn pair_count(&self) -> usize {
        self.concrete_to_lazy.len()
    }

    fn ambiguous(&self, concrete: &str, existing: LazyTypeId, requested: LazyTypeId) -> RegistryError {
        let label = |id: LazyTypeId| self.name(id).unwrap_or_else(|| id.to_string());
        RegistryError::AmbiguousRegistration {
            concrete: concrete.to_string(),
            existing: label(existing),
            requested: label(requested),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_for_is_stable_per_name() {
        let map = LazyMap::new(RegistryId::next());
        let a = map.id_for("LazyStepConfig");
        let b = map.id_for("LazyStepConfig");
        let c = map.id_for("LazyPipelineConfig");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(map.name(a).as_deref(), Some("LazyStepConfig"));
    }

    #[test]
    fn pairing_is_idempotent() {
        let registry = RegistryId::next();
        let map = LazyMap::new(registry);
        let lazy = map.id_for("LazyStepConfig");
        let concrete = ConfigTypeId::new(registry, 0);
        map.pair(lazy, concrete, "StepConfig").unwrap();
        map.pair(lazy, concrete, "StepConfig").unwrap();
        assert_eq!(map.lazy_for(concrete), Some(lazy));
        assert_eq!(map.concrete_for(lazy), Some(concrete));
        assert_eq!(map.pair_count(), 1);
    }

    #[test]
    fn second_lazy_for_same_concrete_is_ambiguous() {
        let registry = RegistryId::next();
        let map = LazyMap::new(registry);
        let concrete = ConfigTypeId::new(registry, 0);
        map.pair(map.id_for("LazyStep"), concrete, "StepConfig").unwrap();
        let err = map
            .pair(map.id_for("OtherLazyStep"), concrete, "StepConfig")
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::AmbiguousRegistration {
                concrete: "StepConfig".into(),
                existing: "LazyStep".into(),
                requested: "OtherLazyStep".into(),
            }
        );
    }

    #[test]
    fn foreign_lazy_id_is_rejected() {
        let registry = RegistryId::next();
        let map = LazyMap::new(registry);
        let other = LazyMap::new(RegistryId::next());
        let err = map
            .pair(other.id_for("LazyX"), ConfigTypeId::new(registry, 0), "X")
            .unwrap_err();
        assert!(matches!(err, RegistryError::ForeignType { .. }));
    }
}
