//! Global config slot
//!
//! Lives outside every stack: the application's base config type and one
//! default instance per config type, consulted beneath all scope entries.

use crate::error::{ScopeError, ScopeResult};
use hieraconf_model::{ConfigTypeId, Record, TypeDescriptor};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::sync::Arc;

static SHARED_SLOT: Lazy<Arc<GlobalSlot>> = Lazy::new(|| Arc::new(GlobalSlot::new()));

#[derive(Debug, Clone)]
struct BaseType {
    id: ConfigTypeId,
    name: String,
}

/// Base config type and global default instances
#[derive(Debug, Default)]
pub struct GlobalSlot {
    base: RwLock<Option<BaseType>>,
    defaults: RwLock<IndexMap<ConfigTypeId, Record>>,
}

impl GlobalSlot {
    /// Empty slot
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide slot
    #[must_use]
    pub fn shared() -> Arc<GlobalSlot> {
        Arc::clone(&SHARED_SLOT)
    }

    /// Record the application's base config type
    ///
    /// Registering the same type again is a no-op.
    ///
    /// # Errors
    /// [`ScopeError::BaseTypeConflict`] if a different type is registered.
    pub fn register_base_config_type(&self, descriptor: &TypeDescriptor) -> ScopeResult<()> {
        let mut base = self.base.write();
        match base.as_ref() {
            Some(existing) if existing.id == descriptor.id() => Ok(()),
            Some(existing) => Err(ScopeError::BaseTypeConflict {
                registered: existing.name.clone(),
                requested: descriptor.name().to_string(),
            }),
            None => {
                tracing::debug!("Base config type set to {}", descriptor.name());
                *base = Some(BaseType {
                    id: descriptor.id(),
                    name: descriptor.name().to_string(),
                });
                Ok(())
            }
        }
    }

    /// Registered base config type
    #[must_use]
    pub fn base_config_type(&self) -> Option<ConfigTypeId> {
        self.base.read().as_ref().map(|b| b.id)
    }

    /// Install the global default for the record's type, returning the previous one
    ///
    /// Defaults are kept per config type and accepted whether or not a base
    /// type is registered. The base type's default is the application-wide
    /// one; a default for any other type applies to that type and to every
    /// type inheriting from it, beneath all scope entries.
    pub fn set_global_default(&self, record: Record) -> Option<Record> {
        tracing::debug!("Global default set for {}", record.type_name());
        self.defaults.write().insert(record.type_id(), record)
    }

    /// Global default for a type
    #[must_use]
    pub fn global_default(&self, config_type: ConfigTypeId) -> Option<Record> {
        self.defaults.read().get(&config_type).cloned()
    }

    /// Remove the global default for a type
    pub fn clear_global_default(&self, config_type: ConfigTypeId) -> Option<Record> {
        self.defaults.write().shift_remove(&config_type)
    }

    /// All global defaults, in the order they were first set
    #[must_use]
    pub fn defaults(&self) -> Vec<Record> {
        self.defaults.read().values().cloned().collect()
    }
}
