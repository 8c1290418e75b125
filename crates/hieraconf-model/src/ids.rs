//! Type identities
//!
//! Concrete and lazy config types are identified by a slot in the arena of the
//! registry that created them. The registry id is carried along so identities
//! from two registries never compare equal.

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_REGISTRY_ID: AtomicU32 = AtomicU32::new(1);

/// Identity of one type registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RegistryId(u32);

impl RegistryId {
    /// Allocate a fresh, process-unique registry id
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value
    #[inline]
    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }
}

/// Identity of a registered concrete config type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ConfigTypeId {
    registry: RegistryId,
    slot: u32,
}

impl ConfigTypeId {
    /// Create id for an arena slot
    #[inline]
    #[must_use]
    pub fn new(registry: RegistryId, slot: u32) -> Self {
        Self { registry, slot }
    }

    /// Registry that owns this type
    #[inline]
    #[must_use]
    pub fn registry(self) -> RegistryId {
        self.registry
    }

    /// Arena slot inside the owning registry
    #[inline]
    #[must_use]
    pub fn slot(self) -> usize {
        self.slot as usize
    }
}

impl fmt::Display for ConfigTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type#{}:{}", self.registry.0, self.slot)
    }
}

/// Identity of a generated lazy wrapper type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LazyTypeId {
    registry: RegistryId,
    slot: u32,
}

impl LazyTypeId {
    /// Create id for a lazy slot
    #[inline]
    #[must_use]
    pub fn new(registry: RegistryId, slot: u32) -> Self {
        Self { registry, slot }
    }

    /// Registry that allocated this id
    #[inline]
    #[must_use]
    pub fn registry(self) -> RegistryId {
        self.registry
    }
}

impl fmt::Display for LazyTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lazy#{}:{}", self.registry.0, self.slot)
    }
}
