//! Scope stack value
//!
//! [`ScopeStack`] is a plain value that can be threaded through call chains
//! explicitly. The ambient per-thread and per-task stacks in
//! [`crate::context`] wrap one of these.

use crate::available::AvailableConfigs;
use crate::error::{ScopeError, ScopeResult};
use crate::global::GlobalSlot;
use hieraconf_model::Record;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_STACK_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one pushed scope entry, unique in the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ScopeId(u64);

impl ScopeId {
    fn next() -> Self {
        Self(NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope#{}", self.0)
    }
}

/// Identity of one stack instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct StackId(u64);

impl StackId {
    fn next() -> Self {
        Self(NEXT_STACK_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for StackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stack#{}", self.0)
    }
}

/// How an entry's placeholders combine with outer entries of the same type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum MergeMode {
    /// Placeholders let outer values show through
    #[default]
    Inherit,
    /// Placeholders hide outer values of the same type
    Mask,
}

/// One live entry on a stack
#[derive(Debug, Clone)]
pub struct ScopeEntry {
    id: ScopeId,
    record: Record,
    mode: MergeMode,
}

impl ScopeEntry {
    /// Entry id
    #[inline]
    #[must_use]
    pub fn id(&self) -> ScopeId {
        self.id
    }

    /// Pushed record
    #[inline]
    #[must_use]
    pub fn record(&self) -> &Record {
        &self.record
    }

    /// Merge mode
    #[inline]
    #[must_use]
    pub fn mode(&self) -> MergeMode {
        self.mode
    }
}

/// Strict LIFO stack of config records
#[derive(Debug)]
pub struct ScopeStack {
    id: StackId,
    entries: Vec<ScopeEntry>,
}

impl ScopeStack {
    /// Empty stack
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: StackId::next(),
            entries: Vec::new(),
        }
    }

    /// Stack identity
    #[inline]
    #[must_use]
    pub fn id(&self) -> StackId {
        self.id
    }

    /// Copy of the live entries under a new stack identity
    #[must_use]
    pub fn fork(&self) -> Self {
        Self {
            id: StackId::next(),
            entries: self.entries.clone(),
        }
    }

    /// Push a record
    pub fn push(&mut self, record: Record, mode: MergeMode) -> ScopeId {
        let id = ScopeId::next();
        tracing::trace!(
            "Entered {} ({}, {:?}) at depth {}",
            id,
            record.type_name(),
            mode,
            self.entries.len() + 1
        );
        self.entries.push(ScopeEntry { id, record, mode });
        id
    }

    /// Remove the entry pushed as `id`
    ///
    /// Only that entry is ever removed. Releasing anything but the innermost
    /// entry still removes it and reports the violation.
    ///
    /// # Errors
    /// - [`ScopeError::UnknownScope`] if `id` is not live here
    /// - [`ScopeError::StackDiscipline`] if entries pushed later are still live
    pub fn release(&mut self, id: ScopeId) -> ScopeResult<()> {
        let position = self
            .entries
            .iter()
            .rposition(|e| e.id == id)
            .ok_or(ScopeError::UnknownScope { id })?;
        let innermost = self.entries[self.entries.len() - 1].id;
        let entry = self.entries.remove(position);
        tracing::trace!("Exited {} ({})", id, entry.record.type_name());

        if innermost == id {
            Ok(())
        } else {
            Err(ScopeError::StackDiscipline {
                released: id,
                innermost,
            })
        }
    }

    /// Number of live entries
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entry is live
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Live entries, outermost first
    #[inline]
    #[must_use]
    pub fn entries(&self) -> &[ScopeEntry] {
        &self.entries
    }

    /// Innermost entry
    #[must_use]
    pub fn innermost(&self) -> Option<&ScopeEntry> {
        self.entries.last()
    }

    /// Merge the global defaults and every live entry into a snapshot
    #[must_use]
    pub fn flatten(&self, global: &GlobalSlot) -> AvailableConfigs {
        AvailableConfigs::build(global, &self.entries)
    }
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}
