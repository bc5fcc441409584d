//! Registry of discovered step descriptors.

use super::{Phase, QualifiedName, Scope, StepDescriptor, StepDiscovery};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while populating the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Two descriptors share a qualified name within one (phase, scope).
    #[error("duplicate step '{name}' in {phase} phase ({scope} scope)")]
    DuplicateStep {
        name: QualifiedName,
        phase: Phase,
        scope: Scope,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct StepKey {
    phase: Phase,
    scope: Scope,
    name: QualifiedName,
}

/// Holds every discovered step descriptor, keyed by (phase, scope, name).
///
/// The registry performs no discovery itself; descriptors arrive through
/// [`StepRegistry::register`] or in bulk from a [`StepDiscovery`]
/// collaborator. A qualified name may appear in both the Start and Stop
/// phases (a paired step); within one (phase, scope) it must be unique.
#[derive(Debug)]
pub struct StepRegistry {
    steps: DashMap<StepKey, Arc<StepDescriptor>>,
}

impl Default for StepRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StepRegistry {
    pub fn new() -> Self {
        Self {
            steps: DashMap::new(),
        }
    }

    /// Registers one descriptor, rejecting (phase, scope, name) collisions.
    pub fn register(&self, descriptor: StepDescriptor) -> Result<(), RegistryError> {
        let key = StepKey {
            phase: descriptor.phase(),
            scope: descriptor.scope(),
            name: descriptor.name().clone(),
        };
        match self.steps.entry(key) {
            Entry::Occupied(_) => Err(RegistryError::DuplicateStep {
                name: descriptor.name().clone(),
                phase: descriptor.phase(),
                scope: descriptor.scope(),
            }),
            Entry::Vacant(slot) => {
                tracing::debug!(
                    step = %descriptor.name(),
                    phase = %descriptor.phase(),
                    scope = %descriptor.scope(),
                    "registered lifecycle step"
                );
                slot.insert(Arc::new(descriptor));
                Ok(())
            }
        }
    }

    /// Pulls every descriptor from a discovery collaborator.
    ///
    /// Returns the number of steps registered; fails on the first duplicate.
    pub fn register_all(&self, discovery: &dyn StepDiscovery) -> Result<usize, RegistryError> {
        let descriptors = discovery.discover_steps();
        let count = descriptors.len();
        for descriptor in descriptors {
            self.register(descriptor)?;
        }
        Ok(count)
    }

    /// Descriptors for one (phase, scope), sorted by name for deterministic
    /// iteration. Ordering constraints are resolved later by the scheduler.
    pub fn descriptors_for(&self, phase: Phase, scope: Scope) -> Vec<Arc<StepDescriptor>> {
        let mut descriptors: Vec<Arc<StepDescriptor>> = self
            .steps
            .iter()
            .filter(|entry| entry.key().phase == phase && entry.key().scope == scope)
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        descriptors.sort_by(|a, b| a.name().cmp(b.name()));
        descriptors
    }

    /// Total number of registered descriptors across all phases and scopes.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Drops every descriptor (module hot-reload path). Callers must also
    /// invalidate any scheduler caches built from this registry.
    pub fn clear(&self) {
        self.steps.clear();
    }
}
